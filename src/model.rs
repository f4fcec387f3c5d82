use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

pub type SampleId = u64;

pub const PARSE_ERROR_MARKER: &str = "Parse Error";
pub const NO_ERRORS_SENTINEL: &str = "None";
pub const ERROR_TAG_DELIMITER: char = ';';
pub const DEFAULT_TRUST: u8 = 3;

#[derive(Debug, Clone, PartialEq)]
pub enum RawField {
    Text(String),
    Structured(serde_json::Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub id: SampleId,
    pub title: String,
    pub cross_entropy_output: RawField,
    pub mixed_output: RawField,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParsedRecipe {
    Valid {
        ingredients: Vec<String>,
        instructions: Vec<String>,
    },
    ParseError {
        raw_text: String,
    },
}

impl ParsedRecipe {
    pub fn is_parse_error(&self) -> bool {
        matches!(self, Self::ParseError { .. })
    }

    pub fn ingredients(&self) -> Vec<&str> {
        match self {
            Self::Valid { ingredients, .. } => ingredients.iter().map(String::as_str).collect(),
            Self::ParseError { .. } => vec![PARSE_ERROR_MARKER],
        }
    }

    pub fn instructions(&self) -> Vec<&str> {
        match self {
            Self::Valid { instructions, .. } => instructions.iter().map(String::as_str).collect(),
            Self::ParseError { raw_text } => vec![raw_text.as_str()],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Slot {
    A,
    B,
}

impl Slot {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
        }
    }

    pub fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "A" => Some(Self::A),
            "B" => Some(Self::B),
            _ => None,
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlindingAssignment {
    pub sample_id: SampleId,
    pub mixed_is: Slot,
}

impl BlindingAssignment {
    pub fn cross_entropy_is(&self) -> Slot {
        self.mixed_is.other()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlindedPair {
    pub id: SampleId,
    pub title: String,
    #[serde(rename = "A")]
    pub a: ParsedRecipe,
    #[serde(rename = "B")]
    pub b: ParsedRecipe,
}

impl BlindedPair {
    pub fn slot(&self, slot: Slot) -> &ParsedRecipe {
        match slot {
            Slot::A => &self.a,
            Slot::B => &self.b,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Preference {
    A,
    B,
    Tie,
}

impl Preference {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::Tie => "Tie",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "A" => Some(Self::A),
            "B" => Some(Self::B),
            "Tie" => Some(Self::Tie),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Cookable {
    #[default]
    Yes,
    Maybe,
    No,
}

impl Cookable {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Yes => "Yes",
            Self::Maybe => "Maybe",
            Self::No => "No",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "Yes" => Some(Self::Yes),
            "Maybe" | "Maybe (needs fix)" => Some(Self::Maybe),
            "No" => Some(Self::No),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ErrorTag {
    #[serde(rename = "Missing Core Ingredient")]
    MissingCoreIngredient,
    #[serde(rename = "Hallucination/Bizarre")]
    Hallucination,
    #[serde(rename = "Bad Quantities")]
    BadQuantities,
    #[serde(rename = "Bad Times")]
    BadTimes,
    #[serde(rename = "Bad Temperatures")]
    BadTemperatures,
    #[serde(rename = "Step Mismatch")]
    StepMismatch,
    #[serde(rename = "Safety Issue")]
    SafetyIssue,
    #[serde(rename = "Format Error")]
    FormatError,
}

impl ErrorTag {
    pub const ALL: [ErrorTag; 8] = [
        Self::MissingCoreIngredient,
        Self::Hallucination,
        Self::BadQuantities,
        Self::BadTimes,
        Self::BadTemperatures,
        Self::StepMismatch,
        Self::SafetyIssue,
        Self::FormatError,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::MissingCoreIngredient => "Missing Core Ingredient",
            Self::Hallucination => "Hallucination/Bizarre",
            Self::BadQuantities => "Bad Quantities",
            Self::BadTimes => "Bad Times",
            Self::BadTemperatures => "Bad Temperatures",
            Self::StepMismatch => "Step Mismatch",
            Self::SafetyIssue => "Safety Issue",
            Self::FormatError => "Format Error",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        Self::ALL.into_iter().find(|tag| tag.label() == trimmed)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorTags(BTreeSet<ErrorTag>);

impl ErrorTags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tag: ErrorTag) -> bool {
        self.0.insert(tag)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ErrorTag> + '_ {
        self.0.iter().copied()
    }

    pub fn to_cell(&self) -> String {
        if self.0.is_empty() {
            return NO_ERRORS_SENTINEL.to_string();
        }
        self.0
            .iter()
            .map(|tag| tag.label())
            .collect::<Vec<_>>()
            .join(&ERROR_TAG_DELIMITER.to_string())
    }

    // Unknown labels are dropped so older stores with retired tags still load.
    pub fn from_cell(cell: &str) -> Self {
        let trimmed = cell.trim();
        if trimmed.is_empty() || trimmed == NO_ERRORS_SENTINEL {
            return Self::default();
        }
        Self(
            trimmed
                .split(ERROR_TAG_DELIMITER)
                .filter_map(ErrorTag::parse)
                .collect(),
        )
    }
}

impl FromIterator<ErrorTag> for ErrorTags {
    fn from_iter<I: IntoIterator<Item = ErrorTag>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionJudgment {
    pub cookable: Cookable,
    pub trust: u8,
    pub errors: ErrorTags,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvaluationRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotator: Option<String>,
    pub sample_id: SampleId,
    pub recipe_title: String,
    pub pref_ingredients: Preference,
    pub pref_numbers: Preference,
    pub pref_procedure: Preference,
    pub pref_overall: Preference,
    pub version_a: VersionJudgment,
    pub version_b: VersionJudgment,
    pub notes: String,
    pub timestamp: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_tags_serialize_in_vocabulary_order() {
        let tags: ErrorTags = [ErrorTag::SafetyIssue, ErrorTag::BadQuantities]
            .into_iter()
            .collect();
        assert_eq!(tags.to_cell(), "Bad Quantities;Safety Issue");
    }

    #[test]
    fn error_tags_serialize_to_json_as_vocabulary_labels() {
        let tags: ErrorTags = [ErrorTag::BadTimes, ErrorTag::Hallucination]
            .into_iter()
            .collect();

        let json = serde_json::to_string(&tags).expect("serialize");
        assert_eq!(json, r#"["Hallucination/Bizarre","Bad Times"]"#);
        for tag in ErrorTag::ALL {
            let json = serde_json::to_string(&tag).expect("serialize tag");
            assert_eq!(json, format!("\"{}\"", tag.label()));
        }
    }

    #[test]
    fn empty_error_tags_use_none_sentinel() {
        assert_eq!(ErrorTags::new().to_cell(), "None");
        assert!(ErrorTags::from_cell("None").is_empty());
        assert!(ErrorTags::from_cell("").is_empty());
    }

    #[test]
    fn error_tags_from_cell_drops_unknown_labels() {
        let tags = ErrorTags::from_cell("Bad Times;Too Salty;Format Error");
        assert_eq!(
            tags.iter().collect::<Vec<_>>(),
            vec![ErrorTag::BadTimes, ErrorTag::FormatError]
        );
    }

    #[test]
    fn cookable_accepts_legacy_maybe_label() {
        assert_eq!(Cookable::parse("Maybe (needs fix)"), Some(Cookable::Maybe));
        assert_eq!(Cookable::parse("Maybe"), Some(Cookable::Maybe));
        assert_eq!(Cookable::parse("Perhaps"), None);
    }

    #[test]
    fn parse_error_recipe_exposes_placeholder_view() {
        let recipe = ParsedRecipe::ParseError {
            raw_text: "not json".to_string(),
        };
        assert_eq!(recipe.ingredients(), vec!["Parse Error"]);
        assert_eq!(recipe.instructions(), vec!["not json"]);
    }

    #[test]
    fn slot_other_is_complement() {
        assert_eq!(Slot::A.other(), Slot::B);
        assert_eq!(Slot::B.other(), Slot::A);
        assert_eq!(Slot::parse(" B "), Some(Slot::B));
        assert_eq!(Slot::parse("C"), None);
    }
}
