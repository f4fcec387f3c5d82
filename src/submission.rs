use tracing::info;

use crate::error::{FieldProblem, StoreError, SubmitError, ValidationError};
use crate::model::{
    Cookable, DEFAULT_TRUST, ErrorTags, EvaluationRecord, Preference, SampleId, VersionJudgment,
};
use crate::progress::{ANNOTATOR_COLUMN, SAMPLE_ID_COLUMN, annotator_matches};
use crate::store::{Table, TableStore};
use crate::util::now_utc_string;

const RECORD_COLUMNS: [&str; 14] = [
    SAMPLE_ID_COLUMN,
    "recipe_title",
    "pref_ingredients",
    "pref_numbers",
    "pref_procedure",
    "pref_overall",
    "A_cookable",
    "A_trust",
    "A_errors",
    "B_cookable",
    "B_trust",
    "B_errors",
    "notes",
    "timestamp",
];

const TRUST_RANGE: std::ops::RangeInclusive<u8> = 1..=5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordLayout {
    SingleUser,
    MultiUser,
}

impl RecordLayout {
    pub fn columns(self) -> Vec<&'static str> {
        let mut columns = Vec::with_capacity(RECORD_COLUMNS.len() + 1);
        if self == Self::MultiUser {
            columns.push(ANNOTATOR_COLUMN);
        }
        columns.extend(RECORD_COLUMNS);
        columns
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionDraft {
    pub cookable: Cookable,
    pub trust: u8,
    pub errors: ErrorTags,
}

impl Default for VersionDraft {
    fn default() -> Self {
        Self {
            cookable: Cookable::Yes,
            trust: DEFAULT_TRUST,
            errors: ErrorTags::new(),
        }
    }
}

/// Form state for one sample before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluationDraft {
    pub annotator: Option<String>,
    pub sample_id: SampleId,
    pub recipe_title: String,
    pub pref_ingredients: Option<Preference>,
    pub pref_numbers: Option<Preference>,
    pub pref_procedure: Option<Preference>,
    pub pref_overall: Option<Preference>,
    pub version_a: VersionDraft,
    pub version_b: VersionDraft,
    pub notes: String,
}

impl EvaluationDraft {
    pub fn new(sample_id: SampleId, recipe_title: impl Into<String>) -> Self {
        Self {
            sample_id,
            recipe_title: recipe_title.into(),
            ..Self::default()
        }
    }

    pub fn validate(
        self,
        layout: RecordLayout,
        timestamp: String,
    ) -> Result<EvaluationRecord, ValidationError> {
        let mut problems = Vec::new();

        let preferences = [
            ("pref_ingredients", self.pref_ingredients),
            ("pref_numbers", self.pref_numbers),
            ("pref_procedure", self.pref_procedure),
            ("pref_overall", self.pref_overall),
        ];
        for (field, value) in preferences {
            if value.is_none() {
                problems.push(FieldProblem::Missing(field));
            }
        }

        for (field, trust) in [("A_trust", self.version_a.trust), ("B_trust", self.version_b.trust)] {
            if !TRUST_RANGE.contains(&trust) {
                problems.push(FieldProblem::OutOfRange {
                    field,
                    value: i64::from(trust),
                });
            }
        }

        let annotator = match layout {
            RecordLayout::SingleUser => None,
            RecordLayout::MultiUser => {
                let name = self
                    .annotator
                    .as_deref()
                    .map(str::trim)
                    .filter(|name| !name.is_empty());
                if name.is_none() {
                    problems.push(FieldProblem::Missing("annotator"));
                }
                name.map(ToOwned::to_owned)
            }
        };

        let (
            Some(pref_ingredients),
            Some(pref_numbers),
            Some(pref_procedure),
            Some(pref_overall),
        ) = (
            self.pref_ingredients,
            self.pref_numbers,
            self.pref_procedure,
            self.pref_overall,
        )
        else {
            return Err(ValidationError { problems });
        };
        if !problems.is_empty() {
            return Err(ValidationError { problems });
        }

        Ok(EvaluationRecord {
            annotator,
            sample_id: self.sample_id,
            recipe_title: self.recipe_title,
            pref_ingredients,
            pref_numbers,
            pref_procedure,
            pref_overall,
            version_a: judgment(self.version_a),
            version_b: judgment(self.version_b),
            notes: self.notes,
            timestamp,
        })
    }
}

fn judgment(draft: VersionDraft) -> VersionJudgment {
    VersionJudgment {
        cookable: draft.cookable,
        trust: draft.trust,
        errors: draft.errors,
    }
}

pub fn record_to_row(record: &EvaluationRecord, layout: RecordLayout) -> Vec<String> {
    let mut row = Vec::with_capacity(RECORD_COLUMNS.len() + 1);
    if layout == RecordLayout::MultiUser {
        row.push(record.annotator.clone().unwrap_or_default());
    }
    row.extend([
        record.sample_id.to_string(),
        record.recipe_title.clone(),
        record.pref_ingredients.as_str().to_string(),
        record.pref_numbers.as_str().to_string(),
        record.pref_procedure.as_str().to_string(),
        record.pref_overall.as_str().to_string(),
        record.version_a.cookable.as_str().to_string(),
        record.version_a.trust.to_string(),
        record.version_a.errors.to_cell(),
        record.version_b.cookable.as_str().to_string(),
        record.version_b.trust.to_string(),
        record.version_b.errors.to_cell(),
        record.notes.clone(),
        record.timestamp.clone(),
    ]);
    row
}

pub fn record_from_row(table: &Table, row: &[String]) -> Result<EvaluationRecord, String> {
    let text = |column: &str| {
        table
            .cell(row, column)
            .ok_or_else(|| format!("missing column `{column}`"))
    };
    let preference = |column: &str| -> Result<Preference, String> {
        let raw = text(column)?;
        Preference::parse(raw).ok_or_else(|| format!("invalid {column} `{raw}`"))
    };
    let cookable = |column: &str| -> Result<Cookable, String> {
        let raw = text(column)?;
        Cookable::parse(raw).ok_or_else(|| format!("invalid {column} `{raw}`"))
    };
    let trust = |column: &str| -> Result<u8, String> {
        let raw = text(column)?;
        raw.trim()
            .parse::<u8>()
            .ok()
            .filter(|value| TRUST_RANGE.contains(value))
            .ok_or_else(|| format!("invalid {column} `{raw}`"))
    };

    let raw_id = text(SAMPLE_ID_COLUMN)?;
    let sample_id = raw_id
        .trim()
        .parse::<SampleId>()
        .map_err(|_| format!("invalid {SAMPLE_ID_COLUMN} `{raw_id}`"))?;

    Ok(EvaluationRecord {
        annotator: table
            .cell(row, ANNOTATOR_COLUMN)
            .map(|name| name.trim().to_string()),
        sample_id,
        recipe_title: text("recipe_title")?.to_string(),
        pref_ingredients: preference("pref_ingredients")?,
        pref_numbers: preference("pref_numbers")?,
        pref_procedure: preference("pref_procedure")?,
        pref_overall: preference("pref_overall")?,
        version_a: VersionJudgment {
            cookable: cookable("A_cookable")?,
            trust: trust("A_trust")?,
            errors: ErrorTags::from_cell(text("A_errors")?),
        },
        version_b: VersionJudgment {
            cookable: cookable("B_cookable")?,
            trust: trust("B_trust")?,
            errors: ErrorTags::from_cell(text("B_errors")?),
        },
        notes: table.cell(row, "notes").unwrap_or("").to_string(),
        timestamp: table.cell(row, "timestamp").unwrap_or("").to_string(),
    })
}

/// Every readable record, optionally restricted to one annotator.
pub fn load_records(
    store: &dyn TableStore,
    annotator: Option<&str>,
) -> Result<Vec<EvaluationRecord>, StoreError> {
    let Some(table) = store.read_all()? else {
        return Ok(Vec::new());
    };

    let mut records = Vec::with_capacity(table.len());
    for (index, row) in table.rows.iter().enumerate() {
        let record = record_from_row(&table, row)
            .map_err(|message| StoreError::corrupt(store.location(), format!("row {index}: {message}")))?;
        let keep = match annotator {
            Some(wanted) => record
                .annotator
                .as_deref()
                .is_some_and(|owner| annotator_matches(owner, wanted)),
            None => true,
        };
        if keep {
            records.push(record);
        }
    }
    Ok(records)
}

/// Validates drafts and appends them to the evaluation store.
///
/// Append only: a second submission for the same sample and annotator adds
/// a second row. Warning about that is up to the caller.
pub struct SubmissionRecorder<'a> {
    store: &'a dyn TableStore,
    layout: RecordLayout,
}

impl<'a> SubmissionRecorder<'a> {
    pub fn new(store: &'a dyn TableStore, layout: RecordLayout) -> Self {
        Self { store, layout }
    }

    pub fn layout(&self) -> RecordLayout {
        self.layout
    }

    pub fn submit(&self, draft: EvaluationDraft) -> Result<EvaluationRecord, SubmitError> {
        let record = draft.validate(self.layout, now_utc_string())?;

        let mut table = Table::new(&self.layout.columns());
        table.push_row(record_to_row(&record, self.layout));
        self.store.append_and_commit(&table)?;

        info!(
            store = %self.store.location(),
            sample_id = record.sample_id,
            annotator = record.annotator.as_deref().unwrap_or("-"),
            "recorded evaluation"
        );
        Ok(record)
    }
}
