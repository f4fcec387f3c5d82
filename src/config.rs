use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::blinding::DEFAULT_SEED;
use crate::error::{FieldProblem, ValidationError};

pub const DEFAULT_DATASET_FILE: &str = "Recipes evaluation - evaluation.csv";
pub const DEFAULT_RESULTS_FILE: &str = "valutazioni_chefs_detailed.csv";
pub const DEFAULT_MAPPING_FILE: &str = "mapping_reference.csv";
pub const DEFAULT_SHARED_SHEET_DB: &str = "shared_evaluations.sqlite";
pub const DEFAULT_SHARED_WORKSHEET: &str = "evaluations";
pub const DEFAULT_CROSS_ENTROPY_COLUMN: &str = "output_Qwen3-4B-Cross-Entropy";
pub const DEFAULT_MIXED_COLUMN: &str = "output_Qwen3-4B-Mixed";
pub const DEFAULT_MAX_WRITE_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StudyConfig {
    pub dataset_file: String,
    pub results_file: String,
    pub mapping_file: String,
    pub shared_sheet_db: String,
    pub shared_worksheet: String,
    pub seed: u64,
    pub cross_entropy_column: String,
    pub mixed_column: String,
    pub annotators: Vec<String>,
    pub max_write_attempts: u32,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            dataset_file: DEFAULT_DATASET_FILE.to_string(),
            results_file: DEFAULT_RESULTS_FILE.to_string(),
            mapping_file: DEFAULT_MAPPING_FILE.to_string(),
            shared_sheet_db: DEFAULT_SHARED_SHEET_DB.to_string(),
            shared_worksheet: DEFAULT_SHARED_WORKSHEET.to_string(),
            seed: DEFAULT_SEED,
            cross_entropy_column: DEFAULT_CROSS_ENTROPY_COLUMN.to_string(),
            mixed_column: DEFAULT_MIXED_COLUMN.to_string(),
            annotators: Vec::new(),
            max_write_attempts: DEFAULT_MAX_WRITE_ATTEMPTS,
        }
    }
}

impl StudyConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let raw = fs::read(path)
            .with_context(|| format!("failed to read study config {}", path.display()))?;
        let config: Self = serde_json::from_slice(&raw)
            .with_context(|| format!("failed to parse study config {}", path.display()))?;
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<()> {
        if self.cross_entropy_column == self.mixed_column {
            bail!(
                "cross-entropy and mixed outputs must come from different columns (both `{}`)",
                self.mixed_column
            );
        }
        if self.max_write_attempts == 0 {
            bail!("max_write_attempts must be at least 1");
        }
        Ok(())
    }

    pub fn model_columns(&self) -> ModelColumns {
        ModelColumns {
            cross_entropy: self.cross_entropy_column.clone(),
            mixed: self.mixed_column.clone(),
        }
    }

    pub fn roster(&self) -> Roster {
        Roster::new(self.annotators.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelColumns {
    pub cross_entropy: String,
    pub mixed: String,
}

impl Default for ModelColumns {
    fn default() -> Self {
        StudyConfig::default().model_columns()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotator(String);

impl Annotator {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    names: Vec<String>,
}

impl Roster {
    pub fn new(names: Vec<String>) -> Self {
        Self {
            names: names
                .into_iter()
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .collect(),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn resolve(&self, name: &str) -> Result<Annotator, ValidationError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(ValidationError {
                problems: vec![FieldProblem::Missing("annotator")],
            });
        }
        self.names
            .iter()
            .find(|candidate| candidate.as_str() == trimmed)
            .map(|candidate| Annotator(candidate.clone()))
            .ok_or_else(|| ValidationError {
                problems: vec![FieldProblem::UnknownAnnotator(trimmed.to_string())],
            })
    }
}
