use std::fmt;

use thiserror::Error;

use crate::model::SampleId;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {location}: {message}")]
    Unavailable { location: String, message: String },

    #[error("store content is corrupt: {location}: {message}")]
    Corrupt { location: String, message: String },

    #[error("column mismatch in {location}: expected [{expected}], found [{found}]")]
    SchemaMismatch {
        location: String,
        expected: String,
        found: String,
    },

    #[error("{location} changed during write after {attempts} attempts")]
    ConcurrentModification { location: String, attempts: u32 },

    #[error("failed to write {location}: {message}")]
    Write { location: String, message: String },
}

impl StoreError {
    pub fn unavailable(location: impl fmt::Display, message: impl fmt::Display) -> Self {
        Self::Unavailable {
            location: location.to_string(),
            message: message.to_string(),
        }
    }

    pub fn corrupt(location: impl fmt::Display, message: impl fmt::Display) -> Self {
        Self::Corrupt {
            location: location.to_string(),
            message: message.to_string(),
        }
    }

    pub fn write(location: impl fmt::Display, message: impl fmt::Display) -> Self {
        Self::Write {
            location: location.to_string(),
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum BlindingError {
    #[error("blinding mapping is corrupt: {0}")]
    Corrupt(String),

    #[error("blinding mapping covers {persisted} samples but the dataset has {samples}")]
    SizeMismatch { persisted: usize, samples: usize },

    #[error("no blinding assignment for sample {0}")]
    Unassigned(SampleId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to read dataset {path}: {message}")]
    Read { path: String, message: String },

    #[error("dataset {path} is missing column `{column}`")]
    MissingColumn { path: String, column: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldProblem {
    Missing(&'static str),
    OutOfRange { field: &'static str, value: i64 },
    UnknownAnnotator(String),
}

impl fmt::Display for FieldProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing(field) => write!(f, "{field} is required"),
            Self::OutOfRange { field, value } => {
                write!(f, "{field} must be between 1 and 5 (got {value})")
            }
            Self::UnknownAnnotator(name) => write!(f, "annotator `{name}` is not on the roster"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub problems: Vec<FieldProblem>,
}

impl ValidationError {
    pub fn missing_fields(&self) -> Vec<&'static str> {
        self.problems
            .iter()
            .filter_map(|problem| match problem {
                FieldProblem::Missing(field) => Some(*field),
                _ => None,
            })
            .collect()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = self
            .problems
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        write!(f, "evaluation rejected: {rendered}")
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
