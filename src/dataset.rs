use std::fs::File;
use std::path::Path;

use tracing::{info, warn};

use crate::config::ModelColumns;
use crate::error::DatasetError;
use crate::model::{RawField, Sample, SampleId};

pub const TITLE_COLUMN: &str = "title";

/// Reads the source dataset; row order defines the 0-based sample id.
pub fn load_samples(path: &Path, columns: &ModelColumns) -> Result<Vec<Sample>, DatasetError> {
    if !path.exists() {
        warn!(path = %path.display(), "dataset file missing");
        return Ok(Vec::new());
    }

    let read_error = |message: String| DatasetError::Read {
        path: path.display().to_string(),
        message,
    };

    let file = File::open(path).map_err(|err| read_error(err.to_string()))?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(file);

    let headers = reader
        .headers()
        .map_err(|err| read_error(err.to_string()))?
        .clone();
    let column_index = |name: &str| {
        headers
            .iter()
            .position(|header| header == name)
            .ok_or_else(|| DatasetError::MissingColumn {
                path: path.display().to_string(),
                column: name.to_string(),
            })
    };
    let title_index = column_index(TITLE_COLUMN)?;
    let ce_index = column_index(columns.cross_entropy.as_str())?;
    let mixed_index = column_index(columns.mixed.as_str())?;

    let mut samples = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(|err| read_error(err.to_string()))?;
        let cell = |position: usize| record.get(position).unwrap_or("").to_string();

        samples.push(Sample {
            id: index as SampleId,
            title: cell(title_index),
            cross_entropy_output: RawField::Text(cell(ce_index)),
            mixed_output: RawField::Text(cell(mixed_index)),
        });
    }

    info!(path = %path.display(), samples = samples.len(), "loaded dataset");
    Ok(samples)
}
