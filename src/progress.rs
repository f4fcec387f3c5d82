use std::collections::BTreeSet;

use serde::Serialize;
use tracing::warn;

use crate::error::StoreError;
use crate::model::SampleId;
use crate::store::{Table, TableStore};

pub const SAMPLE_ID_COLUMN: &str = "sample_id";
pub const ANNOTATOR_COLUMN: &str = "annotator";

/// Distinct sample ids with at least one stored evaluation.
///
/// A missing, empty, or malformed store counts as zero completed work.
/// A store that cannot be reached at all is reported as an error so a
/// remote outage is never mistaken for "nothing done yet".
pub fn completed_ids(
    store: &dyn TableStore,
    annotator: Option<&str>,
) -> Result<BTreeSet<SampleId>, StoreError> {
    match store.read_all() {
        Ok(Some(table)) => Ok(completed_ids_in(&table, annotator)),
        Ok(None) => Ok(BTreeSet::new()),
        Err(err @ StoreError::Unavailable { .. }) => Err(err),
        Err(err) => {
            warn!(store = %store.location(), error = %err, "evaluation store unreadable; treating as empty");
            Ok(BTreeSet::new())
        }
    }
}

/// Annotator names compare after trimming stray whitespace from either side.
pub fn annotator_matches(owner: &str, wanted: &str) -> bool {
    owner.trim() == wanted.trim()
}

pub fn completed_ids_in(table: &Table, annotator: Option<&str>) -> BTreeSet<SampleId> {
    let Some(id_index) = table.column_index(SAMPLE_ID_COLUMN) else {
        warn!("evaluation store has no {SAMPLE_ID_COLUMN} column; treating as empty");
        return BTreeSet::new();
    };

    let annotator_index = match annotator {
        Some(_) => match table.column_index(ANNOTATOR_COLUMN) {
            Some(index) => Some(index),
            None => return BTreeSet::new(),
        },
        None => None,
    };

    let mut skipped = 0_usize;
    let mut completed = BTreeSet::new();
    for row in &table.rows {
        if let (Some(wanted), Some(index)) = (annotator, annotator_index) {
            let owner = row.get(index).map(String::as_str).unwrap_or("");
            if !annotator_matches(owner, wanted) {
                continue;
            }
        }

        match row.get(id_index).and_then(|cell| cell.trim().parse::<SampleId>().ok()) {
            Some(sample_id) => {
                completed.insert(sample_id);
            }
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        warn!(skipped, "ignored evaluation rows with unreadable sample ids");
    }

    completed
}

/// Position in `order` of the first sample without a stored evaluation.
pub fn first_pending(order: &[SampleId], completed: &BTreeSet<SampleId>) -> Option<usize> {
    order.iter().position(|sample_id| !completed.contains(sample_id))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressSummary {
    pub completed: usize,
    pub total: usize,
}

impl ProgressSummary {
    pub fn new(order: &[SampleId], completed: &BTreeSet<SampleId>) -> Self {
        Self {
            completed: order.iter().filter(|id| completed.contains(*id)).count(),
            total: order.len(),
        }
    }

    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }

    pub fn is_done(&self) -> bool {
        self.completed == self.total
    }
}
