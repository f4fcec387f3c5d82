use std::collections::BTreeMap;

use rand::distributions::Standard;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};

use crate::error::BlindingError;
use crate::model::{BlindingAssignment, SampleId, Slot};
use crate::store::{Table, TableStore};

pub const DEFAULT_SEED: u64 = 42;
pub const MIXED_IS_A_THRESHOLD: f64 = 0.5;

const ID_COLUMN: &str = "id";
const MIXED_COLUMN: &str = "Mixed_is";
const CE_COLUMN: &str = "CE_is";

pub trait DrawSource {
    /// Next uniform draw in `[0, 1)`.
    fn next_draw(&mut self) -> f64;
}

pub struct SeededDraws {
    rng: StdRng,
}

impl SeededDraws {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl DrawSource for SeededDraws {
    fn next_draw(&mut self) -> f64 {
        self.rng.sample(Standard)
    }
}

pub fn slot_for_draw(draw: f64) -> Slot {
    if draw < MIXED_IS_A_THRESHOLD {
        Slot::A
    } else {
        Slot::B
    }
}

/// Stable A/B placement of the Mixed output for every sample id `0..len`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlindingMap {
    assignments: Vec<BlindingAssignment>,
}

impl BlindingMap {
    pub fn generate(sample_count: usize, draws: &mut dyn DrawSource) -> Self {
        let assignments = (0..sample_count)
            .map(|index| BlindingAssignment {
                sample_id: index as SampleId,
                mixed_is: slot_for_draw(draws.next_draw()),
            })
            .collect();
        Self { assignments }
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    pub fn get(&self, sample_id: SampleId) -> Option<&BlindingAssignment> {
        usize::try_from(sample_id)
            .ok()
            .and_then(|index| self.assignments.get(index))
    }

    pub fn assignments(&self) -> &[BlindingAssignment] {
        &self.assignments
    }

    pub fn to_table(&self) -> Table {
        let mut table = Table::new(&[ID_COLUMN, MIXED_COLUMN, CE_COLUMN]);
        for assignment in &self.assignments {
            table.push_row(vec![
                assignment.sample_id.to_string(),
                assignment.mixed_is.to_string(),
                assignment.cross_entropy_is().to_string(),
            ]);
        }
        table
    }

    pub fn from_table(table: &Table) -> Result<Self, BlindingError> {
        let id_index = table
            .column_index(ID_COLUMN)
            .ok_or_else(|| BlindingError::Corrupt(format!("missing `{ID_COLUMN}` column")))?;
        let mixed_index = table
            .column_index(MIXED_COLUMN)
            .ok_or_else(|| BlindingError::Corrupt(format!("missing `{MIXED_COLUMN}` column")))?;
        let ce_index = table.column_index(CE_COLUMN);

        let mut by_id = BTreeMap::<SampleId, Slot>::new();
        for (line, row) in table.rows.iter().enumerate() {
            let cell = |index: usize| row.get(index).map(String::as_str).unwrap_or("");

            let raw_id = cell(id_index);
            let sample_id = raw_id.trim().parse::<SampleId>().map_err(|_| {
                BlindingError::Corrupt(format!("row {line}: invalid id `{raw_id}`"))
            })?;
            let mixed_is = Slot::parse(cell(mixed_index)).ok_or_else(|| {
                BlindingError::Corrupt(format!(
                    "row {line}: invalid {MIXED_COLUMN} `{}`",
                    cell(mixed_index)
                ))
            })?;

            if let Some(ce_index) = ce_index {
                let ce_is = Slot::parse(cell(ce_index));
                if ce_is != Some(mixed_is.other()) {
                    return Err(BlindingError::Corrupt(format!(
                        "row {line}: {CE_COLUMN} `{}` does not complement {MIXED_COLUMN} `{mixed_is}`",
                        cell(ce_index)
                    )));
                }
            }

            if by_id.insert(sample_id, mixed_is).is_some() {
                return Err(BlindingError::Corrupt(format!(
                    "duplicate assignment for id {sample_id}"
                )));
            }
        }

        let mut assignments = Vec::with_capacity(by_id.len());
        for (expected, (sample_id, mixed_is)) in by_id.into_iter().enumerate() {
            if sample_id != expected as SampleId {
                return Err(BlindingError::Corrupt(format!(
                    "ids are not contiguous: expected {expected}, found {sample_id}"
                )));
            }
            assignments.push(BlindingAssignment {
                sample_id,
                mixed_is,
            });
        }

        Ok(Self { assignments })
    }
}

#[derive(Debug, Clone)]
pub struct BlindingOutcome {
    pub map: BlindingMap,
    pub generated: bool,
}

fn reuse(
    store: &dyn TableStore,
    table: &Table,
    sample_count: usize,
) -> Result<BlindingOutcome, BlindingError> {
    let map = BlindingMap::from_table(table)?;
    if map.len() != sample_count {
        return Err(BlindingError::SizeMismatch {
            persisted: map.len(),
            samples: sample_count,
        });
    }
    info!(
        mapping = %store.location(),
        samples = map.len(),
        "reusing persisted blinding mapping"
    );
    Ok(BlindingOutcome {
        map,
        generated: false,
    })
}

/// Reuses the persisted mapping when one exists, otherwise draws a new one
/// and writes it exactly once. An unreadable or malformed mapping is an
/// error and is never replaced. When another session persists its mapping
/// between our read and our write, that mapping is read back and used.
pub fn load_or_generate(
    store: &dyn TableStore,
    sample_count: usize,
    draws: &mut dyn DrawSource,
) -> Result<BlindingOutcome, BlindingError> {
    if let Some(table) = store.read_all()? {
        return reuse(store, &table, sample_count);
    }

    let map = BlindingMap::generate(sample_count, draws);
    if map.is_empty() {
        return Ok(BlindingOutcome {
            map,
            generated: false,
        });
    }

    if !store.create_once(&map.to_table())? {
        warn!(
            mapping = %store.location(),
            "blinding mapping was persisted by another session; using it"
        );
        let table = store.read_all()?.ok_or_else(|| {
            BlindingError::Corrupt("mapping disappeared after a concurrent write".to_string())
        })?;
        return reuse(store, &table, sample_count);
    }
    info!(
        mapping = %store.location(),
        samples = map.len(),
        "generated and persisted blinding mapping"
    );

    Ok(BlindingOutcome {
        map,
        generated: true,
    })
}
