use tracing::{info, warn};

use super::{Table, TableStore};
use crate::error::StoreError;

/// A worksheet host that can only hand out and replace the whole table.
pub trait SheetBackend {
    fn describe(&self) -> String;

    fn fetch(&self) -> Result<Option<Table>, StoreError>;

    fn overwrite(&self, table: &Table) -> Result<(), StoreError>;

    fn row_count(&self) -> Result<usize, StoreError> {
        Ok(self.fetch()?.map(|table| table.len()).unwrap_or(0))
    }

    /// Replaces the table only if it still holds `expected_rows` rows.
    /// Returns `false` without writing when the count moved.
    ///
    /// The default checks and writes in two steps, so a writer landing
    /// in between is lost. Backends with transactions override this to
    /// make the check and the write one unit.
    fn overwrite_if_unchanged(
        &self,
        expected_rows: usize,
        table: &Table,
    ) -> Result<bool, StoreError> {
        if self.row_count()? != expected_rows {
            return Ok(false);
        }
        self.overwrite(table)?;
        Ok(true)
    }
}

/// Multi-annotator store over a [`SheetBackend`].
///
/// Appends are a read-modify-write of the entire worksheet. The write goes
/// through [`SheetBackend::overwrite_if_unchanged`] with the row count seen
/// when the table was fetched; on mismatch the append is retried from a
/// fresh read. Whether a writer racing the final check can still be lost
/// depends on the backend: [`super::SqliteSheet`] checks and writes in one
/// immediate transaction, the default implementation does not.
pub struct SharedSheetStore<B> {
    backend: B,
    max_attempts: u32,
}

impl<B: SheetBackend> SharedSheetStore<B> {
    pub fn new(backend: B, max_attempts: u32) -> Self {
        Self {
            backend,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn merge(&self, current: Option<Table>, rows: &Table) -> Result<Table, StoreError> {
        match current {
            Some(existing) if !existing.columns.is_empty() => {
                if !existing.has_columns(&rows.columns) {
                    return Err(StoreError::SchemaMismatch {
                        location: self.backend.describe(),
                        expected: existing.columns.join(","),
                        found: rows.columns.join(","),
                    });
                }
                let mut merged = existing;
                merged.rows.extend(rows.rows.iter().cloned());
                Ok(merged)
            }
            _ => Ok(rows.clone()),
        }
    }
}

impl<B: SheetBackend> TableStore for SharedSheetStore<B> {
    fn location(&self) -> String {
        self.backend.describe()
    }

    fn read_all(&self) -> Result<Option<Table>, StoreError> {
        self.backend.fetch()
    }

    fn append_and_commit(&self, rows: &Table) -> Result<(), StoreError> {
        let location = self.location();
        rows.ensure_rectangular(&location)?;
        if rows.is_empty() {
            return Ok(());
        }

        for attempt in 1..=self.max_attempts {
            let current = self.backend.fetch()?;
            let baseline = current.as_ref().map(Table::len).unwrap_or(0);
            let merged = self.merge(current, rows)?;

            if !self.backend.overwrite_if_unchanged(baseline, &merged)? {
                warn!(
                    sheet = %location,
                    attempt,
                    baseline,
                    "worksheet changed since read; retrying append"
                );
                continue;
            }

            info!(
                sheet = %location,
                appended = rows.len(),
                total_rows = merged.len(),
                "committed worksheet"
            );
            return Ok(());
        }

        Err(StoreError::ConcurrentModification {
            location,
            attempts: self.max_attempts,
        })
    }

    fn create_once(&self, rows: &Table) -> Result<bool, StoreError> {
        let location = self.location();
        rows.ensure_rectangular(&location)?;

        let existing = self.backend.fetch()?;
        if existing.as_ref().is_some_and(|table| !table.columns.is_empty()) {
            return Ok(false);
        }
        let created = self.backend.overwrite_if_unchanged(0, rows)?;
        if created {
            info!(sheet = %location, rows = rows.len(), "created worksheet");
        }
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use super::*;

    #[derive(Default)]
    struct MemorySheet {
        table: RefCell<Option<Table>>,
        overwrites: Cell<usize>,
        // Rows another session appends each time a row count is taken.
        intruder_rows: Cell<usize>,
    }

    impl SheetBackend for MemorySheet {
        fn describe(&self) -> String {
            "memory://evaluations".to_string()
        }

        fn fetch(&self) -> Result<Option<Table>, StoreError> {
            Ok(self.table.borrow().clone())
        }

        fn overwrite(&self, table: &Table) -> Result<(), StoreError> {
            self.overwrites.set(self.overwrites.get() + 1);
            *self.table.borrow_mut() = Some(table.clone());
            Ok(())
        }

        fn row_count(&self) -> Result<usize, StoreError> {
            if self.intruder_rows.get() > 0 {
                self.intruder_rows.set(self.intruder_rows.get() - 1);
                let mut guard = self.table.borrow_mut();
                let table = guard.get_or_insert_with(|| Table::new(&["annotator", "sample_id"]));
                table.push_row(vec!["Other".to_string(), "9".to_string()]);
            }
            Ok(self.table.borrow().as_ref().map(Table::len).unwrap_or(0))
        }
    }

    fn single_row(annotator: &str, sample_id: &str) -> Table {
        let mut table = Table::new(&["annotator", "sample_id"]);
        table.push_row(vec![annotator.to_string(), sample_id.to_string()]);
        table
    }

    #[test]
    fn append_creates_sheet_then_extends_it() {
        let store = SharedSheetStore::new(MemorySheet::default(), 3);

        store
            .append_and_commit(&single_row("Ada", "0"))
            .expect("first append");
        store
            .append_and_commit(&single_row("Ada", "0"))
            .expect("duplicate append");

        let table = store.read_all().expect("read").expect("present");
        assert_eq!(table.len(), 2);
        assert_eq!(store.backend().overwrites.get(), 2);
    }

    #[test]
    fn append_retries_when_rows_arrive_between_read_and_write() {
        let backend = MemorySheet::default();
        backend.intruder_rows.set(1);
        let store = SharedSheetStore::new(backend, 3);

        store
            .append_and_commit(&single_row("Ada", "4"))
            .expect("append after retry");

        let table = store.read_all().expect("read").expect("present");
        let ids: Vec<&str> = table.rows.iter().map(|row| row[1].as_str()).collect();
        assert_eq!(ids, vec!["9", "4"]);
        assert_eq!(store.backend().overwrites.get(), 1);
    }

    #[test]
    fn append_gives_up_after_max_attempts() {
        let backend = MemorySheet::default();
        backend.intruder_rows.set(5);
        let store = SharedSheetStore::new(backend, 2);

        let err = store
            .append_and_commit(&single_row("Ada", "4"))
            .expect_err("persistent contention should fail");
        assert!(matches!(
            err,
            StoreError::ConcurrentModification { attempts: 2, .. }
        ));
        assert_eq!(store.backend().overwrites.get(), 0);
    }

    #[test]
    fn create_once_leaves_a_populated_sheet_alone() {
        let store = SharedSheetStore::new(MemorySheet::default(), 3);

        assert!(store.create_once(&single_row("Ada", "0")).expect("create"));
        assert!(!store.create_once(&single_row("Bo", "1")).expect("second create"));

        let table = store.read_all().expect("read").expect("present");
        assert_eq!(table.rows, vec![vec!["Ada".to_string(), "0".to_string()]]);
        assert_eq!(store.backend().overwrites.get(), 1);
    }

    #[test]
    fn create_once_yields_to_a_writer_that_lands_first() {
        let backend = MemorySheet::default();
        backend.intruder_rows.set(1);
        let store = SharedSheetStore::new(backend, 3);

        assert!(!store.create_once(&single_row("Ada", "0")).expect("create"));
        assert_eq!(store.backend().overwrites.get(), 0);
    }

    #[test]
    fn append_rejects_foreign_columns() {
        let store = SharedSheetStore::new(MemorySheet::default(), 1);
        store
            .append_and_commit(&single_row("Ada", "0"))
            .expect("seed");

        let mut foreign = Table::new(&["sample_id"]);
        foreign.push_row(vec!["1".to_string()]);
        let err = store
            .append_and_commit(&foreign)
            .expect_err("column mismatch");
        assert!(matches!(err, StoreError::SchemaMismatch { .. }));
    }
}
