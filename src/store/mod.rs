mod csv_file;
mod shared_sheet;
mod sqlite_sheet;

pub use csv_file::CsvFileStore;
pub use shared_sheet::{SharedSheetStore, SheetBackend};
pub use sqlite_sheet::SqliteSheet;

use crate::error::StoreError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new<S: AsRef<str>>(columns: &[S]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    pub fn has_columns(&self, expected: &[String]) -> bool {
        self.columns == expected
    }

    pub fn cell<'a>(&self, row: &'a [String], column: &str) -> Option<&'a str> {
        self.column_index(column)
            .and_then(|index| row.get(index))
            .map(String::as_str)
    }

    pub(crate) fn ensure_rectangular(&self, location: &str) -> Result<(), StoreError> {
        let width = self.columns.len();
        match self.rows.iter().position(|row| row.len() != width) {
            Some(index) => Err(StoreError::SchemaMismatch {
                location: location.to_string(),
                expected: self.columns.join(","),
                found: format!("row {index} with {} cells", self.rows[index].len()),
            }),
            None => Ok(()),
        }
    }
}

/// Uniform access to a persisted table, local or shared.
///
/// `read_all` returns `Ok(None)` when the store has never been written.
/// `append_and_commit` adds rows at the end and never rewrites existing
/// rows from the caller's point of view; implementations that can only
/// replace the whole table document their race window.
/// `create_once` writes the table only when the store has never been
/// written and returns `false` if another writer got there first.
pub trait TableStore {
    fn location(&self) -> String;

    fn read_all(&self) -> Result<Option<Table>, StoreError>;

    fn append_and_commit(&self, rows: &Table) -> Result<(), StoreError>;

    fn create_once(&self, rows: &Table) -> Result<bool, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_looks_up_by_column_name() {
        let mut table = Table::new(&["id", "Mixed_is"]);
        table.push_row(vec!["0".to_string(), "A".to_string()]);

        assert_eq!(table.cell(&table.rows[0], "Mixed_is"), Some("A"));
        assert_eq!(table.cell(&table.rows[0], "CE_is"), None);
    }

    #[test]
    fn ensure_rectangular_rejects_short_rows() {
        let mut table = Table::new(&["a", "b"]);
        table.push_row(vec!["1".to_string()]);

        let err = table
            .ensure_rectangular("memory")
            .expect_err("short row should be rejected");
        assert!(matches!(err, StoreError::SchemaMismatch { .. }));
    }
}
