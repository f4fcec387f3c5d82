use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;

use tracing::{debug, warn};

use super::{Table, TableStore};
use crate::error::StoreError;
use crate::util::ensure_directory;

/// Local CSV file store for the single-operator variant.
///
/// Appends open the file in append mode and write whole lines. Two
/// processes appending at once may interleave at the line level; the
/// tool assumes one writer at a time.
#[derive(Debug, Clone)]
pub struct CsvFileStore {
    path: PathBuf,
}

impl CsvFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn is_blank(&self) -> Result<bool, StoreError> {
        match fs::metadata(&self.path) {
            Ok(meta) => Ok(meta.len() == 0),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(true),
            Err(err) => Err(StoreError::unavailable(self.path.display(), err)),
        }
    }

    fn read_header(&self) -> Result<Vec<String>, StoreError> {
        let file = File::open(&self.path)
            .map_err(|err| StoreError::unavailable(self.path.display(), err))?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(file);
        let header = reader
            .headers()
            .map_err(|err| self.classify(err))?
            .iter()
            .map(ToOwned::to_owned)
            .collect();
        Ok(header)
    }

    fn ensure_parent(&self, location: &str) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            ensure_directory(parent).map_err(|err| StoreError::write(location, err))?;
        }
        Ok(())
    }

    fn render(&self, rows: &Table, location: &str) -> Result<Vec<u8>, StoreError> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(Vec::new());
        writer
            .write_record(&rows.columns)
            .map_err(|err| StoreError::write(location, err))?;
        for row in &rows.rows {
            writer
                .write_record(row)
                .map_err(|err| StoreError::write(location, err))?;
        }
        writer
            .into_inner()
            .map_err(|err| StoreError::write(location, err.error()))
    }

    fn classify(&self, err: csv::Error) -> StoreError {
        if err.is_io_error() {
            StoreError::unavailable(self.path.display(), err)
        } else {
            StoreError::corrupt(self.path.display(), err)
        }
    }
}

impl TableStore for CsvFileStore {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn read_all(&self) -> Result<Option<Table>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }
        if self.is_blank()? {
            warn!(path = %self.path.display(), "store file is empty");
            return Ok(None);
        }

        let file = File::open(&self.path)
            .map_err(|err| StoreError::unavailable(self.path.display(), err))?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(file);

        let columns: Vec<String> = reader
            .headers()
            .map_err(|err| self.classify(err))?
            .iter()
            .map(ToOwned::to_owned)
            .collect();
        let mut table = Table::new(&columns);

        for record in reader.records() {
            let record = record.map_err(|err| self.classify(err))?;
            table.push_row(record.iter().map(ToOwned::to_owned).collect());
        }

        debug!(path = %self.path.display(), rows = table.len(), "read csv store");
        Ok(Some(table))
    }

    fn append_and_commit(&self, rows: &Table) -> Result<(), StoreError> {
        let location = self.location();
        rows.ensure_rectangular(&location)?;
        if rows.is_empty() {
            return Ok(());
        }

        let write_header = self.is_blank()?;
        if !write_header {
            let existing = self.read_header()?;
            if !rows.has_columns(&existing) {
                return Err(StoreError::SchemaMismatch {
                    location,
                    expected: existing.join(","),
                    found: rows.columns.join(","),
                });
            }
        }

        self.ensure_parent(&location)?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|err| StoreError::write(&location, err))?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(file);

        if write_header {
            writer
                .write_record(&rows.columns)
                .map_err(|err| StoreError::write(&location, err))?;
        }
        for row in &rows.rows {
            writer
                .write_record(row)
                .map_err(|err| StoreError::write(&location, err))?;
        }
        writer
            .flush()
            .map_err(|err| StoreError::write(&location, err))?;

        debug!(path = %self.path.display(), appended = rows.len(), "appended to csv store");
        Ok(())
    }

    fn create_once(&self, rows: &Table) -> Result<bool, StoreError> {
        let location = self.location();
        rows.ensure_rectangular(&location)?;
        self.ensure_parent(&location)?;
        let bytes = self.render(rows, &location)?;

        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                if !self.is_blank()? {
                    debug!(path = %self.path.display(), "csv store already written");
                    return Ok(false);
                }
                // An empty file counts as never written; fill it from offset 0.
                OpenOptions::new()
                    .write(true)
                    .open(&self.path)
                    .map_err(|err| StoreError::write(&location, err))?
            }
            Err(err) => return Err(StoreError::write(&location, err)),
        };
        file.write_all(&bytes)
            .map_err(|err| StoreError::write(&location, err))?;

        debug!(path = %self.path.display(), rows = rows.len(), "created csv store");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn read_all_reports_missing_file_as_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = CsvFileStore::new(dir.path().join("results.csv"));

        assert!(store.read_all().expect("read").is_none());
    }

    #[test]
    fn append_writes_header_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("results.csv");
        let store = CsvFileStore::new(&path);

        let mut first = Table::new(&["sample_id", "notes"]);
        first.push_row(row(&["0", "salty, but fine"]));
        store.append_and_commit(&first).expect("first append");

        let mut second = Table::new(&["sample_id", "notes"]);
        second.push_row(row(&["1", ""]));
        store.append_and_commit(&second).expect("second append");

        let raw = fs::read_to_string(&path).expect("read file");
        assert_eq!(raw.matches("sample_id").count(), 1);

        let table = store.read_all().expect("read").expect("present");
        assert_eq!(table.columns, row(&["sample_id", "notes"]));
        assert_eq!(table.rows, vec![row(&["0", "salty, but fine"]), row(&["1", ""])]);
    }

    #[test]
    fn append_rejects_mismatched_header() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = CsvFileStore::new(dir.path().join("results.csv"));

        let mut first = Table::new(&["sample_id", "notes"]);
        first.push_row(row(&["0", "ok"]));
        store.append_and_commit(&first).expect("first append");

        let mut other = Table::new(&["annotator", "sample_id", "notes"]);
        other.push_row(row(&["Chef", "1", "ok"]));
        let err = store
            .append_and_commit(&other)
            .expect_err("header mismatch should fail");
        assert!(matches!(err, StoreError::SchemaMismatch { .. }));

        let table = store.read_all().expect("read").expect("present");
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn read_all_flags_ragged_rows_as_corrupt() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("mapping.csv");
        fs::write(&path, "id,Mixed_is\n0,A\n1\n").expect("write fixture");

        let err = CsvFileStore::new(&path)
            .read_all()
            .expect_err("ragged csv should fail");
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[test]
    fn create_once_never_touches_an_existing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("mapping.csv");
        let store = CsvFileStore::new(&path);

        let mut table = Table::new(&["id", "Mixed_is"]);
        table.push_row(row(&["0", "A"]));
        assert!(store.create_once(&table).expect("first create"));
        assert!(!store.create_once(&table).expect("second create"));

        assert_eq!(fs::read_to_string(&path).expect("read"), "id,Mixed_is\n0,A\n");
    }

    #[test]
    fn create_once_fills_an_empty_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("mapping.csv");
        fs::write(&path, "").expect("write fixture");

        let mut table = Table::new(&["id", "Mixed_is"]);
        table.push_row(row(&["0", "B"]));
        assert!(CsvFileStore::new(&path).create_once(&table).expect("create"));
        assert_eq!(fs::read_to_string(&path).expect("read"), "id,Mixed_is\n0,B\n");
    }

    #[test]
    fn empty_file_is_treated_as_absent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("results.csv");
        fs::write(&path, "").expect("write fixture");

        assert!(CsvFileStore::new(&path).read_all().expect("read").is_none());
    }
}
