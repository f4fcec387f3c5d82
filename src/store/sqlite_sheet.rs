use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::{Connection, Transaction, TransactionBehavior, params};

use super::{SheetBackend, Table};
use crate::error::StoreError;

/// Worksheet host backed by a SQLite file that several annotators share.
/// Only whole-table fetch and overwrite are exposed.
pub struct SqliteSheet {
    conn: Mutex<Connection>,
    worksheet: String,
    location: String,
}

impl SqliteSheet {
    pub fn open(path: &Path, worksheet: &str) -> Result<Self, StoreError> {
        let location = format!("{}#{worksheet}", path.display());
        let conn = Connection::open(path)
            .map_err(|err| StoreError::unavailable(&location, err))?;
        configure_connection(&conn).map_err(|err| StoreError::unavailable(&location, err))?;
        Self::from_connection(conn, worksheet, location)
    }

    pub fn memory(worksheet: &str) -> Result<Self, StoreError> {
        let location = format!(":memory:#{worksheet}");
        let conn = Connection::open_in_memory()
            .map_err(|err| StoreError::unavailable(&location, err))?;
        Self::from_connection(conn, worksheet, location)
    }

    fn from_connection(
        conn: Connection,
        worksheet: &str,
        location: String,
    ) -> Result<Self, StoreError> {
        ensure_schema(&conn).map_err(|err| StoreError::unavailable(&location, err))?;
        Ok(Self {
            conn: Mutex::new(conn),
            worksheet: worksheet.to_string(),
            location,
        })
    }

    fn with_conn<T>(
        &self,
        op: impl FnOnce(&mut Connection) -> rusqlite::Result<T>,
    ) -> Result<T, StoreError> {
        let mut guard = self
            .conn
            .lock()
            .map_err(|_| StoreError::unavailable(&self.location, "connection lock poisoned"))?;
        op(&mut guard).map_err(|err| StoreError::unavailable(&self.location, err))
    }
}

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.busy_timeout(Duration::from_secs(5))?;
    Ok(())
}

fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS sheet_columns (
          worksheet TEXT NOT NULL,
          col_idx INTEGER NOT NULL,
          name TEXT NOT NULL,
          PRIMARY KEY (worksheet, col_idx)
        );

        CREATE TABLE IF NOT EXISTS sheet_rows (
          worksheet TEXT NOT NULL,
          row_idx INTEGER NOT NULL,
          cells_json TEXT NOT NULL,
          PRIMARY KEY (worksheet, row_idx)
        );
        ",
    )
}

impl SheetBackend for SqliteSheet {
    fn describe(&self) -> String {
        self.location.clone()
    }

    fn fetch(&self) -> Result<Option<Table>, StoreError> {
        let (columns, raw_rows) = self.with_conn(|conn| {
            let mut statement = conn.prepare(
                "SELECT name FROM sheet_columns WHERE worksheet = ?1 ORDER BY col_idx ASC",
            )?;
            let columns = statement
                .query_map(params![self.worksheet], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let mut statement = conn.prepare(
                "SELECT cells_json FROM sheet_rows WHERE worksheet = ?1 ORDER BY row_idx ASC",
            )?;
            let raw_rows = statement
                .query_map(params![self.worksheet], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok((columns, raw_rows))
        })?;

        if columns.is_empty() {
            return Ok(None);
        }

        let mut table = Table::new(&columns);
        for (index, raw) in raw_rows.iter().enumerate() {
            let cells: Vec<String> = serde_json::from_str(raw).map_err(|err| {
                StoreError::corrupt(&self.location, format!("row {index}: {err}"))
            })?;
            table.push_row(cells);
        }
        table.ensure_rectangular(&self.location)?;

        Ok(Some(table))
    }

    fn overwrite(&self, table: &Table) -> Result<(), StoreError> {
        let encoded = self.encode_rows(table)?;
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            self.replace_sheet(&tx, table, &encoded)?;
            tx.commit()
        })
    }

    fn row_count(&self) -> Result<usize, StoreError> {
        self.with_conn(|conn| self.count_rows(conn))
    }

    fn overwrite_if_unchanged(
        &self,
        expected_rows: usize,
        table: &Table,
    ) -> Result<bool, StoreError> {
        let encoded = self.encode_rows(table)?;
        self.with_conn(|conn| {
            // IMMEDIATE takes the write lock before the count, so no other
            // connection can commit between the check and the rewrite.
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            if self.count_rows(&tx)? != expected_rows {
                return Ok(false);
            }
            self.replace_sheet(&tx, table, &encoded)?;
            tx.commit()?;
            Ok(true)
        })
    }
}

impl SqliteSheet {
    fn encode_rows(&self, table: &Table) -> Result<Vec<String>, StoreError> {
        table
            .rows
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| StoreError::write(&self.location, err))
    }

    fn count_rows(&self, conn: &Connection) -> rusqlite::Result<usize> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sheet_rows WHERE worksheet = ?1",
            params![self.worksheet],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as usize)
    }

    fn replace_sheet(
        &self,
        tx: &Transaction<'_>,
        table: &Table,
        encoded: &[String],
    ) -> rusqlite::Result<()> {
        tx.execute(
            "DELETE FROM sheet_columns WHERE worksheet = ?1",
            params![self.worksheet],
        )?;
        tx.execute(
            "DELETE FROM sheet_rows WHERE worksheet = ?1",
            params![self.worksheet],
        )?;
        for (index, name) in table.columns.iter().enumerate() {
            tx.execute(
                "INSERT INTO sheet_columns(worksheet, col_idx, name) VALUES(?1, ?2, ?3)",
                params![self.worksheet, index as i64, name],
            )?;
        }
        for (index, cells) in encoded.iter().enumerate() {
            tx.execute(
                "INSERT INTO sheet_rows(worksheet, row_idx, cells_json) VALUES(?1, ?2, ?3)",
                params![self.worksheet, index as i64, cells],
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{SharedSheetStore, TableStore};

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn fetch_on_fresh_worksheet_is_none() {
        let sheet = SqliteSheet::memory("evaluations").expect("open");
        assert!(sheet.fetch().expect("fetch").is_none());
        assert_eq!(sheet.row_count().expect("count"), 0);
    }

    #[test]
    fn overwrite_replaces_whole_worksheet() {
        let sheet = SqliteSheet::memory("evaluations").expect("open");

        let mut first = Table::new(&["annotator", "sample_id"]);
        first.push_row(row(&["Ada", "0"]));
        first.push_row(row(&["Ada", "1"]));
        sheet.overwrite(&first).expect("first overwrite");

        let mut second = Table::new(&["annotator", "sample_id"]);
        second.push_row(row(&["Bo", "2"]));
        sheet.overwrite(&second).expect("second overwrite");

        let table = sheet.fetch().expect("fetch").expect("present");
        assert_eq!(table, second);
        assert_eq!(sheet.row_count().expect("count"), 1);
    }

    #[test]
    fn worksheets_are_isolated_in_one_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("shared.sqlite");

        let evaluations = SqliteSheet::open(&path, "evaluations").expect("open evaluations");
        let mut table = Table::new(&["sample_id"]);
        table.push_row(row(&["3"]));
        evaluations.overwrite(&table).expect("overwrite");

        let other = SqliteSheet::open(&path, "pilot").expect("open pilot");
        assert!(other.fetch().expect("fetch").is_none());

        let reopened = SqliteSheet::open(&path, "evaluations").expect("reopen");
        assert_eq!(reopened.fetch().expect("fetch"), Some(table));
    }

    #[test]
    fn conditional_overwrite_refuses_when_another_connection_wrote() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("shared.sqlite");
        let ours = SqliteSheet::open(&path, "evaluations").expect("open ours");
        let theirs = SqliteSheet::open(&path, "evaluations").expect("open theirs");

        let baseline = ours.row_count().expect("count");
        let mut their_rows = Table::new(&["annotator", "sample_id"]);
        their_rows.push_row(row(&["Bo", "1"]));
        theirs.overwrite(&their_rows).expect("their write");

        let mut our_rows = Table::new(&["annotator", "sample_id"]);
        our_rows.push_row(row(&["Ada", "0"]));
        let written = ours
            .overwrite_if_unchanged(baseline, &our_rows)
            .expect("conditional overwrite");

        assert!(!written);
        assert_eq!(ours.fetch().expect("fetch"), Some(their_rows.clone()));

        let written = ours
            .overwrite_if_unchanged(1, &our_rows)
            .expect("conditional overwrite");
        assert!(written);
        assert_eq!(theirs.fetch().expect("fetch"), Some(our_rows));
    }

    #[test]
    fn shared_store_over_sqlite_keeps_duplicate_rows() {
        let store = SharedSheetStore::new(SqliteSheet::memory("evaluations").expect("open"), 3);

        let mut submission = Table::new(&["annotator", "sample_id"]);
        submission.push_row(row(&["Ada", "5"]));
        store.append_and_commit(&submission).expect("first");
        store.append_and_commit(&submission).expect("second");

        let table = store.read_all().expect("read").expect("present");
        assert_eq!(table.rows, vec![row(&["Ada", "5"]), row(&["Ada", "5"])]);
    }
}
