pub mod record;

use log::{info, warn};
use rusqlite::{params_from_iter, Connection};

use crate::error::{PerfLensError, Result};
use crate::scm::repo::CommitRange;
use self::record::ResultRow;

const RESULT_COLUMNS: &str = "date, build, test_name, bw, iops, latency, cluster, uniq";

/// Explicit connection lifecycle of the results store.
enum ConnectionState {
    Disconnected,
    Connected(Connection),
    Failed,
}

/// Handle to the performance-results database.
///
/// The connection is explicit: callers `connect()` before the first query and
/// `close()` on teardown. Querying while disconnected is a storage error,
/// never an empty result set.
pub struct ResultsDb {
    path: Option<String>,
    table: String,
    state: ConnectionState,
}

impl ResultsDb {
    /// Creates a disconnected handle.
    ///
    /// # Errors
    ///
    /// Rejects table names that are not plain identifiers; the table name is
    /// spliced into query text (SQL cannot bind identifiers), so anything
    /// else would be an injection hole.
    pub fn new(path: Option<String>, table: String) -> Result<Self> {
        if table.is_empty()
            || !table
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(PerfLensError::Config(format!(
                "invalid results table name: '{table}'"
            )));
        }

        Ok(Self {
            path,
            table,
            state: ConnectionState::Disconnected,
        })
    }

    /// Opens the database connection.
    pub fn connect(&mut self) -> Result<()> {
        let Some(path) = &self.path else {
            return Err(PerfLensError::Config(
                "no results database path configured".to_string(),
            ));
        };

        match Connection::open(path) {
            Ok(conn) => {
                info!("Connected to results database at '{path}'");
                self.state = ConnectionState::Connected(conn);
                Ok(())
            }
            Err(e) => {
                warn!("Results database connection failed: {e}");
                self.state = ConnectionState::Failed;
                Err(PerfLensError::Storage(format!("connection failed: {e}")))
            }
        }
    }

    /// Closes the connection; subsequent queries fail until `connect()`.
    pub fn close(&mut self) {
        if matches!(self.state, ConnectionState::Connected(_)) {
            info!("Results database connection closed");
        }
        self.state = ConnectionState::Disconnected;
    }

    fn conn(&self) -> Result<&Connection> {
        match &self.state {
            ConnectionState::Connected(conn) => Ok(conn),
            ConnectionState::Disconnected => Err(PerfLensError::Storage(
                "not connected to the results database".to_string(),
            )),
            ConnectionState::Failed => Err(PerfLensError::Storage(
                "results database connection previously failed".to_string(),
            )),
        }
    }

    /// Runs a statement that returns no rows. Used for maintenance and by
    /// tests to seed fixtures through the same connection.
    pub fn execute(&self, sql: &str) -> Result<usize> {
        let conn = self.conn()?;
        Ok(conn.execute(sql, [])?)
    }

    /// Fetches all result rows recorded under one uniq id.
    pub fn fetch_by_uniq(&self, uniq: &str) -> Result<Vec<ResultRow>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {RESULT_COLUMNS} FROM {} WHERE uniq = ?1",
            self.table
        );
        let mut statement = conn.prepare(&sql)?;
        let rows = statement
            .query_map([uniq], row_from_sql)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Fetches result rows whose stored commit hash contains any of the
    /// range's 8-character prefixes.
    ///
    /// One disjunctive query with bound `%prefix%` patterns, not one query
    /// per commit; prefixes are never spliced into the SQL text.
    pub fn fetch_by_commits(&self, range: &CommitRange) -> Result<Vec<ResultRow>> {
        let prefixes = range.prefixes();
        if prefixes.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.conn()?;
        let predicates = (1..=prefixes.len())
            .map(|i| format!("commit_hash LIKE ?{i}"))
            .collect::<Vec<_>>()
            .join(" OR ");
        let sql = format!(
            "SELECT {RESULT_COLUMNS} FROM {} WHERE {predicates}",
            self.table
        );

        let patterns: Vec<String> = prefixes
            .into_iter()
            .map(|prefix| format!("%{prefix}%"))
            .collect();

        let mut statement = conn.prepare(&sql)?;
        let rows = statement
            .query_map(params_from_iter(patterns.iter()), row_from_sql)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn row_from_sql(row: &rusqlite::Row<'_>) -> std::result::Result<ResultRow, rusqlite::Error> {
    Ok(ResultRow {
        date: row.get(0)?,
        build: row.get(1)?,
        test_name: row.get(2)?,
        bandwidth: row.get(3)?,
        iops: row.get(4)?,
        latency: row.get(5)?,
        cluster: row.get(6)?,
        uniq: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_db() -> ResultsDb {
        let mut db = ResultsDb::new(Some(":memory:".to_string()), "vperf".to_string()).unwrap();
        db.connect().unwrap();
        db.execute(
            "CREATE TABLE vperf (
                date TEXT, build TEXT, test_name TEXT,
                bw REAL, iops REAL, latency REAL,
                cluster TEXT, uniq TEXT, commit_hash TEXT
            )",
        )
        .unwrap();
        db.execute(
            "INSERT INTO vperf VALUES
             ('2024-01-01', 'b123', 'random_read_4K', 100, 5000, 2.1, 'c1', 'u1', '0123456789abcdef0123456789abcdef01234567'),
             ('2024-01-01', 'b123', 'seq_write_128K', 300, 10, 2.1, 'c1', 'u1', '0123456789abcdef0123456789abcdef01234567'),
             ('2024-02-02', 'b777', 'seq_read_1M', 900, 1, 0.5, 'c2', 'u2', 'fedcba9876543210fedcba9876543210fedcba98')",
        )
        .unwrap();
        db
    }

    #[test]
    fn test_fetch_before_connect_is_storage_error() {
        let db = ResultsDb::new(Some(":memory:".to_string()), "vperf".to_string()).unwrap();
        let result = db.fetch_by_uniq("u1");
        assert!(matches!(result, Err(PerfLensError::Storage(_))));
    }

    #[test]
    fn test_fetch_after_close_is_storage_error() {
        let mut db = seeded_db();
        db.close();
        let result = db.fetch_by_uniq("u1");
        assert!(matches!(result, Err(PerfLensError::Storage(_))));
    }

    #[test]
    fn test_fetch_by_uniq() {
        let db = seeded_db();
        let rows = db.fetch_by_uniq("u1").unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|row| row.uniq == "u1"));
        assert_eq!(rows[0].date, "2024-01-01");
    }

    #[test]
    fn test_fetch_by_uniq_empty_is_ok() {
        let db = seeded_db();
        let rows = db.fetch_by_uniq("u404").unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_fetch_by_commits_prefix_disjunction() {
        let db = seeded_db();
        let range = CommitRange::new(vec![
            // Full hash for u1's commit; abbreviated hash for u2's.
            "0123456789abcdef0123456789abcdef01234567".to_string(),
            "fedcba98".to_string(),
        ]);
        let rows = db.fetch_by_commits(&range).unwrap();
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn test_fetch_by_commits_no_match() {
        let db = seeded_db();
        let range = CommitRange::new(vec!["deadbeefdeadbeef".to_string()]);
        let rows = db.fetch_by_commits(&range).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_fetch_by_commits_empty_range_skips_query() {
        let mut db = ResultsDb::new(Some(":memory:".to_string()), "vperf".to_string()).unwrap();
        db.connect().unwrap();
        // No table exists; an empty range must not touch the database.
        let rows = db.fetch_by_commits(&CommitRange::new(Vec::new())).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_like_patterns_are_bound_not_spliced() {
        let db = seeded_db();
        let range = CommitRange::new(vec!["'; DROP TABLE vperf; --".to_string()]);
        // Treated as an (unmatchable) pattern, not as SQL.
        let rows = db.fetch_by_commits(&range).unwrap();
        assert!(rows.is_empty());
        assert_eq!(db.fetch_by_uniq("u1").unwrap().len(), 2);
    }

    #[test]
    fn test_rejects_non_identifier_table_name() {
        let result = ResultsDb::new(None, "vperf; DROP".to_string());
        assert!(matches!(result, Err(PerfLensError::Config(_))));
    }
}
