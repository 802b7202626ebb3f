/// Embedded-file driver backed by SQLite.
use crate::core::{DbError, Result};
use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params_from_iter, Connection};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

use super::driver::{RawConnection, ResultSet};
use super::query::StatementType;
use super::value::Value;

/// A raw SQLite connection with DB-API style implicit transactions.
///
/// Only INSERT, UPDATE, DELETE and REPLACE open the implicit transaction.
/// Anything else runs bare unless one is already pending, so statements
/// such as `VACUUM` or `PRAGMA journal_mode` keep working.
#[derive(Debug)]
pub struct SqliteConnection {
    conn: Connection,
}

impl SqliteConnection {
    /// Opens the database file at `path`, or ":memory:" for a private
    /// in-memory database.
    ///
    /// Recognized options: `journal_mode`, `foreign_keys`, `busy_timeout_ms`.
    pub fn open(path: &str, options: &BTreeMap<String, String>) -> Result<Self> {
        let conn = Connection::open(path)?;

        if let Some(mode) = options.get("journal_mode") {
            let applied: String =
                conn.pragma_update_and_check(None, "journal_mode", mode, |row| row.get(0))?;
            debug!("journal_mode = {}", applied);
        }
        if let Some(flag) = options.get("foreign_keys") {
            conn.pragma_update(None, "foreign_keys", parse_flag(flag)?)?;
        }
        if let Some(ms) = options.get("busy_timeout_ms") {
            let ms: u64 = ms.parse().map_err(|_| {
                DbError::InvalidArgument(format!("busy_timeout_ms must be an integer, got {}", ms))
            })?;
            conn.busy_timeout(Duration::from_millis(ms))?;
        }

        Ok(SqliteConnection { conn })
    }

    fn begin_if_idle(&mut self) -> Result<()> {
        if self.conn.is_autocommit() {
            self.conn.execute_batch("BEGIN IMMEDIATE")?;
        }
        Ok(())
    }
}

fn opens_transaction(sql: &str) -> bool {
    matches!(
        StatementType::from_sql(sql),
        StatementType::Insert | StatementType::Update | StatementType::Delete
    )
}

fn parse_flag(flag: &str) -> Result<bool> {
    match flag.to_ascii_lowercase().as_str() {
        "1" | "on" | "true" | "yes" => Ok(true),
        "0" | "off" | "false" | "no" => Ok(false),
        _ => Err(DbError::InvalidArgument(format!("expected a boolean flag, got {}", flag))),
    }
}

impl RawConnection for SqliteConnection {
    fn query(&mut self, sql: &str, args: &[Value], max_rows: Option<usize>) -> Result<ResultSet> {
        let mut stmt = self.conn.prepare(sql)?;

        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let column_count = stmt.column_count();
        let limit = max_rows.unwrap_or(usize::MAX);

        let mut rows = Vec::new();
        let mut cursor = stmt.query(params_from_iter(args.iter()))?;
        while rows.len() < limit {
            let Some(row) = cursor.next()? else { break };
            let mut values = Vec::with_capacity(column_count);
            for i in 0..column_count {
                values.push(Value::from(row.get_ref(i)?));
            }
            rows.push(values);
        }

        Ok(ResultSet { columns, rows })
    }

    fn execute(&mut self, sql: &str, args: &[Value]) -> Result<u64> {
        if opens_transaction(sql) {
            self.begin_if_idle()?;
        }
        let mut stmt = self.conn.prepare(sql)?;
        if stmt.column_count() == 0 {
            let affected = stmt.execute(params_from_iter(args.iter()))?;
            return Ok(affected as u64);
        }
        // Row-producing writes (e.g. `PRAGMA journal_mode=wal`) report no changes
        let mut rows = stmt.query(params_from_iter(args.iter()))?;
        while rows.next()?.is_some() {}
        Ok(0)
    }

    fn commit(&mut self) -> Result<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("COMMIT")?;
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("ROLLBACK")?;
        }
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<()> {
        self.conn.close().map_err(|(_, e)| DbError::from(e))
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Integer(i) => ToSqlOutput::from(*i),
            Value::Real(r) => ToSqlOutput::from(*r),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(f) => Value::Real(f),
            ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Value::Blob(b.to_vec()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_memory() -> Box<dyn RawConnection> {
        Box::new(SqliteConnection::open(":memory:", &BTreeMap::new()).unwrap())
    }

    #[test]
    fn test_query_reads_columns_and_values() {
        let mut conn = open_memory();
        conn.execute("CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT, value REAL, data BLOB)", &[])
            .unwrap();
        conn.execute(
            "INSERT INTO test (name, value, data) VALUES (?, ?, ?)",
            &[Value::from("Alice"), Value::from(123.45), Value::Blob(b"Hello".to_vec())],
        )
        .unwrap();
        conn.execute("INSERT INTO test (name, value) VALUES (NULL, NULL)", &[]).unwrap();

        let result = conn.query("SELECT * FROM test ORDER BY id", &[], None).unwrap();
        assert_eq!(result.columns, vec!["id", "name", "value", "data"]);
        assert_eq!(result.rows.len(), 2);
        assert_eq!(
            result.rows[0],
            vec![
                Value::Integer(1),
                Value::Text("Alice".into()),
                Value::Real(123.45),
                Value::Blob(b"Hello".to_vec())
            ]
        );
        assert_eq!(result.rows[1][1], Value::Null);
    }

    #[test]
    fn test_query_respects_row_limit() {
        let mut conn = open_memory();
        let result = conn
            .query("SELECT 1 UNION ALL SELECT 2 UNION ALL SELECT 3", &[], Some(1))
            .unwrap();
        assert_eq!(result.rows.len(), 1);
    }

    #[test]
    fn test_rollback_discards_implicit_transaction() {
        let mut conn = open_memory();
        conn.execute("CREATE TABLE t (v INTEGER)", &[]).unwrap();
        conn.commit().unwrap();

        assert_eq!(conn.execute("INSERT INTO t VALUES (?)", &[Value::from(1)]).unwrap(), 1);
        conn.rollback().unwrap();

        let result = conn.query("SELECT COUNT(*) FROM t", &[], None).unwrap();
        assert_eq!(result.rows[0][0], Value::Integer(0));
    }

    #[test]
    fn test_statements_forbidden_in_transactions_run_bare() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("maintenance.db");
        let mut conn: Box<dyn RawConnection> =
            Box::new(SqliteConnection::open(&path.to_string_lossy(), &BTreeMap::new()).unwrap());

        conn.execute("create table t (v integer)", &[]).unwrap();
        conn.commit().unwrap();
        assert_eq!(conn.execute("vacuum", &[]).unwrap(), 0);
        assert_eq!(conn.execute("pragma journal_mode=wal", &[]).unwrap(), 0);

        let mode = conn.query("pragma journal_mode", &[], None).unwrap();
        assert_eq!(mode.rows[0][0], Value::Text("wal".into()));

        // DML still opens the implicit transaction
        conn.execute("insert into t values (?)", &[Value::from(1)]).unwrap();
        conn.rollback().unwrap();
        let result = conn.query("select count(*) from t", &[], None).unwrap();
        assert_eq!(result.rows[0][0], Value::Integer(0));
    }

    #[test]
    fn test_dml_classification() {
        assert!(opens_transaction("insert into t values (1)"));
        assert!(opens_transaction("  REPLACE into t values (1)"));
        assert!(opens_transaction("update t set v=1"));
        assert!(opens_transaction("delete from t"));
        assert!(!opens_transaction("vacuum"));
        assert!(!opens_transaction("pragma journal_mode=wal"));
        assert!(!opens_transaction("create table u (v integer)"));
    }

    #[test]
    fn test_commit_without_pending_write_is_a_noop() {
        let mut conn = open_memory();
        conn.commit().unwrap();
        conn.rollback().unwrap();
        conn.close().unwrap();
    }

    #[test]
    fn test_error_handling() {
        let mut conn = open_memory();
        match conn.query("SELECT * FROM nonexistent_table", &[], None) {
            Err(DbError::Database(e)) => assert!(e.to_string().contains("no such table")),
            other => panic!("Expected Database error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_invalid_path_fails_to_open() {
        let result = SqliteConnection::open("/nonexistent/path/database.db", &BTreeMap::new());
        assert!(matches!(result, Err(DbError::Database(_))));
    }

    #[test]
    fn test_open_options() {
        let mut options = BTreeMap::new();
        options.insert("foreign_keys".to_string(), "on".to_string());
        options.insert("busy_timeout_ms".to_string(), "250".to_string());
        assert!(SqliteConnection::open(":memory:", &options).is_ok());

        options.insert("foreign_keys".to_string(), "maybe".to_string());
        assert!(matches!(
            SqliteConnection::open(":memory:", &options),
            Err(DbError::InvalidArgument(_))
        ));
    }
}
