/// Query Execution Module
///
/// The query executor: parameterized reads and writes issued through an
/// [`ExecutionContext`]. Each call runs inside a [`ConnectionScope`], so a
/// bare context gets a connection for the duration of the call while an
/// enclosing scope's connection is reused. Writes outside a transaction are
/// committed immediately; writes inside one wait for the outermost
/// [`TransactionScope`](super::TransactionScope).
///
/// All SQL uses `?` placeholders. They are rewritten to the driver's native
/// token just before execution.
use crate::core::{DbError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::context::ExecutionContext;
use super::driver::{ResultSet, GENERIC_PLACEHOLDER};
use super::row::RowRecord;
use super::scope::ConnectionScope;
use super::transaction::commit_with_recovery;
use super::value::{FromValue, Value};

/// Executions slower than this are logged as warnings instead of info
pub const SLOW_QUERY_THRESHOLD: Duration = Duration::from_millis(100);

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$")
        .expect("identifier pattern is valid")
});

/// Logs how long an execution took. Never affects the execution itself.
pub(crate) fn profile(start: Instant, sql: &str) {
    let elapsed = start.elapsed();
    if elapsed > SLOW_QUERY_THRESHOLD {
        warn!("[PROFILING] [DB] {:.6}: {}", elapsed.as_secs_f64(), sql);
    } else {
        info!("[PROFILING] [DB] {:.6}: {}", elapsed.as_secs_f64(), sql);
    }
}

/// Rewrites generic `?` placeholders to the driver's native token.
///
/// Question marks inside single-quoted literals are left alone. SQL is
/// returned unchanged when the driver already uses `?`.
pub fn to_native_placeholders<'s>(sql: &'s str, placeholder: &str) -> Cow<'s, str> {
    if placeholder == GENERIC_PLACEHOLDER || !sql.contains('?') {
        return Cow::Borrowed(sql);
    }
    let mut native = String::with_capacity(sql.len() + 8);
    let mut in_literal = false;
    for ch in sql.chars() {
        match ch {
            '\'' => {
                in_literal = !in_literal;
                native.push(ch);
            }
            '?' if !in_literal => native.push_str(placeholder),
            _ => native.push(ch),
        }
    }
    Cow::Owned(native)
}

fn check_identifier(what: &str, name: &str) -> Result<()> {
    if IDENTIFIER.is_match(name) {
        Ok(())
    } else {
        Err(DbError::InvalidArgument(format!("invalid {} name: {:?}", what, name)))
    }
}

/// Splits a field map into validated column names and aligned values.
fn split_fields<I, K, V>(fields: I) -> Result<(Vec<String>, Vec<Value>)>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<Value>,
{
    let mut columns = Vec::new();
    let mut values = Vec::new();
    for (column, value) in fields {
        let column = column.as_ref();
        check_identifier("column", column)?;
        columns.push(column.to_string());
        values.push(value.into());
    }
    Ok((columns, values))
}

impl ExecutionContext {
    /// Runs a query and returns every row; an empty vector when nothing matches.
    pub fn select_all(&mut self, sql: &str, args: &[Value]) -> Result<Vec<RowRecord>> {
        self.select(sql, args, None)
    }

    /// Runs a query and returns its first row, if any.
    pub fn select_one(&mut self, sql: &str, args: &[Value]) -> Result<Option<RowRecord>> {
        Ok(self.select(sql, args, Some(1))?.into_iter().next())
    }

    /// Runs a query expected to produce a single one-column row.
    ///
    /// # Errors
    ///
    /// `NoRow` when the query matches nothing, `MultiColumn` when the row
    /// has more than one column.
    pub fn select_scalar(&mut self, sql: &str, args: &[Value]) -> Result<Value> {
        let row = self.select_one(sql, args)?.ok_or(DbError::NoRow)?;
        if row.len() != 1 {
            return Err(DbError::MultiColumn(row.len()));
        }
        row.into_values().pop().ok_or(DbError::NoRow)
    }

    /// [`select_scalar`](Self::select_scalar) converted to an integer.
    pub fn select_int(&mut self, sql: &str, args: &[Value]) -> Result<i64> {
        i64::from_value(&self.select_scalar(sql, args)?)
    }

    /// Inserts one row built from `(column, value)` pairs.
    ///
    /// ```ignore
    /// ctx.insert("user", [("loginName", "eva"), ("loginPwd", "x")])?;
    /// ```
    pub fn insert<I, K, V>(&mut self, table: &str, fields: I) -> Result<u64>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        check_identifier("table", table)?;
        let (columns, values) = split_fields(fields)?;
        if columns.is_empty() {
            return Err(DbError::InvalidArgument("no fields to insert".to_string()));
        }
        let sql = format!(
            "insert into {} ({}) values ({})",
            table,
            columns.join(","),
            vec![GENERIC_PLACEHOLDER; columns.len()].join(",")
        );
        self.execute_write(&sql, &values)
    }

    /// Runs a write statement and returns the affected row count.
    pub fn update(&mut self, sql: &str, args: &[Value]) -> Result<u64> {
        self.execute_write(sql, args)
    }

    /// Updates `table` rows matching `where_clause`, setting each field.
    ///
    /// Field values bind before `where_args`.
    ///
    /// ```ignore
    /// ctx.update_by_key("user", "loginName=?", args!["eva"], [("loginPwd", "newpwd")])?;
    /// ```
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `fields` is empty.
    pub fn update_by_key<I, K, V>(
        &mut self,
        table: &str,
        where_clause: &str,
        where_args: &[Value],
        fields: I,
    ) -> Result<u64>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        check_identifier("table", table)?;
        let (columns, mut values) = split_fields(fields)?;
        if columns.is_empty() {
            return Err(DbError::InvalidArgument("no fields to update".to_string()));
        }
        let assignments: Vec<String> = columns
            .iter()
            .map(|c| format!("{}={}", c, GENERIC_PLACEHOLDER))
            .collect();
        let sql = format!(
            "update {} set {} where {}",
            table,
            assignments.join(", "),
            where_clause
        );
        values.extend_from_slice(where_args);
        self.execute_write(&sql, &values)
    }

    fn select(&mut self, sql: &str, args: &[Value], max_rows: Option<usize>) -> Result<Vec<RowRecord>> {
        let mut scope = ConnectionScope::enter(self)?;
        let connection = scope.connection_mut()?;
        let sql = to_native_placeholders(sql, connection.driver().placeholder()).into_owned();
        debug!("SQL: {}, ARGS: {:?}", sql, args);

        let start = Instant::now();
        let result = connection
            .cursor()
            .and_then(|mut cursor| cursor.query(&sql, args, max_rows));
        profile(start, &sql);

        let ResultSet { columns, rows } = result?;
        let columns: Arc<[String]> = columns.into();
        Ok(rows
            .into_iter()
            .map(|values| RowRecord::new(Arc::clone(&columns), values))
            .collect())
    }

    fn execute_write(&mut self, sql: &str, args: &[Value]) -> Result<u64> {
        let mut scope = ConnectionScope::enter(self)?;
        let in_transaction = scope.transaction_depth() > 0;
        let connection = scope.connection_mut()?;
        let sql = to_native_placeholders(sql, connection.driver().placeholder()).into_owned();
        debug!("SQL: {}, ARGS: {:?}", sql, args);

        let start = Instant::now();
        let result = connection
            .cursor()
            .and_then(|mut cursor| cursor.execute(&sql, args));
        let result = match result {
            Ok(affected) if !in_transaction => {
                debug!("auto commit");
                commit_with_recovery(connection).map(|()| affected)
            }
            Err(e) if !in_transaction && connection.is_open() => {
                if let Err(rollback) = connection.rollback() {
                    warn!("rollback after failed write failed: {}", rollback);
                }
                Err(e)
            }
            other => other,
        };
        profile(start, &sql);
        result
    }
}

/// Represents different SQL statement types for introspection
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatementType {
    /// SELECT statement, or another row-producing read
    Select,
    /// INSERT statement
    Insert,
    /// UPDATE statement
    Update,
    /// DELETE statement
    Delete,
    /// CREATE, DROP or ALTER statement
    Ddl,
    /// PRAGMA statement
    Pragma,
    /// BEGIN/COMMIT/ROLLBACK transaction commands
    Transaction,
    /// Other statement types
    Other,
}

impl StatementType {
    /// Determines the statement type from its leading keyword
    pub fn from_sql(sql: &str) -> Self {
        let keyword = sql
            .trim_start()
            .split(|c: char| c.is_whitespace() || c == '(' || c == ';')
            .next()
            .unwrap_or("")
            .to_ascii_uppercase();

        match keyword.as_str() {
            "SELECT" | "WITH" | "VALUES" | "SHOW" | "DESCRIBE" | "EXPLAIN" => StatementType::Select,
            "INSERT" | "REPLACE" => StatementType::Insert,
            "UPDATE" => StatementType::Update,
            "DELETE" => StatementType::Delete,
            "CREATE" | "DROP" | "ALTER" => StatementType::Ddl,
            "PRAGMA" => StatementType::Pragma,
            "BEGIN" | "COMMIT" | "ROLLBACK" | "START" => StatementType::Transaction,
            _ => StatementType::Other,
        }
    }

    /// Whether the statement produces a result set
    pub fn returns_rows(&self) -> bool {
        matches!(self, StatementType::Select | StatementType::Pragma)
    }
}
