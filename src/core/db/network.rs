/// Network SQL driver backed by the `mysql` crate.
use crate::core::{DbError, Result};
use mysql::prelude::Queryable;
use mysql::{Conn, OptsBuilder, Params};
use tracing::debug;

use super::driver::{ConnectParams, RawConnection, ResultSet, DEFAULT_NETWORK_PORT};
use super::value::Value;

/// A raw MySQL connection with autocommit disabled
pub struct MySqlConnection {
    conn: Conn,
    use_unicode: bool,
}

impl MySqlConnection {
    /// The driver binds positional parameters with `?`
    pub const PLACEHOLDER: &'static str = "?";

    /// Connects with already-normalized parameters.
    pub fn open(params: &ConnectParams) -> Result<Self> {
        let charset = params
            .options
            .get("charset")
            .map(String::as_str)
            .unwrap_or("utf8");
        if !charset.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(DbError::InvalidArgument(format!("invalid charset: {}", charset)));
        }
        let use_unicode = params
            .options
            .get("use_unicode")
            .map_or(true, |v| !matches!(v.as_str(), "0" | "false" | "off" | "no"));

        let opts = OptsBuilder::new()
            .ip_or_hostname(Some(params.host.clone().unwrap_or_else(|| "localhost".to_string())))
            .tcp_port(params.port.unwrap_or(DEFAULT_NETWORK_PORT))
            .user(params.user.clone())
            .pass(params.password.clone())
            .db_name(Some(params.schema.clone()))
            .init(vec![
                format!("SET NAMES {}", charset),
                "SET autocommit=0".to_string(),
            ]);

        debug!("connecting to network-sql schema {}", params.schema);
        let conn = Conn::new(opts)?;
        Ok(MySqlConnection { conn, use_unicode })
    }
}

fn to_params(args: &[Value]) -> Params {
    if args.is_empty() {
        return Params::Empty;
    }
    Params::Positional(args.iter().map(to_mysql).collect())
}

fn to_mysql(value: &Value) -> mysql::Value {
    match value {
        Value::Null => mysql::Value::NULL,
        Value::Integer(i) => mysql::Value::Int(*i),
        Value::Real(r) => mysql::Value::Double(*r),
        Value::Text(s) => mysql::Value::Bytes(s.as_bytes().to_vec()),
        Value::Blob(b) => mysql::Value::Bytes(b.clone()),
    }
}

fn from_mysql(value: mysql::Value, use_unicode: bool) -> Value {
    match value {
        mysql::Value::NULL => Value::Null,
        mysql::Value::Bytes(bytes) if use_unicode => match String::from_utf8(bytes) {
            Ok(text) => Value::Text(text),
            Err(e) => Value::Blob(e.into_bytes()),
        },
        mysql::Value::Bytes(bytes) => Value::Blob(bytes),
        mysql::Value::Int(i) => Value::Integer(i),
        mysql::Value::UInt(u) => match i64::try_from(u) {
            Ok(i) => Value::Integer(i),
            Err(_) => Value::Text(u.to_string()),
        },
        mysql::Value::Float(f) => Value::Real(f.into()),
        mysql::Value::Double(d) => Value::Real(d),
        mysql::Value::Date(year, month, day, hour, minute, second, micros) => {
            let mut text = format!(
                "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                year, month, day, hour, minute, second
            );
            if micros > 0 {
                text.push_str(&format!(".{:06}", micros));
            }
            Value::Text(text)
        }
        mysql::Value::Time(negative, days, hours, minutes, seconds, micros) => {
            let total_hours = u64::from(days) * 24 + u64::from(hours);
            let mut text = format!(
                "{}{:02}:{:02}:{:02}",
                if negative { "-" } else { "" },
                total_hours,
                minutes,
                seconds
            );
            if micros > 0 {
                text.push_str(&format!(".{:06}", micros));
            }
            Value::Text(text)
        }
    }
}

impl RawConnection for MySqlConnection {
    fn query(&mut self, sql: &str, args: &[Value], max_rows: Option<usize>) -> Result<ResultSet> {
        let use_unicode = self.use_unicode;
        let limit = max_rows.unwrap_or(usize::MAX);

        let mut result = self.conn.exec_iter(sql, to_params(args))?;
        let columns: Vec<String> = result
            .columns()
            .as_ref()
            .iter()
            .map(|c| c.name_str().into_owned())
            .collect();

        let mut rows = Vec::new();
        for row in result.by_ref() {
            if rows.len() >= limit {
                break;
            }
            let row = row?;
            rows.push(
                row.unwrap()
                    .into_iter()
                    .map(|v| from_mysql(v, use_unicode))
                    .collect(),
            );
        }

        Ok(ResultSet { columns, rows })
    }

    fn execute(&mut self, sql: &str, args: &[Value]) -> Result<u64> {
        self.conn.exec_drop(sql, to_params(args))?;
        Ok(self.conn.affected_rows())
    }

    fn commit(&mut self) -> Result<()> {
        self.conn.query_drop("COMMIT")?;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.conn.query_drop("ROLLBACK")?;
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<()> {
        drop(self.conn);
        Ok(())
    }
}
