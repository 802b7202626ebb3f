/// Driver Adapter Module
///
/// A driver is a connect function plus the placeholder token its SQL dialect
/// expects. The process-wide adapter is recorded once by [`initialize`] (or
/// [`init_connector`]) and is read-only afterwards.
use crate::core::{DbError, Result};
use once_cell::sync::OnceCell;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

use super::sqlite::SqliteConnection;
use super::value::Value;

/// Default port of the network SQL backend
pub const DEFAULT_NETWORK_PORT: u16 = 3306;

/// Generic placeholder used in all caller-supplied SQL
pub const GENERIC_PLACEHOLDER: &str = "?";

/// Column names and rows produced by a query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// One raw connection of a concrete driver.
///
/// SQL handed to these methods already uses the driver's native placeholder.
/// Implementations keep DB-API transaction semantics: writes run inside an
/// implicit transaction that only `commit` or `rollback` ends.
pub trait RawConnection: Send {
    /// Runs a row-producing statement, reading at most `max_rows` rows.
    fn query(&mut self, sql: &str, args: &[Value], max_rows: Option<usize>) -> Result<ResultSet>;

    /// Runs a write and returns the affected row count.
    fn execute(&mut self, sql: &str, args: &[Value]) -> Result<u64>;

    fn commit(&mut self) -> Result<()>;

    fn rollback(&mut self) -> Result<()>;

    fn close(self: Box<Self>) -> Result<()>;
}

/// Function producing a fresh raw connection
pub type ConnectFn = dyn Fn() -> Result<Box<dyn RawConnection>> + Send + Sync;

/// Supported driver kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverKind {
    /// Server database reached over the network (MySQL protocol)
    NetworkSql,
    /// Single-file embedded database (SQLite)
    EmbeddedFile,
    /// Connector registered through [`init_connector`]
    Custom,
}

impl FromStr for DriverKind {
    type Err = DbError;

    fn from_str(kind: &str) -> Result<Self> {
        match kind.trim().to_ascii_lowercase().as_str() {
            "network-sql" | "mysql" => Ok(DriverKind::NetworkSql),
            "embedded-file" | "sqlite" | "sqlite3" => Ok(DriverKind::EmbeddedFile),
            _ => Err(DbError::UnsupportedDriver(kind.to_string())),
        }
    }
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverKind::NetworkSql => write!(f, "network-sql"),
            DriverKind::EmbeddedFile => write!(f, "embedded-file"),
            DriverKind::Custom => write!(f, "custom"),
        }
    }
}

/// Connection parameters for [`initialize`].
///
/// `schema` is the database name for network-sql and the file path for
/// embedded-file. Driver-specific settings go into `options`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ConnectParams {
    pub schema: String,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

impl ConnectParams {
    pub fn new(schema: impl Into<String>) -> Self {
        ConnectParams {
            schema: schema.into(),
            ..Default::default()
        }
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self.password = Some(password.into());
        self
    }

    pub fn option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }
}

/// Fills in the network-sql defaults: port 3306, utf8 charset, unicode text.
#[cfg_attr(not(feature = "mysql"), allow(dead_code))]
pub(crate) fn normalize_network_params(mut params: ConnectParams) -> ConnectParams {
    if params.port.unwrap_or(0) == 0 {
        params.port = Some(DEFAULT_NETWORK_PORT);
    }
    params
        .options
        .entry("charset".to_string())
        .or_insert_with(|| "utf8".to_string());
    params
        .options
        .entry("use_unicode".to_string())
        .or_insert_with(|| "true".to_string());
    params
}

/// A connect function bound to its placeholder token
pub struct DriverAdapter {
    kind: DriverKind,
    placeholder: String,
    connect: Box<ConnectFn>,
}

impl fmt::Debug for DriverAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverAdapter")
            .field("kind", &self.kind)
            .field("placeholder", &self.placeholder)
            .finish_non_exhaustive()
    }
}

impl DriverAdapter {
    /// Builds the adapter for a named driver kind.
    pub fn from_kind(kind: &str, params: ConnectParams) -> Result<Self> {
        match kind.parse::<DriverKind>()? {
            DriverKind::EmbeddedFile => Ok(DriverAdapter::embedded_file(params)),
            DriverKind::NetworkSql => DriverAdapter::network_sql(params),
            DriverKind::Custom => Err(DbError::UnsupportedDriver(kind.to_string())),
        }
    }

    /// Adapter opening `params.schema` as an embedded database file.
    pub fn embedded_file(params: ConnectParams) -> Self {
        debug!("init embedded-file driver: {}", params.schema);
        DriverAdapter {
            kind: DriverKind::EmbeddedFile,
            placeholder: GENERIC_PLACEHOLDER.to_string(),
            connect: Box::new(move || {
                let conn = SqliteConnection::open(&params.schema, &params.options)?;
                Ok(Box::new(conn) as Box<dyn RawConnection>)
            }),
        }
    }

    /// Adapter for the network SQL server.
    #[cfg(feature = "mysql")]
    pub fn network_sql(params: ConnectParams) -> Result<Self> {
        use super::network::MySqlConnection;

        let params = normalize_network_params(params);
        debug!(
            "init network-sql driver: {}:{}",
            params.host.as_deref().unwrap_or("localhost"),
            params.port.unwrap_or(DEFAULT_NETWORK_PORT)
        );
        Ok(DriverAdapter {
            kind: DriverKind::NetworkSql,
            placeholder: MySqlConnection::PLACEHOLDER.to_string(),
            connect: Box::new(move || {
                let conn = MySqlConnection::open(&params)?;
                Ok(Box::new(conn) as Box<dyn RawConnection>)
            }),
        })
    }

    /// Adapter for the network SQL server.
    #[cfg(not(feature = "mysql"))]
    pub fn network_sql(_params: ConnectParams) -> Result<Self> {
        Err(DbError::UnsupportedDriver(
            "network-sql (built without the `mysql` feature)".to_string(),
        ))
    }

    /// Adapter around a caller-supplied connect function.
    pub fn custom<F>(placeholder: impl Into<String>, connect: F) -> Self
    where
        F: Fn() -> Result<Box<dyn RawConnection>> + Send + Sync + 'static,
    {
        DriverAdapter {
            kind: DriverKind::Custom,
            placeholder: placeholder.into(),
            connect: Box::new(connect),
        }
    }

    pub fn kind(&self) -> DriverKind {
        self.kind
    }

    /// The placeholder token the driver accepts in SQL text
    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    /// Opens a new raw connection.
    pub fn connect(&self) -> Result<Box<dyn RawConnection>> {
        (self.connect)()
    }
}

/// Process-wide driver, written once before any query runs
static DRIVER: OnceCell<Arc<DriverAdapter>> = OnceCell::new();

/// Records the process-wide driver for `kind`.
///
/// # Errors
///
/// `UnsupportedDriver` for an unknown kind, `AlreadyInitialized` if a driver
/// was already recorded. A failed call leaves the process uninitialized.
///
/// # Examples
///
/// ```ignore
/// initialize("embedded-file", ConnectParams::new("websetup.db"))?;
/// ```
pub fn initialize(kind: &str, params: ConnectParams) -> Result<()> {
    debug!("init {}...", kind);
    let adapter = DriverAdapter::from_kind(kind, params)?;
    install(adapter)
}

/// Records a caller-supplied connect function as the process-wide driver.
pub fn init_connector<F>(placeholder: impl Into<String>, connect: F) -> Result<()>
where
    F: Fn() -> Result<Box<dyn RawConnection>> + Send + Sync + 'static,
{
    debug!("init connector...");
    install(DriverAdapter::custom(placeholder, connect))
}

fn install(adapter: DriverAdapter) -> Result<()> {
    DRIVER
        .set(Arc::new(adapter))
        .map_err(|_| DbError::AlreadyInitialized)
}

/// Returns the process-wide driver.
pub fn driver() -> Result<Arc<DriverAdapter>> {
    DRIVER.get().cloned().ok_or(DbError::UninitializedDatabase)
}

/// Checks whether a process-wide driver has been recorded
pub fn is_initialized() -> bool {
    DRIVER.get().is_some()
}
