/// Database Module
///
/// A thin data-access layer over a pluggable SQL driver, organized into
/// focused submodules.
///
/// ## Architecture
///
/// - **Values and rows** (`value.rs`, `row.rs`): driver-neutral column values
///   and named result rows
/// - **Drivers** (`driver.rs`, `sqlite.rs`, `network.rs`): the process-wide
///   driver adapter and the concrete raw connections behind it
/// - **Connections** (`connection.rs`, `context.rs`): lazily opened
///   connections held by a per-thread [`ExecutionContext`]
/// - **Scopes** (`scope.rs`, `transaction.rs`): nested connection and
///   transaction guards
/// - **Query Execution** (`query.rs`): parameterized reads and writes
///
/// ## Error Handling
///
/// All database operations return the crate-wide `DbError`.
///
/// ## Usage
///
/// ```ignore
/// use websetup::args;
/// use websetup::core::db::{self, ExecutionContext, ConnectParams};
///
/// db::initialize("embedded-file", ConnectParams::new("app.db"))?;
/// let mut ctx = ExecutionContext::new();
/// ctx.insert("user", [("loginName", "eva"), ("loginPwd", "x")])?;
/// let eva = ctx.select_one("select * from user where loginName=?", args!["eva"])?;
/// ```
pub mod connection;
pub mod context;
pub mod driver;
#[cfg(feature = "mysql")]
pub mod network;
pub mod query;
pub mod row;
pub mod scope;
pub mod sqlite;
pub mod transaction;
pub mod value;

pub use connection::{Connection, ConnectionState, Cursor};
pub use context::ExecutionContext;
pub use driver::{
    driver, init_connector, initialize, is_initialized, ConnectFn, ConnectParams, DriverAdapter,
    DriverKind, RawConnection, ResultSet, DEFAULT_NETWORK_PORT, GENERIC_PLACEHOLDER,
};
pub use query::{to_native_placeholders, StatementType, SLOW_QUERY_THRESHOLD};
pub use row::RowRecord;
pub use scope::{with_connection, ConnectionScope};
pub use transaction::{with_transaction, TransactionScope};
pub use value::{FromValue, Value};
