/// Lazy Connection Module
///
/// A `Connection` wraps at most one raw driver connection. Nothing is opened
/// until the first cursor is requested, and a closed connection never reopens.
use crate::core::{DbError, Result};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use super::driver::{DriverAdapter, RawConnection, ResultSet};
use super::value::Value;

/// Lifecycle of a [`Connection`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No raw connection has been requested yet
    Unopened,
    /// A raw connection is held
    Open,
    /// The raw connection has been released
    Closed,
}

enum Slot {
    Unopened,
    Open(Box<dyn RawConnection>),
    Closed,
}

/// A lazily opened connection owned by one execution context
pub struct Connection {
    driver: Arc<DriverAdapter>,
    slot: Slot,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("driver", &self.driver)
            .field("state", &self.state())
            .finish()
    }
}

impl Connection {
    /// Creates an unopened connection for `driver`.
    pub fn new(driver: Arc<DriverAdapter>) -> Self {
        Connection {
            driver,
            slot: Slot::Unopened,
        }
    }

    pub fn state(&self) -> ConnectionState {
        match self.slot {
            Slot::Unopened => ConnectionState::Unopened,
            Slot::Open(_) => ConnectionState::Open,
            Slot::Closed => ConnectionState::Closed,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.slot, Slot::Open(_))
    }

    /// The driver this connection opens through
    pub fn driver(&self) -> &DriverAdapter {
        &self.driver
    }

    /// Returns a cursor, opening the raw connection on first use.
    ///
    /// # Errors
    ///
    /// `DbError::Database` if the driver fails to connect or the connection
    /// was already closed.
    pub fn cursor(&mut self) -> Result<Cursor<'_>> {
        if let Slot::Unopened = self.slot {
            debug!("open connection...");
            let raw = self.driver.connect()?;
            self.slot = Slot::Open(raw);
        }
        match &mut self.slot {
            Slot::Open(raw) => Ok(Cursor { raw: raw.as_mut() }),
            _ => Err(DbError::database("connection is closed")),
        }
    }

    pub fn commit(&mut self) -> Result<()> {
        self.raw("commit")?.commit()
    }

    pub fn rollback(&mut self) -> Result<()> {
        self.raw("rollback")?.rollback()
    }

    /// Releases the raw connection. A no-op unless the connection is open.
    pub fn close(&mut self) -> Result<()> {
        if !self.is_open() {
            return Ok(());
        }
        match std::mem::replace(&mut self.slot, Slot::Closed) {
            Slot::Open(raw) => {
                debug!("close connection...");
                raw.close()
            }
            _ => Ok(()),
        }
    }

    fn raw(&mut self, operation: &str) -> Result<&mut dyn RawConnection> {
        match &mut self.slot {
            Slot::Open(raw) => Ok(raw.as_mut()),
            _ => Err(DbError::database(format!("cannot {}: connection is not open", operation))),
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("failed to close connection: {}", e);
        }
    }
}

/// Statement handle borrowed from an open [`Connection`]
pub struct Cursor<'c> {
    raw: &'c mut dyn RawConnection,
}

impl Cursor<'_> {
    /// Runs a row-producing statement.
    pub fn query(&mut self, sql: &str, args: &[Value], max_rows: Option<usize>) -> Result<ResultSet> {
        self.raw.query(sql, args, max_rows)
    }

    /// Runs a write, returning the affected row count.
    pub fn execute(&mut self, sql: &str, args: &[Value]) -> Result<u64> {
        self.raw.execute(sql, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{recording_driver, Event, Faults};

    #[test]
    fn test_opens_lazily_on_first_cursor() {
        let (driver, journal) = recording_driver(Faults::default());
        let mut conn = Connection::new(driver);

        assert_eq!(conn.state(), ConnectionState::Unopened);
        assert_eq!(journal.count(&Event::Open), 0);

        conn.cursor().unwrap().execute("insert into t values (?)", &[Value::from(1)]).unwrap();
        conn.cursor().unwrap().query("select * from t", &[], None).unwrap();

        assert_eq!(conn.state(), ConnectionState::Open);
        assert_eq!(journal.count(&Event::Open), 1);
    }

    #[test]
    fn test_commit_requires_open_connection() {
        let (driver, journal) = recording_driver(Faults::default());
        let mut conn = Connection::new(driver);

        assert!(matches!(conn.commit(), Err(DbError::Database(_))));
        assert!(matches!(conn.rollback(), Err(DbError::Database(_))));
        assert!(journal.events().is_empty());
    }

    #[test]
    fn test_closed_connection_never_reopens() {
        let (driver, journal) = recording_driver(Faults::default());
        let mut conn = Connection::new(driver);

        conn.cursor().unwrap();
        conn.close().unwrap();
        assert_eq!(conn.state(), ConnectionState::Closed);

        assert!(conn.cursor().is_err());
        conn.close().unwrap();
        assert_eq!(journal.count(&Event::Open), 1);
        assert_eq!(journal.count(&Event::Close), 1);
    }

    #[test]
    fn test_close_is_a_noop_when_unopened() {
        let (driver, journal) = recording_driver(Faults::default());
        let mut conn = Connection::new(driver);

        conn.close().unwrap();
        assert_eq!(conn.state(), ConnectionState::Unopened);
        drop(conn);
        assert!(journal.events().is_empty());
    }

    #[test]
    fn test_connect_failure_leaves_connection_unopened() {
        let (driver, _journal) = recording_driver(Faults {
            open: true,
            ..Faults::default()
        });
        let mut conn = Connection::new(driver);

        assert!(conn.cursor().is_err());
        assert_eq!(conn.state(), ConnectionState::Unopened);
    }

    #[test]
    fn test_drop_closes_open_connection() {
        let (driver, journal) = recording_driver(Faults::default());
        {
            let mut conn = Connection::new(driver);
            conn.cursor().unwrap();
        }
        assert_eq!(journal.count(&Event::Close), 1);
    }
}
