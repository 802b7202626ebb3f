/// # Test Utilities Module
///
/// A recording driver for exercising scopes and transactions without a real
/// database. Every raw-connection call is appended to a shared [`Journal`],
/// and [`Faults`] makes individual calls fail on demand.
use crate::core::db::{DriverAdapter, RawConnection, ResultSet, Value};
use crate::core::{DbError, Result};
use std::sync::{Arc, Mutex};

/// One call made against a recording connection
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Open,
    Query(String),
    Execute(String),
    Commit,
    Rollback,
    Close,
}

/// Calls that should fail
#[derive(Debug, Clone, Copy, Default)]
pub struct Faults {
    pub open: bool,
    pub execute: bool,
    pub commit: bool,
    pub rollback: bool,
}

/// Shared, ordered log of driver calls
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<Event>>>);

impl Journal {
    fn push(&self, event: Event) {
        self.0.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, event: &Event) -> usize {
        self.0.lock().unwrap().iter().filter(|e| *e == event).count()
    }

    /// SQL text of every executed write, in order
    pub fn writes(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Execute(sql) => Some(sql),
                _ => None,
            })
            .collect()
    }
}

struct RecordingConnection {
    journal: Journal,
    faults: Faults,
}

impl RawConnection for RecordingConnection {
    fn query(&mut self, sql: &str, _args: &[Value], _max_rows: Option<usize>) -> Result<ResultSet> {
        self.journal.push(Event::Query(sql.to_string()));
        Ok(ResultSet::default())
    }

    fn execute(&mut self, sql: &str, _args: &[Value]) -> Result<u64> {
        self.journal.push(Event::Execute(sql.to_string()));
        if self.faults.execute {
            return Err(DbError::database("execute failed"));
        }
        Ok(1)
    }

    fn commit(&mut self) -> Result<()> {
        self.journal.push(Event::Commit);
        if self.faults.commit {
            return Err(DbError::database("commit failed"));
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.journal.push(Event::Rollback);
        if self.faults.rollback {
            return Err(DbError::database("rollback failed"));
        }
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<()> {
        self.journal.push(Event::Close);
        Ok(())
    }
}

/// Recording driver using the generic `?` placeholder
pub fn recording_driver(faults: Faults) -> (Arc<DriverAdapter>, Journal) {
    recording_driver_with_placeholder("?", faults)
}

/// Recording driver with a custom native placeholder
pub fn recording_driver_with_placeholder(
    placeholder: &str,
    faults: Faults,
) -> (Arc<DriverAdapter>, Journal) {
    let journal = Journal::default();
    let shared = journal.clone();
    let adapter = DriverAdapter::custom(placeholder, move || {
        if faults.open {
            return Err(DbError::database("connection refused"));
        }
        shared.push(Event::Open);
        Ok(Box::new(RecordingConnection {
            journal: shared.clone(),
            faults,
        }) as Box<dyn RawConnection>)
    });
    (Arc::new(adapter), journal)
}

/// In-memory SQLite driver; every connection sees a fresh, empty database
pub fn memory_driver() -> Arc<DriverAdapter> {
    Arc::new(DriverAdapter::embedded_file(crate::core::db::ConnectParams::new(":memory:")))
}
