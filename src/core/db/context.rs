/// Execution Context Module
///
/// One `ExecutionContext` belongs to one thread or task and is never shared
/// while in use. It holds at most one [`Connection`] and the current
/// transaction depth, which is what lets the layer run without locks.
use crate::core::{DbError, Result};
use std::sync::Arc;
use tracing::{debug, warn};

use super::connection::Connection;
use super::driver::{self, DriverAdapter};

/// Per-unit-of-concurrency connection and transaction state
#[derive(Debug, Default)]
pub struct ExecutionContext {
    driver: Option<Arc<DriverAdapter>>,
    connection: Option<Connection>,
    transactions: usize,
}

impl ExecutionContext {
    /// Creates a context that connects through the process-wide driver.
    ///
    /// The driver is looked up when a scope first needs a connection, so the
    /// context may be created before [`driver::initialize`] runs.
    pub fn new() -> Self {
        ExecutionContext::default()
    }

    /// Creates a context bound to an explicit driver.
    pub fn with_driver(driver: Arc<DriverAdapter>) -> Self {
        ExecutionContext {
            driver: Some(driver),
            ..ExecutionContext::default()
        }
    }

    /// Whether a scope currently holds a connection for this context
    pub fn has_connection(&self) -> bool {
        self.connection.is_some()
    }

    /// Number of active nested transaction scopes
    pub fn transaction_depth(&self) -> usize {
        self.transactions
    }

    pub fn connection(&self) -> Option<&Connection> {
        self.connection.as_ref()
    }

    pub(crate) fn connection_mut(&mut self) -> Result<&mut Connection> {
        self.connection
            .as_mut()
            .ok_or_else(|| DbError::database("no connection scope is active"))
    }

    /// Installs a lazy connection if none exists.
    ///
    /// Returns `true` when this call created it, meaning the caller owns the
    /// connection and must release it.
    pub(crate) fn ensure_connection(&mut self) -> Result<bool> {
        if self.connection.is_some() {
            return Ok(false);
        }
        let driver = match &self.driver {
            Some(driver) => Arc::clone(driver),
            None => driver::driver()?,
        };
        debug!("open lazy connection...");
        self.connection = Some(Connection::new(driver));
        self.transactions = 0;
        Ok(true)
    }

    /// Closes and clears the connection, resetting the context.
    pub(crate) fn release_connection(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            if let Err(e) = connection.close() {
                warn!("failed to close connection: {}", e);
            }
        }
        self.transactions = 0;
    }

    pub(crate) fn enter_transaction(&mut self) -> usize {
        self.transactions += 1;
        self.transactions
    }

    pub(crate) fn leave_transaction(&mut self) -> usize {
        debug_assert!(self.transactions > 0, "transaction depth underflow");
        self.transactions = self.transactions.saturating_sub(1);
        self.transactions
    }
}
