// Core infrastructure modules
pub mod core;

// Application configuration
pub mod config;

#[cfg(test)]
mod test_utils;

pub use crate::core::db::{
    with_connection, with_transaction, ConnectParams, ExecutionContext, RowRecord, Value,
};
pub use crate::core::{DbError, Result};
