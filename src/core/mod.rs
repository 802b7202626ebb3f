/// Core Module for websetup
///
/// Shared infrastructure: the database access layer and the crate-wide
/// error type.

pub mod db;
pub mod error;

// Re-export commonly used types for convenience
pub use error::{DbError, Result};
