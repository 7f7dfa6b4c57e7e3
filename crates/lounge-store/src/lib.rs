//! Persistence layer for the lounge service
//!
//! Provides:
//! - Session snapshot (complete overwrite on every change)
//! - Slot layout snapshot
//! - Daily usage log (one JSON file per calendar day)
//! - Member directory (CSV)
//! - In-memory stores for tests

mod daily_log;
mod file;
mod json;
mod members;
mod memory;
mod traits;

pub use daily_log::*;
pub use json::*;
pub use members::*;
pub use memory::*;
pub use traits::*;

use thiserror::Error;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<csv::Error> for StoreError {
    fn from(e: csv::Error) -> Self {
        StoreError::Csv(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
