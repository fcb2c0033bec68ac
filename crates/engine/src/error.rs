use inspectsync_core::CoreError;
use inspectsync_storage::StorageError;
use thiserror::Error;

use crate::submit::ValidationError;
use crate::transport::TransportError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("cancelled after {0}")]
    Cancelled(&'static str),

    #[error("entry {index} out of range for {key} ({len} entries)")]
    EntryOutOfRange { key: String, index: usize, len: usize },

    #[error("section {0} does not hold repeatable entries")]
    NotRepeatable(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
