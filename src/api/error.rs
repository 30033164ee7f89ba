//! Error types for fallible scheduler paths.

use thiserror::Error;

/// Errors from scheduler setup and contract-checked operations.
#[derive(Debug, Error)]
pub enum SchedError {
    /// Worker thread creation failed.
    #[error("failed to spawn worker thread: {0}")]
    ThreadSpawn(#[from] std::io::Error),

    /// An operation needed the global pool but none is initialized.
    #[error("scheduler not initialized")]
    NotInitialized,

    /// A dependency edge could not be recorded.
    #[error("dependency rejected: {0}")]
    DependencyRejected(&'static str),
}

/// Errors from the application loop.
#[derive(Debug, Error)]
pub enum AppError {
    /// The client's init callback failed.
    #[error("application init failed: {0}")]
    Init(String),
}

/// Errors from config file handling.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read or written.
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),

    /// Key or value exceeds the fixed limits.
    #[error("config entry too long: {0}")]
    EntryTooLong(String),

    /// The entry table is full.
    #[error("config table full")]
    TableFull,
}
