//! Error types for pool operations

/// Errors that cross the pool's public boundary.
///
/// Individual probe failures never appear here; they are recorded on the
/// affected credential's status instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no valid credential available ({invalid} of {total} invalid)")]
    NoCredentialAvailable { total: usize, invalid: usize },

    #[error("invalid pool configuration: {0}")]
    Config(String),
}

/// Result alias for pool operations.
pub type Result<T> = std::result::Result<T, Error>;
