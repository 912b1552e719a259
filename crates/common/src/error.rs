//! Configuration and startup error types

use thiserror::Error;

/// Errors that prevent the service from starting.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No Apify tokens configured (set APIFY_TOKENS, APIFY_TOKEN or pool.tokens_file)")]
    NoCredentials,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result alias using common Error
pub type Result<T> = std::result::Result<T, Error>;
