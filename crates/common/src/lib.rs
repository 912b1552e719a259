//! Shared types for the Apify token pool workspace

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
