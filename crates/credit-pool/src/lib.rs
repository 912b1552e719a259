//! Budget-aware credential pool for metered Apify tokens
//!
//! Holds a fixed set of interchangeable tokens and answers one question: which
//! token should the next unit of work use. The answer is the valid token with
//! the most remaining monthly budget, taken from a cache that is refreshed by
//! probing every token at most once per refresh interval.
//!
//! Selection policy for `Pool::get_current`:
//! 1. Never refreshed, or last refresh older than the interval → probe all, select
//! 2. No current token yet → select from cached statuses (no probe)
//! 3. Current token's cached remaining budget below threshold → reselect from
//!    cache (no probe); otherwise keep the current token
//!
//! Concurrent refresh triggers collapse into a single probe batch.

pub mod credential;
pub mod error;
pub mod metrics;
pub mod pool;
mod refresh;
pub mod status;

#[cfg(test)]
mod testing;

pub use credential::{Credential, parse_credentials};
pub use error::{Error, Result};
pub use pool::{
    DEFAULT_PROBE_TIMEOUT, DEFAULT_REFRESH_INTERVAL, MIN_REMAINING_USD, Pool, PoolSettings,
};
pub use status::CredentialStatus;
