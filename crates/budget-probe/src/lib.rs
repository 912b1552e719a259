//! Budget probe abstraction for metered API credentials
//!
//! Defines the `BudgetProbe` trait that decouples the credential pool from the
//! provider's account endpoints. `ApifyProbe` is the production implementation;
//! tests substitute scripted probes behind the same trait object.

pub mod apify;
pub mod error;

pub use apify::{ApifyProbe, DEFAULT_API_BASE};
pub use error::{ProbeError, Result, classify_status};

use std::future::Future;
use std::pin::Pin;

/// Budget figures reported by the provider for one credential.
///
/// Both values are in USD and non-negative. The remaining budget is derived by
/// the caller, never reported directly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BudgetReport {
    /// Usage allowance included in the credential's plan for the current period
    pub included_usd: f64,
    /// Period-to-date consumption
    pub used_usd: f64,
}

/// One network round trip (or a fixed pair of them) that reports a credential's
/// current budget.
///
/// Implementations must not retry internally and need not enforce a timeout:
/// the caller wraps every call in its own deadline.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility (`Arc<dyn BudgetProbe>`).
pub trait BudgetProbe: Send + Sync {
    /// Identifier for logging (e.g. "apify")
    fn id(&self) -> &str;

    /// Query the provider for `credential`'s included and used budget.
    fn probe<'a>(
        &'a self,
        credential: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<BudgetReport>> + Send + 'a>>;
}
