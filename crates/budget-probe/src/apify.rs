//! Apify account budget probe
//!
//! Reads a token's monthly budget from two account endpoints:
//! 1. `GET {base}/users/me` → `data.plan.monthlyUsageCreditsUsd` (included)
//! 2. `GET {base}/users/me/usage/monthly` → `data.totalUsageCreditsUsdAfterVolumeDiscount` (used)
//!
//! Both requests are bearer-authenticated with the token being probed. A JSON
//! `null` at either path reads as 0; a missing path is a malformed response.

use std::future::Future;
use std::pin::Pin;

use reqwest::StatusCode;
use serde_json::Value;
use tracing::debug;

use crate::error::{ProbeError, Result, classify_status};
use crate::{BudgetProbe, BudgetReport};

/// Public Apify API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.apify.com/v2";

const USER_ENDPOINT: &str = "users/me";
const USAGE_ENDPOINT: &str = "users/me/usage/monthly";

const INCLUDED_POINTER: &str = "/data/plan/monthlyUsageCreditsUsd";
const USED_POINTER: &str = "/data/totalUsageCreditsUsdAfterVolumeDiscount";

/// Budget probe backed by the Apify account API.
pub struct ApifyProbe {
    client: reqwest::Client,
    api_base: String,
}

impl ApifyProbe {
    pub fn new(client: reqwest::Client, api_base: impl Into<String>) -> Self {
        let api_base = api_base.into().trim_end_matches('/').to_string();
        Self { client, api_base }
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    async fn get_json(&self, endpoint: &str, credential: &str) -> Result<Value> {
        let url = format!("{}/{endpoint}", self.api_base);
        let response = self
            .client
            .get(&url)
            .bearer_auth(credential)
            .send()
            .await
            .map_err(|e| ProbeError::Transport(format!("{endpoint}: {e}")))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(classify_status(endpoint, status.as_u16()));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| ProbeError::Malformed(format!("{endpoint}: {e}")))
    }

    async fn fetch(&self, credential: &str) -> Result<BudgetReport> {
        let user = self.get_json(USER_ENDPOINT, credential).await?;
        let included_usd = read_usd(&user, INCLUDED_POINTER)?;

        let usage = self.get_json(USAGE_ENDPOINT, credential).await?;
        let used_usd = read_usd(&usage, USED_POINTER)?;

        debug!(included_usd, used_usd, "apify budget fetched");
        Ok(BudgetReport {
            included_usd,
            used_usd,
        })
    }
}

impl BudgetProbe for ApifyProbe {
    fn id(&self) -> &str {
        "apify"
    }

    fn probe<'a>(
        &'a self,
        credential: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<BudgetReport>> + Send + 'a>> {
        Box::pin(self.fetch(credential))
    }
}

/// Read a USD amount at `pointer`. Null counts as zero.
fn read_usd(body: &Value, pointer: &str) -> Result<f64> {
    match body.pointer(pointer) {
        None => Err(ProbeError::Malformed(format!("missing field {pointer}"))),
        Some(Value::Null) => Ok(0.0),
        Some(Value::Number(n)) => match n.as_f64() {
            Some(v) if v.is_finite() && v >= 0.0 => Ok(v),
            _ => Err(ProbeError::Malformed(format!(
                "{pointer} is not a non-negative amount: {n}"
            ))),
        },
        Some(other) => Err(ProbeError::Malformed(format!(
            "{pointer} is not a number: {other}"
        ))),
    }
}
