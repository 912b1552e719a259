//! Probe fan-out
//!
//! Probes every credential concurrently, each under its own timeout, and turns
//! every outcome (success, failure or timeout) into exactly one status. One
//! failing probe never affects the others. The futures run inside the caller's
//! task, so dropping the caller abandons every in-flight probe.

use std::time::Duration;

use budget_probe::{BudgetProbe, ProbeError};
use futures_util::future::join_all;
use tracing::{error, info};

use crate::credential::Credential;
use crate::metrics;
use crate::status::CredentialStatus;

/// Probe all credentials and return their statuses in configuration order.
pub(crate) async fn probe_all(
    probe: &dyn BudgetProbe,
    credentials: &[Credential],
    timeout: Duration,
) -> Vec<CredentialStatus> {
    let probes = credentials
        .iter()
        .map(|credential| probe_one(probe, credential, timeout));
    join_all(probes).await
}

async fn probe_one(
    probe: &dyn BudgetProbe,
    credential: &Credential,
    timeout: Duration,
) -> CredentialStatus {
    let outcome = match tokio::time::timeout(timeout, probe.probe(credential.expose())).await {
        Ok(result) => result,
        Err(_) => Err(ProbeError::Timeout(timeout)),
    };

    match outcome {
        Ok(report) => CredentialStatus::from_report(credential.clone(), report),
        Err(e) => {
            error!(
                credential_id = %credential.fingerprint(),
                preview = %credential.preview(),
                reason = e.reason(),
                error = %e,
                "budget probe failed"
            );
            metrics::record_probe_failure(e.reason());
            CredentialStatus::failed(credential.clone(), &e)
        }
    }
}

/// Emit one line per credential and a summary line for a finished batch.
pub(crate) fn log_statuses(statuses: &[CredentialStatus], min_remaining_usd: f64) {
    for (i, status) in statuses.iter().enumerate() {
        let credential = status.credential();
        if status.valid() {
            info!(
                index = i + 1,
                credential_id = %credential.fingerprint(),
                preview = %credential.preview(),
                remaining_usd = status.remaining_usd(),
                used_usd = status.used_usd(),
                included_usd = status.included_usd(),
                used_percent = status.used_percent(),
                below_threshold = status.remaining_usd() < min_remaining_usd,
                "credential budget"
            );
        } else {
            error!(
                index = i + 1,
                credential_id = %credential.fingerprint(),
                preview = %credential.preview(),
                error = status.last_error().unwrap_or("unknown error"),
                "credential invalid"
            );
        }
    }

    let valid = statuses.iter().filter(|s| s.valid()).count();
    info!(
        total = statuses.len(),
        valid,
        invalid = statuses.len() - valid,
        "budget check complete"
    );
}
