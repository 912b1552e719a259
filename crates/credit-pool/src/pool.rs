//! Pool state, selection policy and cached accessor
//!
//! The pool owns a fixed credential list and one `PoolState` snapshot behind a
//! `RwLock`: cached statuses, the currently preferred credential, and the time
//! of the last probe batch. A refresh replaces statuses and timestamp in one
//! write, so readers never observe a half-applied batch.
//!
//! Probe batches are serialized by `refresh_gate`. A caller that waited on the
//! gate re-checks staleness before probing, so concurrent callers that all saw
//! a stale cache share one batch instead of each running their own.

use std::sync::Arc;
use std::time::Duration;

use budget_probe::BudgetProbe;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::credential::Credential;
use crate::error::{Error, Result};
use crate::metrics;
use crate::refresh;
use crate::status::CredentialStatus;

/// Minimum time between unforced probe batches.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(300);

/// Deadline for a single credential's probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Remaining budget (USD) below which a credential counts as running out.
pub const MIN_REMAINING_USD: f64 = 0.1;

/// Tunables for refresh cadence and selection.
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub refresh_interval: Duration,
    pub probe_timeout: Duration,
    pub min_remaining_usd: f64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            min_remaining_usd: MIN_REMAINING_USD,
        }
    }
}

/// Mutable pool snapshot.
///
/// `statuses` is either empty (never refreshed) or holds one entry per
/// configured credential, in configuration order. `current` indexes into it.
/// `selected_this_window` is set when `current` was chosen against the
/// statuses now cached and cleared by every refresh; while set, reselecting
/// would pick the same credential.
#[derive(Default)]
struct PoolState {
    statuses: Vec<CredentialStatus>,
    current: Option<usize>,
    last_refresh: Option<Instant>,
    selected_this_window: bool,
}

impl PoolState {
    fn is_stale(&self, interval: Duration) -> bool {
        match self.last_refresh {
            None => true,
            Some(at) => at.elapsed() > interval || self.statuses.is_empty(),
        }
    }

    fn current_status(&self) -> Option<&CredentialStatus> {
        self.current.and_then(|i| self.statuses.get(i))
    }

    /// Current credential when the cache needs no reselection: it is above
    /// the threshold, or it is already the best of a low-budget set.
    fn keep_current(&self, min_remaining_usd: f64) -> Option<&CredentialStatus> {
        self.current_status().filter(|s| {
            s.valid() && (self.selected_this_window || s.remaining_usd() >= min_remaining_usd)
        })
    }
}

/// Budget-aware credential pool.
pub struct Pool {
    credentials: Vec<Credential>,
    probe: Arc<dyn BudgetProbe>,
    settings: PoolSettings,
    state: RwLock<PoolState>,
    refresh_gate: Mutex<()>,
}

impl Pool {
    /// Create a pool over a fixed credential list.
    ///
    /// No probe is issued here; the first `get_current` (or an explicit
    /// `refresh_all`) populates the cache. An empty list is rejected.
    pub fn new(
        credentials: Vec<Credential>,
        probe: Arc<dyn BudgetProbe>,
        settings: PoolSettings,
    ) -> Result<Self> {
        if credentials.is_empty() {
            return Err(Error::Config("credential list is empty".into()));
        }
        info!(
            credentials = credentials.len(),
            probe = probe.id(),
            refresh_interval_secs = settings.refresh_interval.as_secs(),
            probe_timeout_secs = settings.probe_timeout.as_secs(),
            min_remaining_usd = settings.min_remaining_usd,
            "pool initialized"
        );
        Ok(Self {
            credentials,
            probe,
            settings,
            state: RwLock::new(PoolState::default()),
            refresh_gate: Mutex::new(()),
        })
    }

    /// Probe every credential now, regardless of cache age.
    ///
    /// Individual probe failures are recorded as invalid statuses; this never
    /// fails. Waits for any batch already in flight before starting its own.
    pub async fn refresh_all(&self) -> Vec<CredentialStatus> {
        let _gate = self.refresh_gate.lock().await;
        self.run_refresh().await
    }

    /// Pick the valid credential with the most cached remaining budget and make
    /// it current.
    ///
    /// Never probes. Running low is degraded, not fatal: if every valid
    /// credential is below the threshold the best of them is still returned.
    /// Fails only when no credential is valid (including before the first
    /// refresh).
    pub async fn select_best(&self) -> Result<Credential> {
        let mut state = self.state.write().await;
        self.select_locked(&mut state)
    }

    /// The credential the next unit of work should use.
    ///
    /// Probes at most once per refresh interval; otherwise answers from the
    /// cache, reselecting when the current credential's cached budget has
    /// dropped below the threshold. Reselection runs at most once per batch
    /// when every valid credential is already below it.
    pub async fn get_current(&self) -> Result<Credential> {
        let stale = self.state.read().await.is_stale(self.settings.refresh_interval);
        if stale {
            self.refresh_if_stale().await;
            return self.select_best().await;
        }

        {
            let state = self.state.read().await;
            if let Some(status) = state.keep_current(self.settings.min_remaining_usd) {
                return Ok(status.credential().clone());
            }
        }

        // Slow path: no current credential, or it looks exhausted. Re-check
        // under the write lock since another caller may have reselected.
        let mut state = self.state.write().await;
        if let Some(status) = state.keep_current(self.settings.min_remaining_usd) {
            return Ok(status.credential().clone());
        }
        if let Some(status) = state.current_status() {
            warn!(
                credential_id = %status.credential().fingerprint(),
                preview = %status.credential().preview(),
                remaining_usd = status.remaining_usd(),
                threshold_usd = self.settings.min_remaining_usd,
                "current credential below threshold, selecting new credential"
            );
        }
        self.select_locked(&mut state)
    }

    /// Snapshot of the cached statuses (empty before the first refresh).
    pub async fn statuses(&self) -> Vec<CredentialStatus> {
        self.state.read().await.statuses.clone()
    }

    /// Currently preferred credential, if one has been selected.
    pub async fn current(&self) -> Option<Credential> {
        self.state
            .read()
            .await
            .current_status()
            .map(|s| s.credential().clone())
    }

    /// Time since the last completed probe batch.
    pub async fn last_refresh_age(&self) -> Option<Duration> {
        self.state.read().await.last_refresh.map(|at| at.elapsed())
    }

    pub fn settings(&self) -> &PoolSettings {
        &self.settings
    }

    /// Number of configured credentials (duplicates included).
    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    /// Pool health summary for the health endpoint.
    ///
    /// Status mapping: never refreshed → pending, no valid credential →
    /// unhealthy, any invalid credential or best budget below threshold →
    /// degraded, otherwise healthy. Tokens are never included.
    pub async fn health(&self) -> serde_json::Value {
        let state = self.state.read().await;
        let total = self.credentials.len();

        let Some(last_refresh) = state.last_refresh else {
            return serde_json::json!({
                "status": "pending",
                "credentials_total": total,
                "credentials_valid": 0,
                "credentials_invalid": 0,
                "last_refresh_secs_ago": null,
                "current": null,
                "credentials": []
            });
        };

        let valid = state.statuses.iter().filter(|s| s.valid()).count();
        let invalid = state.statuses.len() - valid;
        let best_remaining = best_index(&state.statuses).map(|i| state.statuses[i].remaining_usd());

        let status = match best_remaining {
            None => "unhealthy",
            Some(best) if invalid > 0 || best < self.settings.min_remaining_usd => "degraded",
            Some(_) => "healthy",
        };

        let credentials: Vec<serde_json::Value> = state
            .statuses
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let mut entry = s.to_json();
                entry["current"] = serde_json::Value::Bool(state.current == Some(i));
                entry
            })
            .collect();

        serde_json::json!({
            "status": status,
            "credentials_total": total,
            "credentials_valid": valid,
            "credentials_invalid": invalid,
            "last_refresh_secs_ago": last_refresh.elapsed().as_secs(),
            "current": state.current_status().map(|s| s.credential().fingerprint()),
            "credentials": credentials
        })
    }

    /// Probe unless another caller refreshed while we waited on the gate.
    async fn refresh_if_stale(&self) {
        let _gate = self.refresh_gate.lock().await;
        if self.state.read().await.is_stale(self.settings.refresh_interval) {
            self.run_refresh().await;
        } else {
            debug!("cache refreshed by a concurrent caller, skipping probe batch");
        }
    }

    /// Run one probe batch and swap in the results. Caller holds `refresh_gate`.
    async fn run_refresh(&self) -> Vec<CredentialStatus> {
        info!(credentials = self.credentials.len(), "checking budget for all credentials");
        let started = Instant::now();

        let statuses = refresh::probe_all(
            self.probe.as_ref(),
            &self.credentials,
            self.settings.probe_timeout,
        )
        .await;

        refresh::log_statuses(&statuses, self.settings.min_remaining_usd);
        let valid = statuses.iter().filter(|s| s.valid()).count();
        metrics::record_refresh(
            started.elapsed().as_secs_f64(),
            valid,
            statuses.len() - valid,
        );

        let mut state = self.state.write().await;
        state.statuses = statuses.clone();
        state.last_refresh = Some(Instant::now());
        state.selected_this_window = false;
        statuses
    }

    fn select_locked(&self, state: &mut PoolState) -> Result<Credential> {
        let Some(idx) = best_index(&state.statuses) else {
            let invalid = state.statuses.iter().filter(|s| !s.valid()).count();
            error!(
                total = self.credentials.len(),
                invalid,
                "no valid credentials available"
            );
            metrics::record_selection(metrics::OUTCOME_EXHAUSTED);
            state.current = None;
            state.selected_this_window = false;
            return Err(Error::NoCredentialAvailable {
                total: self.credentials.len(),
                invalid,
            });
        };

        let best = &state.statuses[idx];
        let credential = best.credential();
        let remaining = best.remaining_usd();

        if remaining >= self.settings.min_remaining_usd {
            info!(
                credential_id = %credential.fingerprint(),
                preview = %credential.preview(),
                remaining_usd = remaining,
                "selected credential"
            );
            metrics::record_selection(metrics::OUTCOME_OK);
        } else {
            warn!(
                credential_id = %credential.fingerprint(),
                preview = %credential.preview(),
                remaining_usd = remaining,
                threshold_usd = self.settings.min_remaining_usd,
                "all credentials below threshold, using best available"
            );
            metrics::record_selection(metrics::OUTCOME_LOW_BUDGET);
        }

        let credential = credential.clone();
        state.current = Some(idx);
        state.selected_this_window = true;
        Ok(credential)
    }
}

/// Index of the valid status with the greatest remaining budget.
///
/// Stable: among equal budgets the earliest configured credential wins.
fn best_index(statuses: &[CredentialStatus]) -> Option<usize> {
    let mut candidates: Vec<usize> = (0..statuses.len())
        .filter(|&i| statuses[i].valid())
        .collect();
    candidates.sort_by(|&a, &b| {
        statuses[b]
            .remaining_usd()
            .total_cmp(&statuses[a].remaining_usd())
    });
    candidates.first().copied()
}
