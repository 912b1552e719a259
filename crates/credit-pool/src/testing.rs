//! Scripted budget probe for pool tests

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use budget_probe::{BudgetProbe, BudgetReport, ProbeError};

/// What the fake upstream answers for one token.
#[derive(Debug, Clone)]
pub(crate) enum Scripted {
    Budget(BudgetReport),
    Fail(ProbeError),
    /// Never answers; only a caller-side timeout ends the probe.
    Hang,
}

impl Scripted {
    pub(crate) fn budget(included_usd: f64, used_usd: f64) -> Self {
        Scripted::Budget(BudgetReport {
            included_usd,
            used_usd,
        })
    }

    pub(crate) fn fail_status(status: u16) -> Self {
        Scripted::Fail(budget_probe::classify_status("users/me", status))
    }
}

/// Probe whose answers can be changed between refreshes. Unknown tokens are
/// rejected with 401.
pub(crate) struct FakeProbe {
    outcomes: Mutex<HashMap<String, Scripted>>,
    calls: AtomicUsize,
    delay: Duration,
}

impl FakeProbe {
    pub(crate) fn new() -> Self {
        Self {
            outcomes: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
        }
    }

    pub(crate) fn with(self, token: &str, outcome: Scripted) -> Self {
        self.set(token, outcome);
        self
    }

    /// Simulated network latency applied to every probe.
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn set(&self, token: &str, outcome: Scripted) {
        self.outcomes
            .lock()
            .unwrap()
            .insert(token.to_string(), outcome);
    }

    /// Total probe calls made so far.
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl BudgetProbe for FakeProbe {
    fn id(&self) -> &str {
        "fake"
    }

    fn probe<'a>(
        &'a self,
        credential: &'a str,
    ) -> Pin<Box<dyn Future<Output = budget_probe::Result<BudgetReport>> + Send + 'a>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let outcome = self.outcomes.lock().unwrap().get(credential).cloned();
        let delay = self.delay;

        Box::pin(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            match outcome {
                Some(Scripted::Budget(report)) => Ok(report),
                Some(Scripted::Fail(e)) => Err(e),
                Some(Scripted::Hang) => std::future::pending().await,
                None => Err(ProbeError::Unauthorized { status: 401 }),
            }
        })
    }
}
