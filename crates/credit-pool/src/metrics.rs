//! Pool metrics
//!
//! Emitted through the `metrics` facade; the host process decides whether a
//! recorder is installed. Without one, every call here is a no-op.
//!
//! - `credit_pool_refreshes_total` (counter)
//! - `credit_pool_refresh_duration_seconds` (histogram)
//! - `credit_pool_probe_failures_total` (counter): label `reason`
//! - `credit_pool_valid_credentials` / `credit_pool_invalid_credentials` (gauges)
//! - `credit_pool_selections_total` (counter): label `outcome`

/// Histogram name for a full probe batch.
pub const REFRESH_DURATION_METRIC: &str = "credit_pool_refresh_duration_seconds";

/// Bucket boundaries for `REFRESH_DURATION_METRIC`, up to the probe timeout range.
pub const REFRESH_DURATION_BUCKETS: &[f64] =
    &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 15.0, 30.0];

/// Selection outcome label values.
pub(crate) const OUTCOME_OK: &str = "ok";
pub(crate) const OUTCOME_LOW_BUDGET: &str = "low_budget";
pub(crate) const OUTCOME_EXHAUSTED: &str = "exhausted";

/// Record a completed probe batch.
pub(crate) fn record_refresh(duration_secs: f64, valid: usize, invalid: usize) {
    metrics::counter!("credit_pool_refreshes_total").increment(1);
    metrics::histogram!(REFRESH_DURATION_METRIC).record(duration_secs);
    metrics::gauge!("credit_pool_valid_credentials").set(valid as f64);
    metrics::gauge!("credit_pool_invalid_credentials").set(invalid as f64);
}

/// Record one failed probe.
pub(crate) fn record_probe_failure(reason: &'static str) {
    metrics::counter!("credit_pool_probe_failures_total", "reason" => reason).increment(1);
}

/// Record a selection attempt.
pub(crate) fn record_selection(outcome: &'static str) {
    metrics::counter!("credit_pool_selections_total", "outcome" => outcome).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle, PrometheusRecorder};

    fn isolated_recorder() -> (PrometheusRecorder, PrometheusHandle) {
        let recorder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Full(REFRESH_DURATION_METRIC.to_string()),
                REFRESH_DURATION_BUCKETS,
            )
            .unwrap()
            .build_recorder();
        let handle = recorder.handle();
        (recorder, handle)
    }

    #[test]
    fn record_functions_do_not_panic_without_recorder() {
        record_refresh(0.4, 2, 1);
        record_probe_failure("timeout");
        record_selection(OUTCOME_OK);
    }

    #[test]
    fn refresh_records_counter_histogram_and_gauges() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_refresh(0.3, 3, 1);

        let output = handle.render();
        assert!(output.contains("credit_pool_refreshes_total 1"), "{output}");
        assert!(
            output.contains("credit_pool_refresh_duration_seconds_bucket"),
            "histogram must render _bucket lines: {output}"
        );
        assert!(output.contains("credit_pool_valid_credentials 3"), "{output}");
        assert!(output.contains("credit_pool_invalid_credentials 1"), "{output}");
    }

    #[test]
    fn probe_failures_are_labelled_by_reason() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_probe_failure("timeout");
        record_probe_failure("unauthorized");

        let output = handle.render();
        assert!(output.contains("reason=\"timeout\""), "{output}");
        assert!(output.contains("reason=\"unauthorized\""), "{output}");
    }

    #[test]
    fn selections_are_labelled_by_outcome() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_selection(OUTCOME_OK);
        record_selection(OUTCOME_LOW_BUDGET);
        record_selection(OUTCOME_EXHAUSTED);

        let output = handle.render();
        for outcome in [OUTCOME_OK, OUTCOME_LOW_BUDGET, OUTCOME_EXHAUSTED] {
            assert!(
                output.contains(&format!("outcome=\"{outcome}\"")),
                "missing {outcome}: {output}"
            );
        }
    }
}
