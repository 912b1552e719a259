//! Prometheus metrics exposition
//!
//! The pool crate emits its metrics through the `metrics` facade (see
//! `credit_pool::metrics`); this module installs the recorder that renders
//! them on `/metrics`.

use credit_pool::metrics::{REFRESH_DURATION_BUCKETS, REFRESH_DURATION_METRIC};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

/// Builder with explicit histogram buckets for the refresh duration, so it
/// renders as a Prometheus histogram (`_bucket` lines) instead of a summary.
fn builder() -> PrometheusBuilder {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(REFRESH_DURATION_METRIC.to_string()),
            REFRESH_DURATION_BUCKETS,
        )
        .expect("refresh duration buckets must be non-empty")
}

/// Install the Prometheus recorder and return a handle for rendering metrics.
pub fn install_recorder() -> anyhow::Result<PrometheusHandle> {
    Ok(builder().install_recorder()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusRecorder;

    /// Isolated recorder/handle pair; only one global recorder can exist per
    /// process, and install_recorder() fails on a second call.
    fn isolated_recorder() -> (PrometheusRecorder, PrometheusHandle) {
        let recorder = builder().build_recorder();
        let handle = recorder.handle();
        (recorder, handle)
    }

    #[test]
    fn refresh_duration_renders_as_histogram() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        metrics::histogram!(REFRESH_DURATION_METRIC).record(0.42);

        let output = handle.render();
        assert!(
            output.contains("credit_pool_refresh_duration_seconds_bucket"),
            "histogram must render _bucket lines: {output}"
        );
        assert!(output.contains("le=\"0.05\""), "lowest bucket must exist");
        assert!(output.contains("le=\"30\""), "highest bucket must exist");
        assert!(output.contains("le=\"+Inf\""));
    }
}
