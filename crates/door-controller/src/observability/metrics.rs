//! Metrics definitions for the Door Controller.
//!
//! All metrics follow Prometheus naming conventions:
//! - `dc_` prefix for Door Controller
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `outcome`: 4 values (admitted, denied, dropped, error)
//! - `kind`: 3 values (admitted, admin_summary, missed)
//! - `status`: 2 values (success, error)
//! - `operation`: 4 values (find_pending, find_settings, delete_many, expire)

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Initialize the Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        // Store round trips
        .set_buckets_for_metric(
            Matcher::Prefix("dc_store".to_string()),
            &[
                0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000,
            ],
        )
        .map_err(|e| format!("Failed to set store query buckets: {e}"))?
        // A cycle spans the modem dial and acknowledgement, so seconds not millis
        .set_buckets_for_metric(
            Matcher::Full("dc_admission_cycle_duration_seconds".to_string()),
            &[0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000, 30.000],
        )
        .map_err(|e| format!("Failed to set admission cycle buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

// ============================================================================
// Authorization Lifecycle (Counters)
// ============================================================================

/// Metric: `dc_authorizations_received_total`
///
/// One per authorization that entered the cache, whether seeded at startup
/// or delivered by the change feed.
pub fn record_authorization_received() {
    counter!("dc_authorizations_received_total").increment(1);
}

/// Metric: `dc_authorizations_missed_total`
///
/// Authorizations that expired without being used.
pub fn record_authorization_missed() {
    counter!("dc_authorizations_missed_total").increment(1);
}

/// Metric: `dc_door_activations_total`
///
/// Incremented by the number of authorizations consumed per dial, not once
/// per dial.
pub fn record_door_activations(count: u64) {
    counter!("dc_door_activations_total").increment(count);
}

/// Metric: `dc_authorizations_expired_total`
///
/// Rows removed by the expiry sweeper.
pub fn record_authorizations_expired(count: u64) {
    counter!("dc_authorizations_expired_total").increment(count);
}

/// Metric: `dc_authorizations_cached`
pub fn set_authorizations_cached(count: usize) {
    // usize to f64 conversion is safe for realistic cache sizes
    #[allow(clippy::cast_precision_loss)]
    gauge!("dc_authorizations_cached").set(count as f64);
}

// ============================================================================
// Admission
// ============================================================================

/// Outcome of a single ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingOutcome {
    /// Door was triggered.
    Admitted,
    /// No pending authorization.
    Denied,
    /// Arrived while a cycle was already running.
    Dropped,
    /// Cycle aborted by a store or device failure.
    Error,
}

impl RingOutcome {
    /// Label value for `dc_rings_total`.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            RingOutcome::Admitted => "admitted",
            RingOutcome::Denied => "denied",
            RingOutcome::Dropped => "dropped",
            RingOutcome::Error => "error",
        }
    }
}

/// Metric: `dc_rings_total`
/// Labels: `outcome`
pub fn record_ring(outcome: RingOutcome) {
    counter!("dc_rings_total", "outcome" => outcome.as_str()).increment(1);
}

/// Metric: `dc_admission_cycle_duration_seconds`
///
/// Time from ring to hangup, including the wait for the modem's `OK`.
pub fn record_admission_cycle_duration(duration: Duration) {
    histogram!("dc_admission_cycle_duration_seconds").record(duration.as_secs_f64());
}

// ============================================================================
// Store
// ============================================================================

/// Metric: `dc_store_errors_total`
pub fn record_store_error() {
    counter!("dc_store_errors_total").increment(1);
}

/// Metric: `dc_store_query_duration_seconds`
/// Labels: `operation`, `status`
pub fn record_store_query(operation: &'static str, status: &'static str, duration: Duration) {
    histogram!(
        "dc_store_query_duration_seconds",
        "operation" => operation,
        "status" => status
    )
    .record(duration.as_secs_f64());
}

// ============================================================================
// Notifications
// ============================================================================

/// Metric: `dc_notifications_sent_total`
/// Labels: `kind` (admitted, admin_summary, missed), `status` (success, error)
pub fn record_notification(kind: &'static str, status: &'static str) {
    counter!("dc_notifications_sent_total", "kind" => kind, "status" => status).increment(1);
}

// ============================================================================
// DoorMetrics
// ============================================================================

/// Exact-value mirror of the four core counters.
///
/// The Prometheus recorder is write-only, so the service keeps these atomics
/// alongside it. Every `increment_*` also emits the matching metric.
#[derive(Debug, Default)]
pub struct DoorMetrics {
    received: AtomicU64,
    missed: AtomicU64,
    activated: AtomicU64,
    store_errors: AtomicU64,
}

/// Snapshot of [`DoorMetrics`] at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DoorMetricsSnapshot {
    pub received: u64,
    pub missed: u64,
    pub activated: u64,
    pub store_errors: u64,
}

impl DoorMetrics {
    /// Create a new shared metrics instance.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn increment_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
        record_authorization_received();
    }

    pub fn increment_missed(&self) {
        self.missed.fetch_add(1, Ordering::Relaxed);
        record_authorization_missed();
    }

    pub fn increment_activated(&self, count: u64) {
        self.activated.fetch_add(count, Ordering::Relaxed);
        record_door_activations(count);
    }

    pub fn increment_store_error(&self) {
        self.store_errors.fetch_add(1, Ordering::Relaxed);
        record_store_error();
    }

    #[must_use]
    pub fn snapshot(&self) -> DoorMetricsSnapshot {
        DoorMetricsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            missed: self.missed.load(Ordering::Relaxed),
            activated: self.activated.load(Ordering::Relaxed),
            store_errors: self.store_errors.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};

    fn counter_value(
        snapshot: &[(
            metrics_util::CompositeKey,
            Option<metrics::Unit>,
            Option<metrics::SharedString>,
            DebugValue,
        )],
        name: &str,
    ) -> u64 {
        snapshot
            .iter()
            .filter(|(key, _, _, _)| key.key().name() == name)
            .map(|(_, _, _, value)| match value {
                DebugValue::Counter(v) => *v,
                _ => 0,
            })
            .sum()
    }

    #[test]
    fn test_recording_without_recorder_does_not_panic() {
        record_authorization_received();
        record_authorization_missed();
        record_door_activations(3);
        record_authorizations_expired(2);
        set_authorizations_cached(7);
        record_store_error();
        record_store_query("find_pending", "success", Duration::from_millis(3));
        record_notification("admitted", "success");
        record_admission_cycle_duration(Duration::from_millis(800));
        for outcome in [
            RingOutcome::Admitted,
            RingOutcome::Denied,
            RingOutcome::Dropped,
            RingOutcome::Error,
        ] {
            record_ring(outcome);
        }
    }

    #[test]
    fn test_ring_outcome_labels() {
        assert_eq!(RingOutcome::Admitted.as_str(), "admitted");
        assert_eq!(RingOutcome::Denied.as_str(), "denied");
        assert_eq!(RingOutcome::Dropped.as_str(), "dropped");
        assert_eq!(RingOutcome::Error.as_str(), "error");
    }

    #[test]
    fn test_door_metrics_snapshot() {
        let metrics = DoorMetrics::new();
        metrics.increment_received();
        metrics.increment_received();
        metrics.increment_missed();
        metrics.increment_activated(2);
        metrics.increment_store_error();

        assert_eq!(
            metrics.snapshot(),
            DoorMetricsSnapshot {
                received: 2,
                missed: 1,
                activated: 2,
                store_errors: 1,
            }
        );
    }

    #[test]
    fn test_door_metrics_emit_counters() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            let door = DoorMetrics::new();
            door.increment_received();
            door.increment_activated(3);
            door.increment_store_error();
        });

        let snapshot = snapshotter.snapshot().into_vec();
        assert_eq!(
            counter_value(&snapshot, "dc_authorizations_received_total"),
            1
        );
        assert_eq!(counter_value(&snapshot, "dc_door_activations_total"), 3);
        assert_eq!(counter_value(&snapshot, "dc_store_errors_total"), 1);
    }
}
