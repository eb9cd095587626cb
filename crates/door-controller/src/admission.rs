//! `AdmissionController` - what happens when the buzzer rings.
//!
//! One cycle per ring, at most one cycle at a time:
//!
//! ```text
//! ring ──► busy? ──yes──► dropped
//!            │no
//!            ▼
//!      find_pending ──empty──► denied
//!            │
//!      find_settings
//!            │
//!      cache.remove(ids)
//!            ├──────────────► spawn delete_many(ids)
//!            ├──────────────► spawn notify_admitted
//!            ▼
//!      register for OK, ATDT<seq>;
//!            │
//!      wait for OK (unbounded)
//!            │
//!           ATH
//!            │
//!      join spawned tasks ──► admitted
//! ```
//!
//! Consumed ids leave the cache before the store delete is issued, so the
//! delete events they produce on the change feed are recognized as consumed
//! rather than expired.

use crate::cache::AuthorizationCache;
use crate::errors::DcError;
use crate::modem::{DialSequence, ModemLine};
use crate::notify::Notifier;
use crate::observability::metrics::{record_admission_cycle_duration, record_ring, RingOutcome};
use crate::observability::DoorMetrics;
use crate::store::AuthorizationStore;
use common::types::AuthorizationId;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// What the controller needs to know about the door it serves.
#[derive(Debug, Clone)]
pub struct AdmissionConfig {
    pub location_id: String,
    pub dial_sequence: DialSequence,
}

/// Single-flight ring handler.
pub struct AdmissionController {
    config: AdmissionConfig,
    store: Arc<dyn AuthorizationStore>,
    notifier: Notifier,
    cache: Arc<AuthorizationCache>,
    modem: Mutex<ModemLine>,
    busy: AtomicBool,
    faults: mpsc::Sender<DcError>,
    metrics: Arc<DoorMetrics>,
}

impl std::fmt::Debug for AdmissionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionController")
            .field("config", &self.config)
            .field("busy", &self.is_busy())
            .finish_non_exhaustive()
    }
}

/// Clears the busy flag when the cycle ends, however it ends.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl AdmissionController {
    /// Create a controller. `modem` must already be initialized. Device
    /// failures during a cycle are reported on `faults`.
    #[must_use]
    pub fn new(
        config: AdmissionConfig,
        store: Arc<dyn AuthorizationStore>,
        notifier: Notifier,
        cache: Arc<AuthorizationCache>,
        modem: ModemLine,
        metrics: Arc<DoorMetrics>,
        faults: mpsc::Sender<DcError>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            store,
            notifier,
            cache,
            modem: Mutex::new(modem),
            busy: AtomicBool::new(false),
            faults,
            metrics,
        })
    }

    /// True while an admission cycle is running.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Handle a ring.
    ///
    /// Starts an admission cycle on its own task and returns its handle, or
    /// returns `None` if a cycle is already running (the ring is dropped, not
    /// queued).
    pub fn on_ring(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(target: "dc.admission", "Ring ignored, admission already in progress");
            record_ring(RingOutcome::Dropped);
            return None;
        }

        let this = Arc::clone(self);
        Some(tokio::spawn(async move {
            let _busy = BusyGuard(&this.busy);
            let start = Instant::now();

            let outcome = match this.run_cycle().await {
                Ok(outcome) => Some(outcome),
                Err(e) => this.handle_cycle_error(e).await,
            };

            if let Some(outcome) = outcome {
                record_ring(outcome);
                record_admission_cycle_duration(start.elapsed());
            }
        }))
    }

    async fn run_cycle(&self) -> Result<RingOutcome, DcError> {
        let location_id = self.config.location_id.as_str();

        let pending = self.store.find_pending(location_id).await?;
        if pending.is_empty() {
            info!(target: "dc.admission", location_id, "Ring with no pending authorization, not answering");
            return Ok(RingOutcome::Denied);
        }

        let settings = self.store.find_settings(location_id).await?;
        if settings.is_none() {
            warn!(target: "dc.admission", location_id, "No settings for location, admins will not be notified");
        }

        let ids: Vec<AuthorizationId> = pending.iter().map(|auth| auth.id).collect();
        for id in &ids {
            self.cache.remove(id);
        }

        let names: Vec<&str> = pending.iter().map(|auth| auth.person.name.as_str()).collect();
        info!(
            target: "dc.admission",
            location_id,
            count = ids.len(),
            people = %names.join(","),
            "Letting people in"
        );

        let delete_task = {
            let store = Arc::clone(&self.store);
            let ids = ids.clone();
            tokio::spawn(async move { store.delete_many(&ids).await })
        };
        let notify_task = {
            let notifier = self.notifier.clone();
            let pending = pending.clone();
            tokio::spawn(async move { notifier.notify_admitted(&pending, settings.as_ref()).await })
        };

        let door = self.open_door(ids.len()).await;

        let deleted = flatten(delete_task.await, "delete");
        let notified = flatten(notify_task.await, "notify");

        door?;
        let deleted = deleted?;
        if deleted != ids.len() as u64 {
            debug!(target: "dc.admission", requested = ids.len(), deleted, "Some authorizations were already gone");
        }
        if let Err(e) = notified {
            debug!(target: "dc.admission", error = %e, "Notification errors suppressed");
        }

        Ok(RingOutcome::Admitted)
    }

    /// Dial the trigger sequence, wait for the modem to acknowledge, hang up.
    async fn open_door(&self, consumed: usize) -> Result<(), DcError> {
        let mut modem = self.modem.lock().await;

        let acknowledged = modem.acknowledged().wait();
        modem.trigger_dial(&self.config.dial_sequence).await?;
        self.metrics.increment_activated(consumed as u64);

        acknowledged.await;
        modem.hangup().await?;

        debug!(target: "dc.admission", "Door triggered");
        Ok(())
    }

    /// Classify a failed cycle. Store and device failures are counted as an
    /// `error` ring; anything else is swallowed without a metric.
    async fn handle_cycle_error(&self, e: DcError) -> Option<RingOutcome> {
        if e.is_store_error() {
            self.metrics.increment_store_error();
            warn!(target: "dc.admission", error = %e, "Admission aborted by store failure");
        } else if e.is_fatal() {
            error!(target: "dc.admission", error = %e, "Modem failure during admission");
            if self.faults.send(e).await.is_err() {
                debug!(target: "dc.admission", "Fault receiver gone");
            }
        } else {
            debug!(target: "dc.admission", error = %e, "Admission cycle failed");
            return None;
        }
        Some(RingOutcome::Error)
    }
}

fn flatten<T>(
    joined: Result<Result<T, DcError>, tokio::task::JoinError>,
    task: &str,
) -> Result<T, DcError> {
    joined.unwrap_or_else(|e| Err(DcError::Internal(format!("{task} task failed: {e}"))))
}
