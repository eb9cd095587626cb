//! `DoorService` - the dispatch loop.
//!
//! Every input the service reacts to arrives on a channel and is handled
//! here, one event at a time per source:
//!
//! | Source | Event | Action |
//! |--------|-------|--------|
//! | modem reader | `Ring` | start an admission cycle (or drop if busy) |
//! | modem reader | `Closed` | stop, success |
//! | modem reader | `Failed` | stop, failure |
//! | change feed | insert/delete | update cache, maybe send missed SMS |
//! | change feed | closed | stop, failure |
//! | admission | device fault | stop, failure |
//! | shutdown signal | cancel | stop, success |

use crate::admission::AdmissionController;
use crate::change_feed::ChangeFeedHandler;
use crate::errors::DcError;
use crate::modem::ModemEvent;
use crate::observability::HealthState;
use crate::store::ChangeEvent;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Receiving ends of everything the dispatch loop listens to.
#[derive(Debug)]
pub struct ServiceChannels {
    pub modem_events: mpsc::Receiver<ModemEvent>,
    pub change_feed: mpsc::Receiver<ChangeEvent>,
    pub faults: mpsc::Receiver<DcError>,
}

#[derive(Debug)]
pub struct DoorService {
    controller: Arc<AdmissionController>,
    change_feed: ChangeFeedHandler,
    channels: ServiceChannels,
    health: Arc<HealthState>,
    cancel_token: CancellationToken,
}

impl DoorService {
    #[must_use]
    pub fn new(
        controller: Arc<AdmissionController>,
        change_feed: ChangeFeedHandler,
        channels: ServiceChannels,
        health: Arc<HealthState>,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            controller,
            change_feed,
            channels,
            health,
            cancel_token,
        }
    }

    /// Run until the device closes, a fatal error occurs, or shutdown is
    /// requested.
    ///
    /// Returns `Ok` for a graceful stop (device closed, shutdown signal) and
    /// the fatal error otherwise.
    pub async fn run(mut self) -> Result<(), DcError> {
        self.health.set_ready();
        info!(target: "dc.service", "Door service running");

        let result = self.dispatch().await;

        self.health.set_not_ready();
        match &result {
            Ok(()) => info!(target: "dc.service", "Door service stopped"),
            Err(e) => error!(target: "dc.service", error = %e, "Door service stopped on fatal error"),
        }
        result
    }

    async fn dispatch(&mut self) -> Result<(), DcError> {
        loop {
            tokio::select! {
                biased;

                () = self.cancel_token.cancelled() => {
                    info!(target: "dc.service", "Shutdown requested");
                    return Ok(());
                }

                Some(fault) = self.channels.faults.recv() => {
                    return Err(fault);
                }

                event = self.channels.modem_events.recv() => match event {
                    Some(ModemEvent::Ring) => {
                        info!(target: "dc.service", "Ring");
                        // The cycle runs on its own task so the reader can
                        // keep delivering the modem's acknowledgement.
                        let _ = self.controller.on_ring();
                    }
                    Some(ModemEvent::Failed(e)) => return Err(e),
                    Some(ModemEvent::Closed) | None => {
                        warn!(target: "dc.service", "Modem device closed");
                        return Ok(());
                    }
                },

                event = self.channels.change_feed.recv() => match event {
                    Some(event) => {
                        let _ = self.change_feed.handle(event);
                    }
                    None => {
                        return Err(DcError::Store("change feed closed".to_string()));
                    }
                },
            }
        }
    }
}
