//! Applies change feed events to the cache and sends missed notifications.

use crate::cache::AuthorizationCache;
use crate::notify::Notifier;
use crate::observability::DoorMetrics;
use crate::store::ChangeEvent;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Change feed consumer.
///
/// The feed is not filtered by location: every insert and delete in the
/// store is applied, whichever location it belongs to.
#[derive(Debug, Clone)]
pub struct ChangeFeedHandler {
    cache: Arc<AuthorizationCache>,
    notifier: Notifier,
    metrics: Arc<DoorMetrics>,
}

impl ChangeFeedHandler {
    #[must_use]
    pub fn new(
        cache: Arc<AuthorizationCache>,
        notifier: Notifier,
        metrics: Arc<DoorMetrics>,
    ) -> Self {
        Self {
            cache,
            notifier,
            metrics,
        }
    }

    /// Apply one event.
    ///
    /// A delete for an authorization still in the cache means it expired
    /// unused: the person is told on a spawned task, whose handle is returned.
    pub fn handle(&self, event: ChangeEvent) -> Option<JoinHandle<()>> {
        match event {
            ChangeEvent::Insert(auth) => {
                info!(
                    target: "dc.change_feed",
                    authorization_id = %auth.id,
                    location_id = %auth.location_id,
                    person = %auth.person.name,
                    "Authorization received"
                );
                self.cache.on_insert(auth.id, auth.person);
                None
            }
            ChangeEvent::Delete(id) => {
                let Some(person) = self.cache.on_delete(&id) else {
                    debug!(target: "dc.change_feed", authorization_id = %id, "Consumed authorization cleared");
                    return None;
                };

                info!(
                    target: "dc.change_feed",
                    authorization_id = %id,
                    person = %person.name,
                    "Authorization expired unused"
                );
                self.metrics.increment_missed();

                let notifier = self.notifier.clone();
                Some(tokio::spawn(async move {
                    // Failures are already logged and counted by the notifier.
                    let _ = notifier.notify_missed(&person).await;
                }))
            }
        }
    }
}
