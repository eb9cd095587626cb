//! In-memory authorization store.
//!
//! Behaves like the real store from the service's point of view: every insert
//! and delete is published to all `watch()` subscribers, and [`MockStore::expire`]
//! stands in for the TTL sweeper.

use common::types::{Authorization, AuthorizationId, LocationSettings};
use door_controller::errors::DcError;
use door_controller::store::{AuthorizationStore, ChangeEvent, CHANGE_FEED_CAPACITY};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Mock authorization store.
#[derive(Debug, Clone, Default)]
pub struct MockStore {
    inner: Arc<Mutex<MockStoreInner>>,
}

#[derive(Debug, Default)]
struct MockStoreInner {
    /// Pending authorizations in insertion order.
    authorizations: Vec<Authorization>,
    settings: HashMap<String, LocationSettings>,
    subscribers: Vec<mpsc::Sender<ChangeEvent>>,
    /// Ids removed through `delete_many`.
    deleted: Vec<AuthorizationId>,
    find_pending_calls: usize,
    failing: bool,
    delete_failing: bool,
}

impl MockStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add settings for their location.
    #[must_use]
    pub fn with_settings(self, settings: LocationSettings) -> Self {
        self.inner
            .lock()
            .unwrap()
            .settings
            .insert(settings.location_id.clone(), settings);
        self
    }

    /// Make every query fail with a store error.
    pub fn set_failing(&self, failing: bool) {
        self.inner.lock().unwrap().failing = failing;
    }

    /// Make only `delete_many` fail, so a cycle gets as far as the dial.
    pub fn set_delete_failing(&self, failing: bool) {
        self.inner.lock().unwrap().delete_failing = failing;
    }

    /// Add an authorization and publish the insert.
    pub fn insert(&self, authorization: Authorization) {
        let mut inner = self.inner.lock().unwrap();
        inner.authorizations.push(authorization.clone());
        inner.publish(&ChangeEvent::Insert(authorization));
    }

    /// Remove an authorization as the TTL would and publish the delete.
    /// Returns false if it was not pending.
    pub fn expire(&self, id: AuthorizationId) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.authorizations.len();
        inner.authorizations.retain(|auth| auth.id != id);
        if inner.authorizations.len() == before {
            return false;
        }
        inner.publish(&ChangeEvent::Delete(id));
        true
    }

    /// Drop every subscriber, as a failed listener would.
    pub fn close_feed(&self) {
        self.inner.lock().unwrap().subscribers.clear();
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.lock().unwrap().authorizations.len()
    }

    /// Ids removed through `delete_many`, in call order.
    #[must_use]
    pub fn deleted_ids(&self) -> Vec<AuthorizationId> {
        self.inner.lock().unwrap().deleted.clone()
    }

    #[must_use]
    pub fn find_pending_calls(&self) -> usize {
        self.inner.lock().unwrap().find_pending_calls
    }
}

impl MockStoreInner {
    fn publish(&mut self, event: &ChangeEvent) {
        self.subscribers
            .retain(|subscriber| subscriber.try_send(event.clone()).is_ok());
    }

    fn check_failing(&self) -> Result<(), DcError> {
        if self.failing {
            Err(DcError::Store("mock store unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl AuthorizationStore for MockStore {
    async fn find_pending(&self, location_id: &str) -> Result<Vec<Authorization>, DcError> {
        let mut inner = self.inner.lock().unwrap();
        inner.find_pending_calls += 1;
        inner.check_failing()?;
        Ok(inner
            .authorizations
            .iter()
            .filter(|auth| auth.location_id == location_id)
            .cloned()
            .collect())
    }

    async fn find_settings(
        &self,
        location_id: &str,
    ) -> Result<Option<LocationSettings>, DcError> {
        let inner = self.inner.lock().unwrap();
        inner.check_failing()?;
        Ok(inner.settings.get(location_id).cloned())
    }

    async fn delete_many(&self, ids: &[AuthorizationId]) -> Result<u64, DcError> {
        let mut inner = self.inner.lock().unwrap();
        inner.check_failing()?;
        if inner.delete_failing {
            return Err(DcError::Store("mock delete failed".to_string()));
        }

        let mut deleted = 0u64;
        for id in ids {
            let before = inner.authorizations.len();
            inner.authorizations.retain(|auth| auth.id != *id);
            if inner.authorizations.len() < before {
                deleted += 1;
                inner.deleted.push(*id);
                inner.publish(&ChangeEvent::Delete(*id));
            }
        }
        Ok(deleted)
    }

    async fn watch(&self) -> Result<mpsc::Receiver<ChangeEvent>, DcError> {
        let (tx, rx) = mpsc::channel(CHANGE_FEED_CAPACITY);
        self.inner.lock().unwrap().subscribers.push(tx);
        Ok(rx)
    }
}
