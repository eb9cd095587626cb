//! `AuthorizationCache` - local view of the pending authorizations.
//!
//! The store deletes an authorization both when it is consumed by a ring and
//! when its TTL runs out, and the change feed cannot tell the two apart. The
//! cache can: the admission cycle removes consumed ids here *before* deleting
//! them from the store, so any id still present when its delete event arrives
//! expired without being used.
//!
//! A ring can consume an authorization whose insert event is still queued on
//! the feed. Consumed ids are remembered (the most recent
//! [`CONSUMED_CAPACITY`] of them) so that a late insert does not bring them
//! back and turn the consumed delete into a missed notification.

use crate::observability::metrics::{set_authorizations_cached, DoorMetrics};
use common::types::{Authorization, AuthorizationId, Person};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// How many consumed ids are remembered for late inserts.
pub const CONSUMED_CAPACITY: usize = 256;

/// Authorization id to person, for every authorization not yet consumed.
#[derive(Debug)]
pub struct AuthorizationCache {
    inner: Mutex<CacheInner>,
    metrics: Arc<DoorMetrics>,
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<AuthorizationId, Person>,
    /// Recently consumed ids, oldest first.
    consumed: VecDeque<AuthorizationId>,
}

impl CacheInner {
    fn mark_consumed(&mut self, id: AuthorizationId) {
        if self.consumed.contains(&id) {
            return;
        }
        if self.consumed.len() == CONSUMED_CAPACITY {
            self.consumed.pop_front();
        }
        self.consumed.push_back(id);
    }

    fn forget_consumed(&mut self, id: &AuthorizationId) -> bool {
        match self.consumed.iter().position(|consumed| consumed == id) {
            Some(index) => self.consumed.remove(index).is_some(),
            None => false,
        }
    }
}

impl AuthorizationCache {
    #[must_use]
    pub fn new(metrics: Arc<DoorMetrics>) -> Self {
        Self {
            inner: Mutex::new(CacheInner::default()),
            metrics,
        }
    }

    /// Populate from a full fetch at startup. Counts each entry as received.
    pub fn seed(&self, authorizations: Vec<Authorization>) {
        let mut inner = self.lock();
        for authorization in authorizations {
            inner.entries.insert(authorization.id, authorization.person);
            self.metrics.increment_received();
        }
        debug!(target: "dc.change_feed", cached = inner.entries.len(), "Cache seeded");
        set_authorizations_cached(inner.entries.len());
    }

    /// A new authorization arrived on the change feed.
    ///
    /// Counts as received either way, but an id a ring already consumed is
    /// not cached again.
    pub fn on_insert(&self, id: AuthorizationId, person: Person) {
        let mut inner = self.lock();
        self.metrics.increment_received();
        if inner.consumed.contains(&id) {
            debug!(target: "dc.change_feed", authorization_id = %id, "Insert for consumed authorization arrived late");
            return;
        }
        inner.entries.insert(id, person);
        set_authorizations_cached(inner.entries.len());
    }

    /// A delete arrived on the change feed.
    ///
    /// Returns the person if the authorization was still cached, meaning it
    /// expired unused. `None` means it was already consumed.
    pub fn on_delete(&self, id: &AuthorizationId) -> Option<Person> {
        let mut inner = self.lock();
        inner.forget_consumed(id);
        let removed = inner.entries.remove(id);
        set_authorizations_cached(inner.entries.len());
        removed
    }

    /// Drop a consumed authorization. No metrics beyond the size gauge.
    pub fn remove(&self, id: &AuthorizationId) {
        let mut inner = self.lock();
        inner.entries.remove(id);
        inner.mark_consumed(*id);
        set_authorizations_cached(inner.entries.len());
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: &AuthorizationId) -> bool {
        self.lock().entries.contains_key(id)
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn authorization(name: &str) -> Authorization {
        Authorization {
            id: AuthorizationId::new(),
            person: Person::new(name, "+15550000000"),
            created_at: Utc::now(),
            location_id: "front".to_string(),
        }
    }

    #[test]
    fn test_seed_counts_received() {
        let metrics = DoorMetrics::new();
        let cache = AuthorizationCache::new(Arc::clone(&metrics));

        cache.seed(vec![authorization("Ada"), authorization("Grace")]);

        assert_eq!(cache.len(), 2);
        assert_eq!(metrics.snapshot().received, 2);
    }

    #[test]
    fn test_delete_of_cached_entry_returns_person() {
        let cache = AuthorizationCache::new(DoorMetrics::new());
        let auth = authorization("Ada");
        cache.on_insert(auth.id, auth.person.clone());

        let expired = cache.on_delete(&auth.id);

        assert_eq!(expired, Some(auth.person));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_delete_after_remove_returns_none() {
        let cache = AuthorizationCache::new(DoorMetrics::new());
        let auth = authorization("Ada");
        cache.on_insert(auth.id, auth.person.clone());

        cache.remove(&auth.id);
        assert!(!cache.contains(&auth.id));

        assert_eq!(cache.on_delete(&auth.id), None);
    }

    #[test]
    fn test_remove_does_not_touch_counters() {
        let metrics = DoorMetrics::new();
        let cache = AuthorizationCache::new(Arc::clone(&metrics));
        let auth = authorization("Ada");
        cache.on_insert(auth.id, auth.person);

        cache.remove(&auth.id);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.received, 1);
        assert_eq!(snapshot.missed, 0);
    }

    #[test]
    fn test_delete_of_unknown_id_is_none() {
        let cache = AuthorizationCache::new(DoorMetrics::new());
        assert_eq!(cache.on_delete(&AuthorizationId::new()), None);
    }

    #[test]
    fn test_late_insert_for_consumed_id_is_not_cached() {
        let metrics = DoorMetrics::new();
        let cache = AuthorizationCache::new(Arc::clone(&metrics));
        let auth = authorization("Ada");

        // Consumed by a ring before its insert event was applied.
        cache.remove(&auth.id);
        cache.on_insert(auth.id, auth.person.clone());

        assert!(!cache.contains(&auth.id));
        assert_eq!(cache.on_delete(&auth.id), None);
        assert_eq!(metrics.snapshot().received, 1);
    }

    #[test]
    fn test_consumed_id_is_forgotten_after_its_delete() {
        let cache = AuthorizationCache::new(DoorMetrics::new());
        let auth = authorization("Ada");

        cache.remove(&auth.id);
        assert_eq!(cache.on_delete(&auth.id), None);

        // Same id reused later is tracked normally.
        cache.on_insert(auth.id, auth.person.clone());
        assert!(cache.contains(&auth.id));
    }

    #[test]
    fn test_consumed_ids_are_bounded() {
        let cache = AuthorizationCache::new(DoorMetrics::new());
        let oldest = authorization("Ada");

        cache.remove(&oldest.id);
        for _ in 0..CONSUMED_CAPACITY {
            cache.remove(&AuthorizationId::new());
        }

        assert_eq!(cache.lock().consumed.len(), CONSUMED_CAPACITY);
        cache.on_insert(oldest.id, oldest.person.clone());
        assert!(cache.contains(&oldest.id), "oldest tombstone was evicted");
    }
}
