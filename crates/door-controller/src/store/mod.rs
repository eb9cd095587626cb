//! Authorization store.
//!
//! The store holds pending authorizations and per-location settings, expires
//! authorizations on its own, and publishes every insert and delete on a
//! change feed. [`AuthorizationStore`] is the seam the service talks to;
//! [`postgres::PgAuthorizationStore`] is the production implementation.

pub mod expiry;
pub mod postgres;

use crate::errors::DcError;
use common::types::{Authorization, AuthorizationId, LocationSettings};
use tokio::sync::mpsc;

pub use expiry::spawn_expiry_sweeper;
pub use postgres::PgAuthorizationStore;

/// Capacity of the change feed channel.
pub const CHANGE_FEED_CAPACITY: usize = 256;

/// One entry on the change feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    Insert(Authorization),
    /// Carries only the id: the row is already gone.
    Delete(AuthorizationId),
}

/// Trait for authorization store operations (enables mocking).
#[async_trait::async_trait]
pub trait AuthorizationStore: Send + Sync {
    /// All authorizations currently pending for `location_id`.
    async fn find_pending(&self, location_id: &str) -> Result<Vec<Authorization>, DcError>;

    /// Settings for `location_id`, if any have been configured.
    async fn find_settings(&self, location_id: &str)
        -> Result<Option<LocationSettings>, DcError>;

    /// Delete the given authorizations. Returns the number of rows removed.
    async fn delete_many(&self, ids: &[AuthorizationId]) -> Result<u64, DcError>;

    /// Subscribe to the change feed.
    ///
    /// The receiver closes when the subscription fails; callers treat that as
    /// fatal.
    async fn watch(&self) -> Result<mpsc::Receiver<ChangeEvent>, DcError>;
}
