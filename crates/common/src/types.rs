//! Common data types for Door Control components.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for an authorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuthorizationId(pub Uuid);

impl AuthorizationId {
    /// Create a new random authorization ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AuthorizationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AuthorizationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Uuid> for AuthorizationId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// A person allowed to request access to a location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    /// Display name, used in admin summaries.
    pub name: String,
    /// Phone number in E.164-ish form. Never logged.
    pub phone: String,
    /// Leave this person out of admin summary messages.
    #[serde(default)]
    pub no_notify: bool,
}

impl Person {
    /// Create a person with notifications enabled.
    #[must_use]
    pub fn new(name: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phone: phone.into(),
            no_notify: false,
        }
    }
}

/// A one-time, time-limited grant to open the door at a location.
///
/// Authorizations are created out-of-band (SMS webhook) and expire six minutes
/// after `created_at`; the store enforces the expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    pub id: AuthorizationId,
    pub person: Person,
    pub created_at: DateTime<Utc>,
    pub location_id: String,
}

/// Per-location settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationSettings {
    pub location_id: String,
    /// People allowed to request access.
    #[serde(default)]
    pub allowed_people: Vec<Person>,
    /// Numbers that receive an admin summary whenever the door is opened.
    #[serde(default)]
    pub notify_numbers: Vec<String>,
}
