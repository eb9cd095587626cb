//! Pre-configured test data.

use chrono::Utc;
use common::types::{Authorization, AuthorizationId, LocationSettings, Person};

/// Location every fixture belongs to unless stated otherwise.
pub const TEST_LOCATION: &str = "front-door";

/// Sender number used by test notifiers.
pub const TEST_FROM: &str = "+15550000000";

/// Dial sequence used by test controllers.
pub const TEST_DIAL_SEQUENCE: &str = "9,";

/// A person with notifications enabled.
#[must_use]
pub fn person(name: &str, phone: &str) -> Person {
    Person::new(name, phone)
}

/// A fresh authorization at [`TEST_LOCATION`].
#[must_use]
pub fn authorization(name: &str, phone: &str) -> Authorization {
    authorization_at(TEST_LOCATION, name, phone)
}

/// A fresh authorization for someone who asked not to be named to admins.
#[must_use]
pub fn silent_authorization(name: &str, phone: &str) -> Authorization {
    let mut auth = authorization(name, phone);
    auth.person.no_notify = true;
    auth
}

/// A fresh authorization at `location_id`.
#[must_use]
pub fn authorization_at(location_id: &str, name: &str, phone: &str) -> Authorization {
    Authorization {
        id: AuthorizationId::new(),
        person: person(name, phone),
        created_at: Utc::now(),
        location_id: location_id.to_string(),
    }
}

/// Settings for [`TEST_LOCATION`] with the given admin numbers.
#[must_use]
pub fn settings(notify_numbers: &[&str]) -> LocationSettings {
    LocationSettings {
        location_id: TEST_LOCATION.to_string(),
        allowed_people: Vec::new(),
        notify_numbers: notify_numbers.iter().map(ToString::to_string).collect(),
    }
}
