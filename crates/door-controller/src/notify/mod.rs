//! SMS notifications.
//!
//! Three kinds of message go out:
//! - `admitted`: to every person let in by a ring
//! - `admin_summary`: to each of the location's notify numbers, naming who
//!   was let in (people with `no_notify` are left out)
//! - `missed`: to a person whose authorization expired unused
//!
//! Delivery failures are logged and counted but never propagate past the
//! [`Notifier`] caller; a failed SMS must not affect the door.

pub mod twilio;

use crate::errors::DcError;
use crate::observability::metrics::record_notification;
use common::types::{Authorization, LocationSettings, Person};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

pub use twilio::TwilioDispatcher;

pub const ADMITTED_MESSAGE: &str = "Just let you in!";

pub const MISSED_MESSAGE: &str =
    "Hmm, I didn't see you arrive within 5 minutes! Text again if you need to get in";

const ADMIN_SUMMARY_PREFIX: &str = "I just let the following people in: ";

/// Trait for SMS delivery (enables mocking).
#[async_trait::async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn send(&self, to: &str, from: &str, body: &str) -> Result<(), DcError>;
}

/// Admin summary text for a set of admitted authorizations, or `None` when
/// every person asked not to be named.
#[must_use]
pub fn admin_summary(authorizations: &[Authorization]) -> Option<String> {
    let names: Vec<&str> = authorizations
        .iter()
        .filter(|auth| !auth.person.no_notify)
        .map(|auth| auth.person.name.as_str())
        .collect();

    if names.is_empty() {
        None
    } else {
        Some(format!("{ADMIN_SUMMARY_PREFIX}{}", names.join(",")))
    }
}

/// Composes messages and fans them out through a [`NotificationDispatcher`].
#[derive(Clone)]
pub struct Notifier {
    dispatcher: Arc<dyn NotificationDispatcher>,
    from: String,
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier").finish_non_exhaustive()
    }
}

impl Notifier {
    /// `from` is the sender number used for every message.
    pub fn new(dispatcher: Arc<dyn NotificationDispatcher>, from: impl Into<String>) -> Self {
        Self {
            dispatcher,
            from: from.into(),
        }
    }

    /// Tell everyone in `authorizations` they were let in, and send the admin
    /// summary to each notify number in `settings`.
    ///
    /// All messages are sent concurrently. Returns an error describing how
    /// many failed, after every send has finished.
    pub async fn notify_admitted(
        &self,
        authorizations: &[Authorization],
        settings: Option<&LocationSettings>,
    ) -> Result<(), DcError> {
        let mut sends = JoinSet::new();

        for auth in authorizations {
            sends.spawn(deliver(
                Arc::clone(&self.dispatcher),
                auth.person.phone.clone(),
                self.from.clone(),
                ADMITTED_MESSAGE.to_string(),
                "admitted",
            ));
        }

        if let Some(summary) = admin_summary(authorizations) {
            for number in settings.map(|s| s.notify_numbers.as_slice()).unwrap_or_default() {
                sends.spawn(deliver(
                    Arc::clone(&self.dispatcher),
                    number.clone(),
                    self.from.clone(),
                    summary.clone(),
                    "admin_summary",
                ));
            }
        } else {
            debug!(target: "dc.notify", "No nameable people admitted, skipping admin summary");
        }

        let total = sends.len();
        let mut failed = 0usize;
        while let Some(joined) = sends.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(_)) => failed += 1,
                Err(e) => {
                    warn!(target: "dc.notify", error = %e, "Notification task failed");
                    failed += 1;
                }
            }
        }

        if failed == 0 {
            Ok(())
        } else {
            Err(DcError::Notification(format!(
                "{failed} of {total} messages failed"
            )))
        }
    }

    /// Tell `person` their authorization expired unused.
    pub async fn notify_missed(&self, person: &Person) -> Result<(), DcError> {
        deliver(
            Arc::clone(&self.dispatcher),
            person.phone.clone(),
            self.from.clone(),
            MISSED_MESSAGE.to_string(),
            "missed",
        )
        .await
    }
}

async fn deliver(
    dispatcher: Arc<dyn NotificationDispatcher>,
    to: String,
    from: String,
    body: String,
    kind: &'static str,
) -> Result<(), DcError> {
    match dispatcher.send(&to, &from, &body).await {
        Ok(()) => {
            record_notification(kind, "success");
            debug!(target: "dc.notify", kind, "Notification sent");
            Ok(())
        }
        Err(e) => {
            record_notification(kind, "error");
            warn!(target: "dc.notify", kind, error = %e, "Notification failed");
            Err(e)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::types::AuthorizationId;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<(String, String, String)>>,
        fail_to: Option<String>,
    }

    #[async_trait::async_trait]
    impl NotificationDispatcher for Recorder {
        async fn send(&self, to: &str, from: &str, body: &str) -> Result<(), DcError> {
            if self.fail_to.as_deref() == Some(to) {
                return Err(DcError::Notification("rejected".to_string()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), from.to_string(), body.to_string()));
            Ok(())
        }
    }

    fn authorization(name: &str, phone: &str, no_notify: bool) -> Authorization {
        Authorization {
            id: AuthorizationId::new(),
            person: Person {
                name: name.to_string(),
                phone: phone.to_string(),
                no_notify,
            },
            created_at: Utc::now(),
            location_id: "front".to_string(),
        }
    }

    fn settings(numbers: &[&str]) -> LocationSettings {
        LocationSettings {
            location_id: "front".to_string(),
            allowed_people: vec![],
            notify_numbers: numbers.iter().map(ToString::to_string).collect(),
        }
    }

    #[test]
    fn test_admin_summary_skips_no_notify() {
        let auths = vec![
            authorization("Ada", "+1", false),
            authorization("Hidden", "+2", true),
            authorization("Grace", "+3", false),
        ];
        assert_eq!(
            admin_summary(&auths).as_deref(),
            Some("I just let the following people in: Ada,Grace")
        );
    }

    #[test]
    fn test_admin_summary_none_when_everyone_suppressed() {
        let auths = vec![authorization("A", "+1", true)];
        assert_eq!(admin_summary(&auths), None);
        assert_eq!(admin_summary(&[]), None);
    }

    #[tokio::test]
    async fn test_notify_admitted_sends_personal_and_admin_messages() {
        let recorder = Arc::new(Recorder::default());
        let notifier = Notifier::new(recorder.clone(), "+15559990000");
        let auths = vec![
            authorization("Ada", "+1", false),
            authorization("Grace", "+2", false),
        ];

        notifier
            .notify_admitted(&auths, Some(&settings(&["+100", "+200"])))
            .await
            .unwrap();

        let sent = recorder.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 4);
        assert!(sent.iter().all(|(_, from, _)| from == "+15559990000"));
        let personal: Vec<_> = sent.iter().filter(|(_, _, b)| b == ADMITTED_MESSAGE).collect();
        assert_eq!(personal.len(), 2);
        let admins: Vec<_> = sent
            .iter()
            .filter(|(_, _, b)| b.starts_with(ADMIN_SUMMARY_PREFIX))
            .map(|(to, _, _)| to.as_str())
            .collect();
        assert_eq!(admins.len(), 2);
        assert!(admins.contains(&"+100") && admins.contains(&"+200"));
    }

    #[tokio::test]
    async fn test_no_notify_only_still_gets_personal_message() {
        let recorder = Arc::new(Recorder::default());
        let notifier = Notifier::new(recorder.clone(), "+15559990000");
        let auths = vec![authorization("A", "+1", true)];

        notifier
            .notify_admitted(&auths, Some(&settings(&["+100"])))
            .await
            .unwrap();

        let sent = recorder.sent.lock().unwrap().clone();
        assert_eq!(
            sent,
            vec![(
                "+1".to_string(),
                "+15559990000".to_string(),
                ADMITTED_MESSAGE.to_string()
            )]
        );
    }

    #[tokio::test]
    async fn test_missing_settings_means_no_admin_messages() {
        let recorder = Arc::new(Recorder::default());
        let notifier = Notifier::new(recorder.clone(), "+15559990000");

        notifier
            .notify_admitted(&[authorization("Ada", "+1", false)], None)
            .await
            .unwrap();

        assert_eq!(recorder.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_one_failure_does_not_stop_the_rest() {
        let recorder = Arc::new(Recorder {
            fail_to: Some("+1".to_string()),
            ..Recorder::default()
        });
        let notifier = Notifier::new(recorder.clone(), "+15559990000");
        let auths = vec![
            authorization("Ada", "+1", false),
            authorization("Grace", "+2", false),
        ];

        let err = notifier
            .notify_admitted(&auths, Some(&settings(&["+100"])))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("1 of 3"));
        assert_eq!(recorder.sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_notify_missed() {
        let recorder = Arc::new(Recorder::default());
        let notifier = Notifier::new(recorder.clone(), "+15559990000");

        notifier
            .notify_missed(&Person::new("Ada", "+1"))
            .await
            .unwrap();

        let sent = recorder.sent.lock().unwrap().clone();
        assert_eq!(
            sent,
            vec![(
                "+1".to_string(),
                "+15559990000".to_string(),
                MISSED_MESSAGE.to_string()
            )]
        );
    }
}
