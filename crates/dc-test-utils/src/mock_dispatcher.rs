//! Recording SMS dispatcher.

use door_controller::errors::DcError;
use door_controller::notify::NotificationDispatcher;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A message the mock was asked to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub to: String,
    pub from: String,
    pub body: String,
}

/// Mock dispatcher that records messages instead of sending them.
#[derive(Debug, Clone, Default)]
pub struct MockDispatcher {
    inner: Arc<Mutex<MockDispatcherInner>>,
}

#[derive(Debug, Default)]
struct MockDispatcherInner {
    sent: Vec<SentMessage>,
    attempts: usize,
    failing: bool,
}

impl MockDispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A dispatcher whose every send fails.
    #[must_use]
    pub fn failing() -> Self {
        let dispatcher = Self::new();
        dispatcher.inner.lock().unwrap().failing = true;
        dispatcher
    }

    /// Successfully sent messages, in completion order.
    #[must_use]
    pub fn messages(&self) -> Vec<SentMessage> {
        self.inner.lock().unwrap().sent.clone()
    }

    /// Messages sent to `to`.
    #[must_use]
    pub fn messages_to(&self, to: &str) -> Vec<SentMessage> {
        self.messages()
            .into_iter()
            .filter(|message| message.to == to)
            .collect()
    }

    /// Sends attempted, including failed ones.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.inner.lock().unwrap().attempts
    }

    /// Wait until at least `count` messages were sent. Panics after `timeout`.
    pub async fn wait_for_messages(&self, count: usize, timeout: Duration) -> Vec<SentMessage> {
        tokio::time::timeout(timeout, async {
            loop {
                let messages = self.messages();
                if messages.len() >= count {
                    return messages;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| {
            panic!(
                "expected {count} messages, got {:?}",
                self.messages()
            )
        })
    }
}

#[async_trait::async_trait]
impl NotificationDispatcher for MockDispatcher {
    async fn send(&self, to: &str, from: &str, body: &str) -> Result<(), DcError> {
        let mut inner = self.inner.lock().unwrap();
        inner.attempts += 1;
        if inner.failing {
            return Err(DcError::Notification("mock dispatcher failure".to_string()));
        }
        inner.sent.push(SentMessage {
            to: to.to_string(),
            from: from.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}
