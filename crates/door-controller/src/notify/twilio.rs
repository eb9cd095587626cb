//! Twilio SMS dispatcher.

use super::NotificationDispatcher;
use crate::errors::DcError;
use common::secret::{ExposeSecret, SecretString};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Request timeout for the Messages API.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Sends SMS through the Twilio Messages API.
pub struct TwilioDispatcher {
    http_client: reqwest::Client,
    messages_url: String,
    account_sid: String,
    auth_token: SecretString,
}

impl std::fmt::Debug for TwilioDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwilioDispatcher")
            .field("messages_url", &self.messages_url)
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl TwilioDispatcher {
    /// `api_url` is the API base without a trailing slash, normally
    /// `https://api.twilio.com`.
    pub fn new(
        api_url: &str,
        account_sid: impl Into<String>,
        auth_token: SecretString,
    ) -> Result<Self, DcError> {
        let account_sid = account_sid.into();
        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .map_err(|e| DcError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            messages_url: format!("{api_url}/2010-04-01/Accounts/{account_sid}/Messages.json"),
            account_sid,
            auth_token,
        })
    }
}

#[async_trait::async_trait]
impl NotificationDispatcher for TwilioDispatcher {
    async fn send(&self, to: &str, from: &str, body: &str) -> Result<(), DcError> {
        let form_body = [("To", to), ("From", from), ("Body", body)];

        let response = self
            .http_client
            .post(&self.messages_url)
            .basic_auth(&self.account_sid, Some(self.auth_token.expose_secret()))
            .form(&form_body)
            .send()
            .await
            .map_err(|e| {
                debug!(target: "dc.notify", error = %e, "SMS request failed");
                DcError::Notification(format!("SMS request failed: {e}"))
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<failed to read body>".to_string());
        warn!(target: "dc.notify", status = %status, "SMS provider rejected message");
        trace!(target: "dc.notify", body = %body, "SMS rejection response body");

        Err(DcError::Notification(format!(
            "SMS provider returned {status}"
        )))
    }
}
