//! Secret types for protecting sensitive values from accidental logging.
//!
//! Re-exports the [`secrecy`] types used for credentials such as the SMS
//! provider auth token and the database URL (which embeds a password).
//!
//! `SecretString` implements `Debug` with redaction, so a config struct that
//! derives or hand-writes `Debug` cannot leak these values through `{:?}` or
//! `tracing` fields. Secrets are zeroized on drop.
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct SmsCredentials {
//!     account_sid: String,
//!     auth_token: SecretString,
//! }
//!
//! let creds = SmsCredentials {
//!     account_sid: "AC123".to_string(),
//!     auth_token: SecretString::from("token-value"),
//! };
//!
//! assert!(!format!("{creds:?}").contains("token-value"));
//! assert_eq!(creds.auth_token.expose_secret(), "token-value");
//! ```

pub use secrecy::{ExposeSecret, SecretString};
