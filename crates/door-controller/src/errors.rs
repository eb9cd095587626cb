//! Door Controller error types.
//!
//! The taxonomy decides how a failure is handled:
//! - `Device`: fatal, process exits with failure status
//! - `Store`: counted in `dc_store_errors_total`, admission cycle aborted
//! - everything else during an admission cycle: swallowed at the cycle boundary

use crate::modem::ModemState;
use thiserror::Error;

/// Door Controller error type.
#[derive(Debug, Error)]
pub enum DcError {
    /// Serial device open/read/write failure.
    #[error("Device error: {0}")]
    Device(String),

    /// Authorization store query, mutation, or change feed failure.
    #[error("Store error: {0}")]
    Store(String),

    /// SMS delivery failure.
    #[error("Notification error: {0}")]
    Notification(String),

    /// A modem command was issued from a state that does not allow it.
    #[error("Modem cannot {operation} while {state}")]
    InvalidModemState {
        operation: &'static str,
        state: ModemState,
    },

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DcError {
    /// Returns true for failures talking to the authorization store.
    #[must_use]
    pub fn is_store_error(&self) -> bool {
        matches!(self, DcError::Store(_))
    }

    /// Returns true for failures that must take the process down.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, DcError::Device(_))
    }
}

impl From<sqlx::Error> for DcError {
    fn from(err: sqlx::Error) -> Self {
        DcError::Store(err.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_classification() {
        assert!(DcError::Store("connection reset".to_string()).is_store_error());
        assert!(!DcError::Notification("503".to_string()).is_store_error());
        assert!(!DcError::Device("eof".to_string()).is_store_error());
        assert!(!DcError::Internal("join".to_string()).is_store_error());
    }

    #[test]
    fn test_fatal_classification() {
        assert!(DcError::Device("unplugged".to_string()).is_fatal());
        assert!(!DcError::Store("timeout".to_string()).is_fatal());
        assert!(!DcError::Notification("rejected".to_string()).is_fatal());
    }

    #[test]
    fn test_sqlx_error_maps_to_store() {
        let err: DcError = sqlx::Error::RowNotFound.into();
        assert!(err.is_store_error());
    }

    #[test]
    fn test_display_formatting() {
        assert_eq!(
            DcError::Store("timeout".to_string()).to_string(),
            "Store error: timeout"
        );
        assert_eq!(
            DcError::InvalidModemState {
                operation: "hang up",
                state: ModemState::Idle,
            }
            .to_string(),
            "Modem cannot hang up while idle"
        );
    }
}
