//! # Door Controller Test Utilities
//!
//! Mocks and fixtures for exercising the Door Controller without a modem,
//! a database, or an SMS provider.
//!
//! ## Modules
//!
//! - `mock_store` - in-memory authorization store with a change feed and
//!   simulated expiry
//! - `mock_dispatcher` - records SMS instead of sending them
//! - `mock_modem` - in-memory serial device that records commands and can
//!   ring and acknowledge
//! - `fixtures` - authorizations, people, and settings
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dc_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let store = MockStore::new().with_settings(fixtures::settings(&["+15550009999"]));
//!     store.insert(fixtures::authorization("Ada", "+15550000001"));
//!
//!     let dispatcher = MockDispatcher::new();
//!     let (modem, host) = MockModem::auto_ack();
//!
//!     // Wire a door_controller::AdmissionController to the mocks...
//! }
//! ```

pub mod fixtures;
pub mod mock_dispatcher;
pub mod mock_modem;
pub mod mock_store;

pub use mock_dispatcher::{MockDispatcher, SentMessage};
pub use mock_modem::MockModem;
pub use mock_store::MockStore;
