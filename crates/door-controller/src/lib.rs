//! Door Controller Library
//!
//! Answers a building's buzzer line through a dial-up modem. When the buzzer
//! rings and someone holds a pending authorization for this location, the
//! controller picks up, dials the door-release tone sequence, and hangs up.
//! Everyone let in gets an SMS, as do the location's admins. Authorizations
//! that expire unused trigger a "missed you" SMS.
//!
//! # Architecture
//!
//! ```text
//! serial device ──► modem::reader ──RING──► DoorService ──► AdmissionController
//!                        │ OK                   ▲    ▲            │
//!                        ▼                      │    │            ├─► ModemLine (ATDT / ATH)
//!                   AsyncSignal ◄───────────────┼────┼────────────┤
//!                                               │    │            ├─► AuthorizationStore
//! store change feed ────────────────────────────┘    │            └─► Notifier
//!         │                                          │
//!         └──► ChangeFeedHandler ──► AuthorizationCache, Notifier (missed)
//!                                                    │
//!                                   device faults ───┘
//! ```
//!
//! # Modules
//!
//! - [`admission`] - single-flight ring handling
//! - [`cache`] - local view of pending authorizations
//! - [`change_feed`] - applies store inserts/deletes, detects unused expiry
//! - [`config`] - service configuration from environment
//! - [`errors`] - error types
//! - [`modem`] - serial modem command and line handling
//! - [`notify`] - SMS messages and delivery
//! - [`observability`] - metrics and health endpoints
//! - [`service`] - dispatch loop
//! - [`signal`] - trigger/wait rendezvous used for modem acknowledgements
//! - [`store`] - authorization store seam and PostgreSQL implementation

pub mod admission;
pub mod cache;
pub mod change_feed;
pub mod config;
pub mod errors;
pub mod modem;
pub mod notify;
pub mod observability;
pub mod service;
pub mod signal;
pub mod store;
