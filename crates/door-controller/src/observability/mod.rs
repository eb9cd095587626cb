//! Observability for the Door Controller.
//!
//! # Privacy
//!
//! Phone numbers never appear in logs or metric labels. Person names are
//! logged (they are what an operator needs to audit who was let in) but are
//! never used as labels.
//!
//! # Metrics
//!
//! | Metric | Type | Labels | Purpose |
//! |--------|------|--------|---------|
//! | `dc_authorizations_received_total` | Counter | none | Authorizations that entered the cache |
//! | `dc_authorizations_missed_total` | Counter | none | Authorizations that expired unused |
//! | `dc_door_activations_total` | Counter | none | Authorizations consumed by a dial |
//! | `dc_store_errors_total` | Counter | none | Store failures during admission |
//! | `dc_rings_total` | Counter | `outcome` | Rings by outcome |
//! | `dc_notifications_sent_total` | Counter | `kind`, `status` | SMS attempts |
//! | `dc_admission_cycle_duration_seconds` | Histogram | none | Ring to hangup |
//! | `dc_store_query_duration_seconds` | Histogram | `operation`, `status` | Store latency |
//! | `dc_authorizations_cached` | Gauge | none | Cache size |
//! | `dc_authorizations_expired_total` | Counter | none | Rows removed by the sweeper |

pub mod health;
pub mod metrics;

pub use health::{health_router, HealthState};
pub use metrics::{DoorMetrics, DoorMetricsSnapshot, RingOutcome};
