//! Common utilities and types shared across Door Control components.

#![warn(clippy::pedantic)]

/// Module for shared data types (people, authorizations, location settings)
pub mod types;

/// Module for secret types that prevent accidental logging
pub mod secret;
