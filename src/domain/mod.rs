//! Domain layer containing the event vocabulary of the hub.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (IDs, timestamps, lifecycle enums, errors)
//! - `market` - Signal and tick events decoded from the event bus

pub mod foundation;
pub mod market;
