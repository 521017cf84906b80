//! Signal Hub - Real-time trading signal stream
//!
//! This crate bridges trading-signal and market-tick events from the event
//! bus to connected dashboards over WebSocket, through a single-owner
//! broadcast hub that evicts slow consumers instead of waiting on them.

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
