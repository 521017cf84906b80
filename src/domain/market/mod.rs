//! Market module - trading signal and tick events relayed to dashboards.

mod events;

pub use events::{DecodeError, MarketEvent, SignalEvent, Subject, TickEvent};
