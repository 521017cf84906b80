//! Market events carried on the event bus.
//!
//! Each bus subject carries a flat JSON record. Decoding is lenient about
//! missing numeric and text fields (they take their zero value, matching
//! what upstream publishers omit) but a record without a symbol is rejected.
//!
//! The serialized form of [`MarketEvent`] is the broadcast envelope:
//!
//! ```json
//! {"type": "market_tick", "data": {"symbol": "TCS", "price": 3500.0, ...}}
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::domain::foundation::ValidationError;

/// Bus subjects consumed by the bridge, one per event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subject {
    SignalNew,
    SignalUpdated,
    SignalClosed,
    MarketTick,
}

impl Subject {
    /// Every subject the bridge subscribes to.
    pub const ALL: [Subject; 4] = [
        Subject::SignalNew,
        Subject::SignalUpdated,
        Subject::SignalClosed,
        Subject::MarketTick,
    ];

    /// Wire name of the subject on the bus.
    pub fn as_str(&self) -> &'static str {
        match self {
            Subject::SignalNew => "signal.new",
            Subject::SignalUpdated => "signal.updated",
            Subject::SignalClosed => "signal.closed",
            Subject::MarketTick => "market.tick",
        }
    }

    /// Resolves a bus subject name.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == name)
    }

    /// Wire names of every subject.
    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(Subject::as_str).collect()
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A trading signal lifecycle record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalEvent {
    pub event_type: String,
    pub signal_id: i64,
    pub symbol: String,
    pub signal_type: String,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub target_price: f64,
    pub confidence: f64,
    pub status: String,
    pub current_price: f64,
    pub exit_price: f64,
    pub pnl: f64,
    pub generated_at: String,
    pub timestamp: String,
}

/// A single market price tick.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TickEvent {
    pub event_type: String,
    pub symbol: String,
    pub price: f64,
    pub volume: u32,
    pub change_pct: f64,
    pub timestamp: String,
}

/// Typed event decoded from one bus message.
///
/// Serializes as the `{type, data}` envelope sent to every client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum MarketEvent {
    SignalNew(SignalEvent),
    SignalUpdated(SignalEvent),
    SignalClosed(SignalEvent),
    MarketTick(TickEvent),
}

/// Reasons a bus message could not become a [`MarketEvent`].
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Unknown subject: {0}")]
    UnknownSubject(String),

    #[error("Malformed {subject} payload: {source}")]
    Malformed {
        subject: Subject,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid {subject} payload: {source}")]
    Invalid {
        subject: Subject,
        #[source]
        source: ValidationError,
    },
}

impl MarketEvent {
    /// Decodes a raw bus message received on `subject`.
    pub fn decode(subject: &str, payload: &[u8]) -> Result<Self, DecodeError> {
        let subject =
            Subject::parse(subject).ok_or_else(|| DecodeError::UnknownSubject(subject.to_string()))?;
        let malformed = |source| DecodeError::Malformed { subject, source };

        let event = match subject {
            Subject::SignalNew => Self::SignalNew(serde_json::from_slice(payload).map_err(malformed)?),
            Subject::SignalUpdated => {
                Self::SignalUpdated(serde_json::from_slice(payload).map_err(malformed)?)
            }
            Subject::SignalClosed => {
                Self::SignalClosed(serde_json::from_slice(payload).map_err(malformed)?)
            }
            Subject::MarketTick => Self::MarketTick(serde_json::from_slice(payload).map_err(malformed)?),
        };

        if event.symbol().trim().is_empty() {
            return Err(DecodeError::Invalid {
                subject,
                source: ValidationError::empty_field("symbol"),
            });
        }
        Ok(event)
    }

    /// Subject this event kind travels on.
    pub fn subject(&self) -> Subject {
        match self {
            MarketEvent::SignalNew(_) => Subject::SignalNew,
            MarketEvent::SignalUpdated(_) => Subject::SignalUpdated,
            MarketEvent::SignalClosed(_) => Subject::SignalClosed,
            MarketEvent::MarketTick(_) => Subject::MarketTick,
        }
    }

    /// Envelope `type` tag for this event.
    pub fn envelope_type(&self) -> &'static str {
        match self {
            MarketEvent::SignalNew(_) => "signal_new",
            MarketEvent::SignalUpdated(_) => "signal_updated",
            MarketEvent::SignalClosed(_) => "signal_closed",
            MarketEvent::MarketTick(_) => "market_tick",
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            MarketEvent::SignalNew(e) | MarketEvent::SignalUpdated(e) | MarketEvent::SignalClosed(e) => {
                &e.symbol
            }
            MarketEvent::MarketTick(e) => &e.symbol,
        }
    }
}
