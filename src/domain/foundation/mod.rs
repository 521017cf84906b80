//! Foundation module - Shared domain primitives.
//!
//! Contains identifiers, timestamps, lifecycle enums and error types
//! that form the vocabulary of the signal hub.

mod connection_status;
mod errors;
mod ids;
mod state_machine;
mod timestamp;

pub use connection_status::ConnectionStatus;
pub use errors::ValidationError;
pub use ids::ClientId;
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
