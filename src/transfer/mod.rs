//! Data channel establishment and transfer
//!
//! The short-lived secondary connection: negotiation of where it comes from
//! (passive or active, plain or extended) and the single-use byte stream
//! that rides on it.

pub mod data;
pub mod negotiator;

pub use data::{DataConnection, Direction};
pub use negotiator::{DataChannelNegotiator, NegotiationState, TransferMode};
