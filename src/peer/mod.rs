//! Peer connection negotiation
//!
//! [`NegotiationEngine`] drives the offer/answer exchange over a single
//! [`PeerLink`] and reports completions (gathered candidates, arriving
//! remote tracks, transport state) as typed [`EngineEvent`]s.

mod engine;
mod link;

pub use engine::{EngineEvent, NegotiationEngine};
pub use link::{LinkState, PeerLink};
