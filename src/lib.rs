//! Two-party audio/video call session engine built on WebRTC
//!
//! This crate drives the full lifecycle of a one-to-one call: acquiring
//! local media, negotiating a peer connection via offer/answer and trickle
//! ICE over an abstract signaling channel, and exposing the in-call
//! controls (mute, camera toggle, hang up).
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────┐
//! │  SessionController (call state machine)           │
//! │  ├─ MediaSource (owns the local capture handle)   │
//! │  ├─ NegotiationEngine (one PeerLink per round)    │
//! │  │   └─ webrtc::RTCPeerConnection                 │
//! │  └─ SignalingChannel (abstract, app-provided)     │
//! └───────────────────────────────────────────────────┘
//! ```
//!
//! The controller owns everything; the engine reports completions
//! (gathered candidates, arriving remote tracks) as typed events that the
//! controller's single event loop consumes, so no callback ever mutates
//! session state directly.
//!
//! # Example
//!
//! ```
//! use banter_call::CallConfig;
//!
//! let config = CallConfig {
//!     stun_servers: vec!["stun:stun.l.google.com:19302".to_string()],
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod media;
pub mod peer;
pub mod session;
pub mod signaling;

// Re-exports for public API
pub use config::{CallConfig, TurnServerConfig};
pub use error::{Error, Result};
pub use media::{LocalMediaHandle, MediaDevices, MediaSource, StaticSampleDevices};
pub use peer::{EngineEvent, LinkState, NegotiationEngine};
pub use session::{CallRole, CallState, SessionController, SessionStatus};
pub use signaling::{CandidateInit, SignalMessage, SignalingChannel};

/// Get the version of this crate
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
