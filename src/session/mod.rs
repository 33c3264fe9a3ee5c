//! Call session orchestration
//!
//! [`SessionController`] owns the media source and the negotiation engine,
//! exposes the four user intents (start, end, toggle mute, toggle video),
//! and reconciles inbound signaling with the session state machine
//! `NoCall -> Connecting -> InCall -> NoCall`.

mod controller;

pub use controller::SessionController;

use uuid::Uuid;

/// Call session state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    /// No session; local preview may still be live
    NoCall,
    /// Caller sent an offer and is waiting for the answer
    Connecting,
    /// Both descriptions applied, call established
    InCall,
}

/// Which side of the call this party is on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallRole {
    /// We sent the offer
    Caller,
    /// We answered a remote offer
    Callee,
}

/// The live call session
#[derive(Debug, Clone, Copy)]
pub(crate) struct CallSession {
    pub session_id: Uuid,
    pub role: CallRole,
    #[allow(dead_code)]
    pub link_id: Uuid,
}

/// Snapshot of session state for presentation layers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStatus {
    /// Current call state
    pub state: CallState,
    /// Role in the live session, if any
    pub role: Option<CallRole>,
    /// Whether the microphone is muted
    pub muted: bool,
    /// Whether the camera is live
    pub video_enabled: bool,
    /// Whether remote media has started arriving
    pub has_remote_media: bool,
}
