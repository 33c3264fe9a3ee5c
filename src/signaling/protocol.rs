//! Signaling wire protocol
//!
//! JSON messages exchanged between the two call parties via the signaling
//! intermediary. The transport carrying them (WebSocket, socket server, …)
//! is outside this crate; only the message shapes are defined here.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// ICE candidate payload, shaped like the browser's `RTCIceCandidateInit`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateInit {
    /// Candidate string in `candidate:` attribute syntax
    pub candidate: String,

    /// Media stream identification tag
    #[serde(rename = "sdpMid", default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,

    /// Index of the media description this candidate belongs to
    #[serde(
        rename = "sdpMLineIndex",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub sdp_mline_index: Option<u16>,
}

impl CandidateInit {
    /// Convert into the webrtc-rs candidate init type
    pub fn into_rtc(self) -> webrtc::ice_transport::ice_candidate::RTCIceCandidateInit {
        webrtc::ice_transport::ice_candidate::RTCIceCandidateInit {
            candidate: self.candidate,
            sdp_mid: self.sdp_mid,
            sdp_mline_index: self.sdp_mline_index,
            username_fragment: None,
        }
    }
}

impl From<webrtc::ice_transport::ice_candidate::RTCIceCandidateInit> for CandidateInit {
    fn from(init: webrtc::ice_transport::ice_candidate::RTCIceCandidateInit) -> Self {
        Self {
            candidate: init.candidate,
            sdp_mid: init.sdp_mid,
            sdp_mline_index: init.sdp_mline_index,
        }
    }
}

/// Messages carried over the signaling channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SignalMessage {
    /// Remote party asks us to place the call (we become the caller)
    StartCall,

    /// SDP offer from the caller
    Offer {
        /// Offer SDP text
        sdp: String,
    },

    /// SDP answer from the callee
    Answer {
        /// Answer SDP text
        sdp: String,
    },

    /// Trickled ICE candidate
    IceCandidate(CandidateInit),
}

impl SignalMessage {
    /// Get the message kind for logging
    pub fn kind_name(&self) -> &'static str {
        match self {
            SignalMessage::StartCall => "start_call",
            SignalMessage::Offer { .. } => "offer",
            SignalMessage::Answer { .. } => "answer",
            SignalMessage::IceCandidate(_) => "ice_candidate",
        }
    }

    /// Serialize to a JSON string
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
