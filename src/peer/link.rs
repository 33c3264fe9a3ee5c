//! Per-negotiation peer link state

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;

use crate::signaling::CandidateInit;

/// Negotiation state of a single peer link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Link created, no description exchanged yet
    Idle,
    /// Local offer being produced (caller)
    Offering,
    /// Offer sent, waiting for the remote answer (caller)
    AwaitingAnswer,
    /// Remote offer received, producing the answer (callee)
    Answering,
    /// Both descriptions applied
    Connected,
    /// Torn down
    Closed,
}

/// One peer connection and its negotiation round
///
/// A link lives for exactly one offer/answer round: a second offer means a
/// fresh link. The remote description is set at most once; candidates that
/// arrive before it are buffered here in arrival order.
pub struct PeerLink {
    link_id: Uuid,
    pc: Arc<RTCPeerConnection>,
    state: LinkState,
    remote_description_set: bool,
    pending_candidates: Vec<CandidateInit>,

    /// RTP senders retained to prevent track cleanup
    #[allow(dead_code)]
    senders: Vec<Arc<RTCRtpSender>>,
}

impl PeerLink {
    /// Wrap a freshly built peer connection
    pub fn new(link_id: Uuid, pc: Arc<RTCPeerConnection>, senders: Vec<Arc<RTCRtpSender>>) -> Self {
        Self {
            link_id,
            pc,
            state: LinkState::Idle,
            remote_description_set: false,
            pending_candidates: Vec::new(),
            senders,
        }
    }

    /// Get the link identifier
    pub fn link_id(&self) -> Uuid {
        self.link_id
    }

    /// Get the underlying peer connection
    pub fn pc(&self) -> &Arc<RTCPeerConnection> {
        &self.pc
    }

    /// Get the current negotiation state
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Advance the negotiation state
    pub fn set_state(&mut self, new_state: LinkState) {
        if self.state != new_state {
            debug!(
                "Link {} state transition: {:?} -> {:?}",
                self.link_id, self.state, new_state
            );
            self.state = new_state;
        }
    }

    /// Whether the remote description has been applied
    pub fn remote_description_set(&self) -> bool {
        self.remote_description_set
    }

    /// Record that the remote description was applied.
    ///
    /// Only legal once per link; renegotiation requires a fresh link.
    pub fn mark_remote_description_set(&mut self) {
        debug_assert!(!self.remote_description_set);
        self.remote_description_set = true;
    }

    /// Buffer a remote candidate that arrived ahead of the remote description
    pub fn buffer_candidate(&mut self, candidate: CandidateInit) {
        self.pending_candidates.push(candidate);
    }

    /// Number of buffered remote candidates
    pub fn pending_candidates(&self) -> usize {
        self.pending_candidates.len()
    }

    /// Drain the buffered candidates in arrival order
    pub fn take_pending_candidates(&mut self) -> Vec<CandidateInit> {
        std::mem::take(&mut self.pending_candidates)
    }

    /// Close the underlying peer connection
    pub async fn close(&mut self) {
        self.set_state(LinkState::Closed);
        info!("Closing peer link {}", self.link_id);

        if let Err(e) = self.pc.close().await {
            warn!("Failed to close peer link {}: {}", self.link_id, e);
        }
    }
}
