//! Offer/answer negotiation engine

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::RTCIceCandidate;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

use crate::config::CallConfig;
use crate::error::{Error, Result};
use crate::media::LocalMediaHandle;
use crate::peer::link::{LinkState, PeerLink};
use crate::signaling::CandidateInit;

/// Completion events emitted by the negotiation engine
///
/// Every event names the link it came from so the consumer can discard
/// events from a link that was torn down in the meantime.
pub enum EngineEvent {
    /// A local ICE candidate was gathered and should be trickled out
    CandidateGenerated {
        /// Link the candidate belongs to
        link_id: Uuid,
        /// Candidate in wire shape
        candidate: CandidateInit,
    },

    /// The remote peer's media started arriving
    RemoteTrackArrived {
        /// Link the track belongs to
        link_id: Uuid,
        /// Remote track handle
        track: Arc<TrackRemote>,
    },

    /// Underlying transport state changed (logged by the consumer)
    TransportStateChanged {
        /// Link whose transport changed
        link_id: Uuid,
        /// New connection state
        state: RTCPeerConnectionState,
    },
}

/// Driver of a single peer connection's offer/answer negotiation
///
/// Holds at most one [`PeerLink`] at a time; starting a new negotiation
/// round tears the previous link down first. All completion callbacks are
/// funneled into one typed event channel instead of mutating shared state.
pub struct NegotiationEngine {
    config: CallConfig,
    events: mpsc::Sender<EngineEvent>,
    link: Option<PeerLink>,
}

impl NegotiationEngine {
    /// Create an engine and the receiving end of its event channel
    pub fn new(config: CallConfig) -> (Self, mpsc::Receiver<EngineEvent>) {
        let (events, rx) = mpsc::channel(config.event_buffer);
        (
            Self {
                config,
                events,
                link: None,
            },
            rx,
        )
    }

    /// Identifier of the live link, if any
    pub fn current_link_id(&self) -> Option<Uuid> {
        self.link.as_ref().map(|l| l.link_id())
    }

    /// Negotiation state of the live link, if any
    pub fn link_state(&self) -> Option<LinkState> {
        self.link.as_ref().map(|l| l.state())
    }

    /// Number of remote candidates buffered ahead of the remote description
    pub fn pending_candidates(&self) -> usize {
        self.link.as_ref().map_or(0, |l| l.pending_candidates())
    }

    /// Start a negotiation round as the caller.
    ///
    /// Builds a fresh link carrying the local tracks, produces an offer and
    /// applies it locally. Returns the offer SDP to send to the remote peer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Negotiation`] on any substrate failure; no link is
    /// retained in that case.
    pub async fn initiate(&mut self, media: &LocalMediaHandle) -> Result<String> {
        self.teardown().await;

        let mut link = self.build_link(media).await?;
        link.set_state(LinkState::Offering);

        match Self::make_offer(link.pc()).await {
            Ok(sdp) => {
                link.set_state(LinkState::AwaitingAnswer);
                info!("Created offer on link {}", link.link_id());
                self.link = Some(link);
                Ok(sdp)
            }
            Err(e) => {
                link.close().await;
                Err(e)
            }
        }
    }

    /// Answer a remote offer as the callee.
    ///
    /// Builds a fresh link, applies the remote offer, and produces the
    /// answer. Returns the answer SDP to send back.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Negotiation`] on any substrate failure; no link is
    /// retained in that case.
    pub async fn accept_offer(
        &mut self,
        media: &LocalMediaHandle,
        offer_sdp: String,
    ) -> Result<String> {
        self.teardown().await;

        let mut link = self.build_link(media).await?;
        link.set_state(LinkState::Answering);

        match Self::make_answer(link.pc(), offer_sdp).await {
            Ok(sdp) => {
                link.mark_remote_description_set();
                link.set_state(LinkState::Connected);
                info!("Created answer on link {}", link.link_id());
                self.link = Some(link);
                Ok(sdp)
            }
            Err(e) => {
                link.close().await;
                Err(e)
            }
        }
    }

    /// Apply the remote answer on the caller's link, then drain any
    /// candidates that were buffered while waiting for it, strictly in
    /// arrival order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Negotiation`] when no link is awaiting an answer or
    /// the description cannot be applied. Individual buffered candidates
    /// that fail to apply are logged, not propagated.
    pub async fn apply_answer(&mut self, answer_sdp: String) -> Result<()> {
        let link = self
            .link
            .as_mut()
            .ok_or_else(|| Error::Negotiation("No active link to apply answer to".to_string()))?;

        if link.state() != LinkState::AwaitingAnswer {
            return Err(Error::Negotiation(format!(
                "Answer not expected in link state {:?}",
                link.state()
            )));
        }

        let answer = RTCSessionDescription::answer(answer_sdp)
            .map_err(|e| Error::Negotiation(format!("Failed to parse answer: {}", e)))?;

        link.pc()
            .set_remote_description(answer)
            .await
            .map_err(|e| Error::Negotiation(format!("Failed to set remote description: {}", e)))?;

        link.mark_remote_description_set();

        let pending = link.take_pending_candidates();
        if !pending.is_empty() {
            debug!(
                "Applying {} buffered ICE candidates on link {}",
                pending.len(),
                link.link_id()
            );
        }
        for candidate in pending {
            if let Err(e) = Self::apply_candidate(link.pc(), candidate).await {
                warn!(
                    "Buffered ICE candidate rejected on link {}: {}",
                    link.link_id(),
                    e
                );
            }
        }

        link.set_state(LinkState::Connected);
        info!("Answer applied on link {}", link.link_id());

        Ok(())
    }

    /// Feed a remote ICE candidate into the live link.
    ///
    /// Candidates arriving before the remote description exists are
    /// buffered; a candidate with no live link at all is dropped quietly
    /// (trickle races teardown by design).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Negotiation`] when the substrate rejects an
    /// immediately-applied candidate.
    pub async fn add_remote_candidate(&mut self, candidate: CandidateInit) -> Result<()> {
        let Some(link) = self.link.as_mut() else {
            debug!("Ignoring remote ICE candidate with no active link");
            return Ok(());
        };

        if !link.remote_description_set() {
            link.buffer_candidate(candidate);
            debug!(
                "Buffered remote ICE candidate on link {} ({} pending)",
                link.link_id(),
                link.pending_candidates()
            );
            return Ok(());
        }

        Self::apply_candidate(link.pc(), candidate).await
    }

    /// Close and drop the live link, if any
    pub async fn teardown(&mut self) {
        if let Some(mut link) = self.link.take() {
            link.close().await;
        }
    }

    async fn make_offer(pc: &Arc<RTCPeerConnection>) -> Result<String> {
        let offer = pc
            .create_offer(None)
            .await
            .map_err(|e| Error::Negotiation(format!("Failed to create offer: {}", e)))?;

        pc.set_local_description(offer)
            .await
            .map_err(|e| Error::Negotiation(format!("Failed to set local description: {}", e)))?;

        let local_desc = pc.local_description().await.ok_or_else(|| {
            Error::Negotiation("No local description after setting offer".to_string())
        })?;

        Ok(local_desc.sdp)
    }

    async fn make_answer(pc: &Arc<RTCPeerConnection>, offer_sdp: String) -> Result<String> {
        let offer = RTCSessionDescription::offer(offer_sdp)
            .map_err(|e| Error::Negotiation(format!("Failed to parse offer: {}", e)))?;

        pc.set_remote_description(offer)
            .await
            .map_err(|e| Error::Negotiation(format!("Failed to set remote description: {}", e)))?;

        let answer = pc
            .create_answer(None)
            .await
            .map_err(|e| Error::Negotiation(format!("Failed to create answer: {}", e)))?;

        pc.set_local_description(answer)
            .await
            .map_err(|e| Error::Negotiation(format!("Failed to set local description: {}", e)))?;

        let local_desc = pc.local_description().await.ok_or_else(|| {
            Error::Negotiation("No local description after setting answer".to_string())
        })?;

        Ok(local_desc.sdp)
    }

    async fn apply_candidate(pc: &Arc<RTCPeerConnection>, candidate: CandidateInit) -> Result<()> {
        pc.add_ice_candidate(candidate.into_rtc())
            .await
            .map_err(|e| Error::Negotiation(format!("Failed to add ICE candidate: {}", e)))
    }

    /// Build a peer connection carrying the local tracks, with all
    /// completion callbacks wired into the event channel.
    async fn build_link(&self, media: &LocalMediaHandle) -> Result<PeerLink> {
        let link_id = Uuid::new_v4();

        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(|e| Error::Negotiation(format!("Failed to register codecs: {}", e)))?;

        let interceptor_registry = register_default_interceptors(Default::default(), &mut media_engine)
            .map_err(|e| Error::Negotiation(format!("Failed to register interceptors: {}", e)))?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(interceptor_registry)
            .build();

        let ice_servers: Vec<RTCIceServer> = self
            .config
            .stun_servers
            .iter()
            .map(|url| RTCIceServer {
                urls: vec![url.clone()],
                ..Default::default()
            })
            .chain(self.config.turn_servers.iter().map(|turn| {
                RTCIceServer {
                    urls: vec![turn.url.clone()],
                    username: turn.username.clone(),
                    credential: turn.credential.clone(),
                    ..Default::default()
                }
            }))
            .collect();

        let rtc_config = RTCConfiguration {
            ice_servers,
            ..Default::default()
        };

        let pc = Arc::new(api.new_peer_connection(rtc_config).await.map_err(|e| {
            Error::Negotiation(format!("Failed to create peer connection: {}", e))
        })?);

        info!("Created peer link {}", link_id);

        let audio_sender = pc
            .add_track(media.audio_track() as Arc<dyn TrackLocal + Send + Sync>)
            .await
            .map_err(|e| Error::MediaTrack(format!("Failed to add audio track: {}", e)))?;

        let video_sender = pc
            .add_track(media.video_track() as Arc<dyn TrackLocal + Send + Sync>)
            .await
            .map_err(|e| Error::MediaTrack(format!("Failed to add video track: {}", e)))?;

        let events = self.events.clone();
        pc.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
            let events = events.clone();
            Box::pin(async move {
                let Some(candidate) = candidate else {
                    return;
                };
                match candidate.to_json() {
                    Ok(init) => {
                        let event = EngineEvent::CandidateGenerated {
                            link_id,
                            candidate: init.into(),
                        };
                        if events.send(event).await.is_err() {
                            debug!("Event channel closed, dropping gathered candidate");
                        }
                    }
                    Err(e) => warn!("Failed to serialize gathered ICE candidate: {}", e),
                }
            })
        }));

        let events = self.events.clone();
        pc.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                let events = events.clone();
                Box::pin(async move {
                    let event = EngineEvent::RemoteTrackArrived { link_id, track };
                    if events.send(event).await.is_err() {
                        debug!("Event channel closed, dropping remote track event");
                    }
                })
            },
        ));

        let events = self.events.clone();
        pc.on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
            let events = events.clone();
            Box::pin(async move {
                let _ = events
                    .send(EngineEvent::TransportStateChanged { link_id, state })
                    .await;
            })
        }));

        Ok(PeerLink::new(link_id, pc, vec![audio_sender, video_sender]))
    }
}
