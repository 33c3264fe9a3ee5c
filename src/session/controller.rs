//! Top-level call session controller

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;
use webrtc::track::track_remote::TrackRemote;

use crate::config::CallConfig;
use crate::error::{Error, Result};
use crate::media::{MediaDevices, MediaSource};
use crate::peer::{EngineEvent, NegotiationEngine};
use crate::session::{CallRole, CallSession, CallState, SessionStatus};
use crate::signaling::{CandidateInit, SignalMessage, SignalingChannel};

/// Mutable session state, serialized behind one lock
struct ControllerState {
    call_state: CallState,
    session: Option<CallSession>,
    engine: NegotiationEngine,
    engine_events: Option<mpsc::Receiver<EngineEvent>>,
}

/// Orchestrator of a single two-party call
///
/// Owns the [`MediaSource`] and the [`NegotiationEngine`]; every
/// state-mutating operation runs to completion under one lock, so
/// overlapping intents queue rather than race. Inbound signaling and
/// engine completions are consumed by the event loop started with
/// [`SessionController::spawn`].
pub struct SessionController {
    signaling: Arc<dyn SignalingChannel>,
    media: MediaSource,
    state: Mutex<ControllerState>,
    remote_tracks: RwLock<Vec<Arc<TrackRemote>>>,
    last_error: RwLock<Option<String>>,
}

impl SessionController {
    /// Create a controller over the given signaling channel and capture
    /// capability.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] when the configuration fails
    /// validation.
    pub fn new(
        config: CallConfig,
        signaling: Arc<dyn SignalingChannel>,
        devices: Arc<dyn MediaDevices>,
    ) -> Result<Self> {
        config.validate()?;

        let (engine, engine_events) = NegotiationEngine::new(config);

        Ok(Self {
            signaling,
            media: MediaSource::new(devices),
            state: Mutex::new(ControllerState {
                call_state: CallState::NoCall,
                session: None,
                engine,
                engine_events: Some(engine_events),
            }),
            remote_tracks: RwLock::new(Vec::new()),
            last_error: RwLock::new(None),
        })
    }

    /// Start the event loop consuming inbound signaling and engine events.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] when called a second time.
    pub async fn spawn(self: &Arc<Self>) -> Result<JoinHandle<()>> {
        let mut engine_rx = {
            let mut st = self.state.lock().await;
            st.engine_events
                .take()
                .ok_or_else(|| Error::InvalidState("event loop already started".to_string()))?
        };
        let mut signal_rx = self.signaling.subscribe();

        let controller = Arc::clone(self);
        Ok(tokio::spawn(async move {
            loop {
                tokio::select! {
                    engine_event = engine_rx.recv() => match engine_event {
                        Some(event) => controller.handle_engine_event(event).await,
                        None => break,
                    },
                    signal = signal_rx.recv() => match signal {
                        Some(msg) => controller.handle_signal(msg).await,
                        None => {
                            debug!("Signaling stream ended, stopping session event loop");
                            break;
                        }
                    },
                }
            }
        }))
    }

    /// Place a call to the remote party.
    ///
    /// Acquires local media, produces an offer and sends it out. The
    /// session stays in [`CallState::Connecting`] until the remote answer
    /// is applied.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] when a call is already in progress
    /// - [`Error::ChannelUnavailable`] when signaling is disconnected
    /// - [`Error::PermissionDenied`] when media acquisition is refused
    /// - [`Error::Negotiation`] / [`Error::Signaling`] on setup failure;
    ///   the session rolls back to [`CallState::NoCall`] with the local
    ///   preview kept alive
    pub async fn start_call(&self) -> Result<()> {
        let mut st = self.state.lock().await;

        if st.call_state != CallState::NoCall {
            return Err(Error::InvalidState(format!(
                "Cannot start a call in state {:?}",
                st.call_state
            )));
        }

        if !self.signaling.is_connected() {
            self.record_error("signaling channel unavailable").await;
            return Err(Error::ChannelUnavailable);
        }

        let media = match self.media.acquire().await {
            Ok(handle) => handle,
            Err(e) => {
                self.record_error(&e.to_string()).await;
                return Err(e);
            }
        };

        st.call_state = CallState::Connecting;
        info!("Call state transition: NoCall -> Connecting (caller)");

        // A fresh session never inherits tracks from an earlier link
        self.remote_tracks.write().await.clear();

        let offer_sdp = match st.engine.initiate(&media).await {
            Ok(sdp) => sdp,
            Err(e) => {
                self.fail_setup(&mut st, &e).await;
                return Err(e);
            }
        };

        let link_id = match st.engine.current_link_id() {
            Some(id) => id,
            None => {
                let e = Error::Negotiation("Link missing after initiate".to_string());
                self.fail_setup(&mut st, &e).await;
                return Err(e);
            }
        };

        if let Err(e) = self.signaling.send(SignalMessage::Offer { sdp: offer_sdp }).await {
            self.fail_setup(&mut st, &e).await;
            return Err(e);
        }

        st.session = Some(CallSession {
            session_id: Uuid::new_v4(),
            role: CallRole::Caller,
            link_id,
        });
        self.clear_error().await;

        Ok(())
    }

    /// Hang up.
    ///
    /// Legal from any state: tears the negotiation down, releases local
    /// media and renews the preview handle. Preview re-acquisition failure
    /// is reported but never blocks the teardown.
    pub async fn end_call(&self) -> Result<()> {
        let mut st = self.state.lock().await;

        let prior = st.call_state;
        st.engine.teardown().await;
        st.session = None;
        st.call_state = CallState::NoCall;
        if prior != CallState::NoCall {
            info!("Call state transition: {:?} -> NoCall", prior);
        }

        self.remote_tracks.write().await.clear();

        self.media.release().await;
        if let Err(e) = self.media.acquire().await {
            warn!("Failed to renew local preview after hangup: {}", e);
            self.record_error(&e.to_string()).await;
        }

        Ok(())
    }

    /// Flip the microphone mute flag; returns the new muted value.
    ///
    /// Local-only: the track stays negotiated and keeps carrying silence,
    /// so the engine is never touched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] outside [`CallState::InCall`].
    pub async fn toggle_mute(&self) -> Result<bool> {
        let st = self.state.lock().await;

        if st.call_state != CallState::InCall {
            return Err(Error::InvalidState(format!(
                "toggle_mute not available in state {:?}",
                st.call_state
            )));
        }

        match self.media.current().await {
            Some(handle) => {
                let enabled = !handle.audio_enabled();
                handle.set_audio_enabled(enabled);
                info!("Microphone {}", if enabled { "live" } else { "muted" });
                Ok(!enabled)
            }
            None => {
                warn!("toggle_mute with no local media handle");
                Ok(false)
            }
        }
    }

    /// Flip the camera flag; returns the new enabled value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] outside [`CallState::InCall`].
    pub async fn toggle_video(&self) -> Result<bool> {
        let st = self.state.lock().await;

        if st.call_state != CallState::InCall {
            return Err(Error::InvalidState(format!(
                "toggle_video not available in state {:?}",
                st.call_state
            )));
        }

        match self.media.current().await {
            Some(handle) => {
                let enabled = !handle.video_enabled();
                handle.set_video_enabled(enabled);
                info!("Camera {}", if enabled { "live" } else { "off" });
                Ok(enabled)
            }
            None => {
                warn!("toggle_video with no local media handle");
                Ok(false)
            }
        }
    }

    /// Dispatch one inbound signaling message
    pub async fn handle_signal(&self, msg: SignalMessage) {
        debug!("Inbound signal: {}", msg.kind_name());
        match msg {
            SignalMessage::StartCall => {
                // Remote party asked us to place the call; failures are
                // surfaced through last_error, not returned to anyone.
                if let Err(e) = self.start_call().await {
                    warn!("Remote start_call request failed: {}", e);
                }
            }
            SignalMessage::Offer { sdp } => self.on_remote_offer(sdp).await,
            SignalMessage::Answer { sdp } => self.on_remote_answer(sdp).await,
            SignalMessage::IceCandidate(candidate) => self.on_remote_ice_candidate(candidate).await,
        }
    }

    /// Answer a remote offer (callee path).
    ///
    /// Only legal from [`CallState::NoCall`]; an offer during a live call
    /// is logged and ignored (there is no glare handling). On success the
    /// callee goes straight to [`CallState::InCall`].
    pub async fn on_remote_offer(&self, sdp: String) {
        let mut st = self.state.lock().await;

        if st.call_state != CallState::NoCall {
            warn!("Ignoring remote offer in state {:?}", st.call_state);
            return;
        }

        let media = match self.media.acquire().await {
            Ok(handle) => handle,
            Err(e) => {
                warn!("Cannot answer call, media acquisition failed: {}", e);
                self.record_error(&e.to_string()).await;
                return;
            }
        };

        // A fresh session never inherits tracks from an earlier link
        self.remote_tracks.write().await.clear();

        let answer_sdp = match st.engine.accept_offer(&media, sdp).await {
            Ok(sdp) => sdp,
            Err(e) => {
                self.fail_setup(&mut st, &e).await;
                return;
            }
        };

        let link_id = match st.engine.current_link_id() {
            Some(id) => id,
            None => {
                let e = Error::Negotiation("Link missing after accept_offer".to_string());
                self.fail_setup(&mut st, &e).await;
                return;
            }
        };

        if let Err(e) = self
            .signaling
            .send(SignalMessage::Answer { sdp: answer_sdp })
            .await
        {
            self.fail_setup(&mut st, &e).await;
            return;
        }

        st.session = Some(CallSession {
            session_id: Uuid::new_v4(),
            role: CallRole::Callee,
            link_id,
        });
        st.call_state = CallState::InCall;
        info!("Call state transition: NoCall -> InCall (callee)");
        self.clear_error().await;
    }

    /// Apply a remote answer (caller path).
    ///
    /// Only legal from [`CallState::Connecting`]. Failure is logged and
    /// leaves the session where it was; the user can still hang up.
    pub async fn on_remote_answer(&self, sdp: String) {
        let mut st = self.state.lock().await;

        if st.call_state != CallState::Connecting {
            warn!("Ignoring remote answer in state {:?}", st.call_state);
            return;
        }

        match st.engine.apply_answer(sdp).await {
            Ok(()) => {
                st.call_state = CallState::InCall;
                info!("Call state transition: Connecting -> InCall (caller)");
                self.clear_error().await;
            }
            Err(e) => {
                warn!("Failed to apply remote answer: {}", e);
                self.record_error(&e.to_string()).await;
            }
        }
    }

    /// Feed a remote ICE candidate into the live negotiation.
    ///
    /// A candidate with no call in progress is a quiet no-op; a bad
    /// candidate never fails the call.
    pub async fn on_remote_ice_candidate(&self, candidate: CandidateInit) {
        let mut st = self.state.lock().await;

        if st.call_state == CallState::NoCall {
            debug!("Ignoring remote ICE candidate with no call in progress");
            return;
        }

        if let Err(e) = st.engine.add_remote_candidate(candidate).await {
            warn!("Remote ICE candidate rejected: {}", e);
        }
    }

    /// Current call state
    pub async fn call_state(&self) -> CallState {
        self.state.lock().await.call_state
    }

    /// Identifier of the live session, if any
    pub async fn session_id(&self) -> Option<Uuid> {
        self.state.lock().await.session.map(|s| s.session_id)
    }

    /// Remote tracks that have started arriving on the live session
    pub async fn remote_tracks(&self) -> Vec<Arc<TrackRemote>> {
        self.remote_tracks.read().await.clone()
    }

    /// Last surfaced error, if any; cleared on the next successful operation
    pub async fn last_error(&self) -> Option<String> {
        self.last_error.read().await.clone()
    }

    /// The owned media source (e.g. to warm the preview before any call)
    pub fn media(&self) -> &MediaSource {
        &self.media
    }

    /// Snapshot of session state for presentation layers
    pub async fn status(&self) -> SessionStatus {
        let st = self.state.lock().await;
        let handle = self.media.current().await;

        SessionStatus {
            state: st.call_state,
            role: st.session.map(|s| s.role),
            // With no handle yet, report the idle defaults: unmuted, camera on
            muted: handle.as_ref().map(|h| !h.audio_enabled()).unwrap_or(false),
            video_enabled: handle.as_ref().map(|h| h.video_enabled()).unwrap_or(true),
            has_remote_media: !self.remote_tracks.read().await.is_empty(),
        }
    }

    /// The link-id check and the resulting mutation happen under the state
    /// lock, so a concurrent hangup cannot slip between them.
    async fn handle_engine_event(&self, event: EngineEvent) {
        match event {
            EngineEvent::CandidateGenerated { link_id, candidate } => {
                let st = self.state.lock().await;
                if st.engine.current_link_id() != Some(link_id) {
                    debug!("Discarding gathered candidate from stale link {}", link_id);
                    return;
                }
                if let Err(e) = self
                    .signaling
                    .send(SignalMessage::IceCandidate(candidate))
                    .await
                {
                    warn!("Failed to trickle ICE candidate: {}", e);
                }
            }
            EngineEvent::RemoteTrackArrived { link_id, track } => {
                let st = self.state.lock().await;
                if st.engine.current_link_id() != Some(link_id) {
                    debug!("Discarding remote track from stale link {}", link_id);
                    return;
                }
                info!("Remote {} track arrived", track.kind());
                self.remote_tracks.write().await.push(track);
            }
            EngineEvent::TransportStateChanged { link_id, state } => {
                debug!("Link {} transport state: {:?}", link_id, state);
            }
        }
    }

    /// Roll a failed call setup back to `NoCall`, keeping local media so
    /// the preview stays alive.
    async fn fail_setup(&self, st: &mut ControllerState, err: &Error) {
        warn!("Call setup failed, rolling back: {}", err);
        st.engine.teardown().await;
        st.session = None;
        st.call_state = CallState::NoCall;
        self.record_error(&err.to_string()).await;
    }

    async fn record_error(&self, message: &str) {
        *self.last_error.write().await = Some(message.to_string());
    }

    async fn clear_error(&self) {
        *self.last_error.write().await = None;
    }
}
