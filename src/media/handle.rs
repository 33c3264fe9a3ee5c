//! Local media handle

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use webrtc::media::Sample;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

use crate::error::{Error, Result};

/// Smallest Opus frame that decodes to silence, substituted while muted so the
/// remote side keeps receiving the track rather than a removed one.
const OPUS_SILENCE_FRAME: [u8; 3] = [0xf8, 0xff, 0xfe];

/// Handle over the acquired microphone and camera tracks
///
/// Cloning is cheap; all clones share the same tracks and enabled flags.
/// The handle never tears tracks down itself; releasing is the job of
/// [`MediaSource`](crate::MediaSource).
#[derive(Clone)]
pub struct LocalMediaHandle {
    audio: Arc<TrackLocalStaticSample>,
    video: Arc<TrackLocalStaticSample>,
    audio_enabled: Arc<AtomicBool>,
    video_enabled: Arc<AtomicBool>,
}

impl LocalMediaHandle {
    /// Create a handle over freshly opened tracks; both start enabled
    pub fn new(audio: Arc<TrackLocalStaticSample>, video: Arc<TrackLocalStaticSample>) -> Self {
        Self {
            audio,
            video,
            audio_enabled: Arc::new(AtomicBool::new(true)),
            video_enabled: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Get the local audio track
    pub fn audio_track(&self) -> Arc<TrackLocalStaticSample> {
        Arc::clone(&self.audio)
    }

    /// Get the local video track
    pub fn video_track(&self) -> Arc<TrackLocalStaticSample> {
        Arc::clone(&self.video)
    }

    /// Whether the microphone is currently live (not muted)
    pub fn audio_enabled(&self) -> bool {
        self.audio_enabled.load(Ordering::SeqCst)
    }

    /// Whether the camera is currently live
    pub fn video_enabled(&self) -> bool {
        self.video_enabled.load(Ordering::SeqCst)
    }

    /// Enable or disable the microphone without renegotiating
    pub fn set_audio_enabled(&self, enabled: bool) {
        self.audio_enabled.store(enabled, Ordering::SeqCst);
    }

    /// Enable or disable the camera without renegotiating
    pub fn set_video_enabled(&self, enabled: bool) {
        self.video_enabled.store(enabled, Ordering::SeqCst);
    }

    /// Write a captured audio sample to the local track.
    ///
    /// While muted the payload is replaced with an Opus silence frame of
    /// the same duration, keeping the RTP stream alive for the peer.
    pub async fn write_audio(&self, sample: Sample) -> Result<()> {
        let sample = if self.audio_enabled() {
            sample
        } else {
            Sample {
                data: Bytes::from_static(&OPUS_SILENCE_FRAME),
                duration: sample.duration,
                ..Default::default()
            }
        };

        self.audio
            .write_sample(&sample)
            .await
            .map_err(|e| Error::MediaTrack(format!("Failed to write audio sample: {}", e)))
    }

    /// Write a captured video sample to the local track.
    ///
    /// While the camera is disabled frames are dropped; the receiver holds
    /// its last frame, the track itself stays negotiated.
    pub async fn write_video(&self, sample: Sample) -> Result<()> {
        if !self.video_enabled() {
            return Ok(());
        }

        self.video
            .write_sample(&sample)
            .await
            .map_err(|e| Error::MediaTrack(format!("Failed to write video sample: {}", e)))
    }
}

impl std::fmt::Debug for LocalMediaHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalMediaHandle")
            .field("audio_enabled", &self.audio_enabled())
            .field("video_enabled", &self.video_enabled())
            .finish()
    }
}
