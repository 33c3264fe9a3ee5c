//! Capture device capability

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

use crate::error::Result;
use crate::media::LocalMediaHandle;

/// Permission-gated access to the microphone and camera
///
/// Implementations open the capture pipeline and hand back a
/// [`LocalMediaHandle`], failing with [`crate::Error::PermissionDenied`]
/// when the user declines or no device is available.
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Open microphone and camera tracks
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::PermissionDenied`] if access is refused
    /// or no capture device exists.
    async fn open(&self) -> Result<LocalMediaHandle>;
}

/// Sample-fed capture devices
///
/// Creates Opus and VP8 local tracks that the embedding application feeds
/// through [`LocalMediaHandle::write_audio`] and
/// [`LocalMediaHandle::write_video`]; the engine itself never touches
/// capture hardware.
#[derive(Debug, Default)]
pub struct StaticSampleDevices;

#[async_trait]
impl MediaDevices for StaticSampleDevices {
    async fn open(&self) -> Result<LocalMediaHandle> {
        let stream_id = format!("stream-{}", Uuid::new_v4());

        let audio = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                clock_rate: 48000,
                channels: 2,
                sdp_fmtp_line: String::new(),
                rtcp_feedback: vec![],
            },
            format!("audio-{}", Uuid::new_v4()),
            stream_id.clone(),
        ));

        let video = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_VP8.to_owned(),
                clock_rate: 90000, // Standard 90kHz clock for video
                channels: 0,
                sdp_fmtp_line: String::new(),
                rtcp_feedback: vec![],
            },
            format!("video-{}", Uuid::new_v4()),
            stream_id,
        ));

        debug!("Opened local audio/video tracks for stream");

        Ok(LocalMediaHandle::new(audio, video))
    }
}
