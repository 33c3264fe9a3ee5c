//! Local media ownership

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::Result;
use crate::media::devices::MediaDevices;
use crate::media::LocalMediaHandle;

/// Owner of the local capture handle
///
/// At most one handle is open at a time. Acquisition is idempotent:
/// repeated calls return the existing handle without re-prompting the
/// user. The handle outlives individual peer links: hanging up releases
/// the link, while the preview handle is renewed right after.
pub struct MediaSource {
    devices: Arc<dyn MediaDevices>,
    handle: Mutex<Option<LocalMediaHandle>>,
}

impl MediaSource {
    /// Create a media source over the given capture capability
    pub fn new(devices: Arc<dyn MediaDevices>) -> Self {
        Self {
            devices,
            handle: Mutex::new(None),
        }
    }

    /// Request camera and microphone access
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::PermissionDenied`] if the user declines or
    /// the device is unavailable; no handle is retained in that case.
    pub async fn acquire(&self) -> Result<LocalMediaHandle> {
        let mut guard = self.handle.lock().await;

        if let Some(handle) = guard.as_ref() {
            debug!("Local media already acquired, reusing handle");
            return Ok(handle.clone());
        }

        let handle = self.devices.open().await?;
        info!("Local media acquired");
        *guard = Some(handle.clone());

        Ok(handle)
    }

    /// Stop all tracks and clear the handle; no-op when nothing is held
    pub async fn release(&self) {
        if self.handle.lock().await.take().is_some() {
            info!("Local media released");
        }
    }

    /// Get the current handle, if acquired
    pub async fn current(&self) -> Option<LocalMediaHandle> {
        self.handle.lock().await.clone()
    }

    /// Whether a handle is currently held
    pub async fn is_acquired(&self) -> bool {
        self.handle.lock().await.is_some()
    }

    /// Toggle the microphone flag without renegotiating
    ///
    /// Returns the new enabled value, or `None` when no handle is held.
    pub async fn set_audio_enabled(&self, enabled: bool) -> Option<bool> {
        let guard = self.handle.lock().await;
        let handle = guard.as_ref()?;
        handle.set_audio_enabled(enabled);
        Some(enabled)
    }

    /// Toggle the camera flag without renegotiating
    ///
    /// Returns the new enabled value, or `None` when no handle is held.
    pub async fn set_video_enabled(&self, enabled: bool) -> Option<bool> {
        let guard = self.handle.lock().await;
        let handle = guard.as_ref()?;
        handle.set_video_enabled(enabled);
        Some(enabled)
    }
}
