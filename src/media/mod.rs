//! Local media capture and ownership
//!
//! [`MediaSource`] owns the acquired capture handle for the lifetime of the
//! application; peer links borrow its tracks for the duration of a call.
//! Mute and camera toggles flip per-track flags on the handle and never
//! renegotiate the connection.

pub mod devices;
mod handle;
mod source;

pub use devices::{MediaDevices, StaticSampleDevices};
pub use handle::LocalMediaHandle;
pub use source::MediaSource;
