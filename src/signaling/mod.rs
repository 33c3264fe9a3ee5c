//! Signaling channel interface and wire protocol
//!
//! The engine only needs a bidirectional message channel to the remote
//! party: send one [`SignalMessage`], subscribe to inbound ones, and ask
//! whether the channel is currently connected. The concrete transport
//! (WebSocket client, socket server, in-process pair in tests) implements
//! [`SignalingChannel`] outside this crate.

mod protocol;

pub use protocol::{CandidateInit, SignalMessage};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;

/// Abstract bidirectional signaling channel to the remote peer
#[async_trait]
pub trait SignalingChannel: Send + Sync {
    /// Send a message to the remote party.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Signaling`] when the underlying transport
    /// rejects the message (e.g. it is disconnected mid-call).
    async fn send(&self, msg: SignalMessage) -> Result<()>;

    /// Take the inbound message stream.
    ///
    /// Called once by the session controller's event loop; the channel
    /// implementation pushes every inbound message into the returned
    /// receiver in arrival order.
    fn subscribe(&self) -> mpsc::UnboundedReceiver<SignalMessage>;

    /// Whether the channel is currently connected.
    ///
    /// New call attempts are refused while disconnected; established calls
    /// are left alone across transient disconnects.
    fn is_connected(&self) -> bool;
}
