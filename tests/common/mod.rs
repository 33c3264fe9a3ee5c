//! Shared test harness: in-memory signaling pair and scripted devices

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use banter_call::{
    CallState, Error, LocalMediaHandle, MediaDevices, Result, SessionController, SignalMessage,
    SignalingChannel, StaticSampleDevices,
};

/// Initialize logging for tests (call at the start of each test)
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "banter_call=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

/// One end of an in-memory signaling pair
///
/// Messages sent on one end arrive on the other in order, mimicking the
/// relay server both parties are connected to.
pub struct LoopbackChannel {
    to_peer: mpsc::UnboundedSender<SignalMessage>,
    inbound: std::sync::Mutex<Option<mpsc::UnboundedReceiver<SignalMessage>>>,
    connected: AtomicBool,
}

impl LoopbackChannel {
    /// Simulate the transport dropping or recovering
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }
}

#[async_trait]
impl SignalingChannel for LoopbackChannel {
    async fn send(&self, msg: SignalMessage) -> Result<()> {
        if !self.is_connected() {
            return Err(Error::Signaling("loopback transport is down".to_string()));
        }
        self.to_peer
            .send(msg)
            .map_err(|_| Error::Signaling("peer end dropped".to_string()))
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<SignalMessage> {
        self.inbound
            .lock()
            .expect("inbound receiver lock poisoned")
            .take()
            .expect("subscribe called twice on loopback channel")
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// Build a connected pair of loopback channels
pub fn loopback_pair() -> (Arc<LoopbackChannel>, Arc<LoopbackChannel>) {
    let (a_to_b, b_inbound) = mpsc::unbounded_channel();
    let (b_to_a, a_inbound) = mpsc::unbounded_channel();

    let a = Arc::new(LoopbackChannel {
        to_peer: a_to_b,
        inbound: std::sync::Mutex::new(Some(a_inbound)),
        connected: AtomicBool::new(true),
    });
    let b = Arc::new(LoopbackChannel {
        to_peer: b_to_a,
        inbound: std::sync::Mutex::new(Some(b_inbound)),
        connected: AtomicBool::new(true),
    });

    (a, b)
}

/// Capture devices that count opens and can be told to deny access
pub struct ScriptedDevices {
    pub deny: AtomicBool,
    pub opens: AtomicUsize,
}

impl ScriptedDevices {
    pub fn new() -> Self {
        Self {
            deny: AtomicBool::new(false),
            opens: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl MediaDevices for ScriptedDevices {
    async fn open(&self) -> Result<LocalMediaHandle> {
        if self.deny.load(Ordering::SeqCst) {
            return Err(Error::PermissionDenied(
                "camera/microphone access declined".to_string(),
            ));
        }
        self.opens.fetch_add(1, Ordering::SeqCst);
        StaticSampleDevices.open().await
    }
}

/// Poll until the controller reaches the expected state or time runs out
pub async fn wait_for_state(
    controller: &Arc<SessionController>,
    expected: CallState,
    timeout: Duration,
) {
    let result = tokio::time::timeout(timeout, async {
        loop {
            if controller.call_state().await == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;

    assert!(
        result.is_ok(),
        "controller did not reach {:?} within {:?} (currently {:?})",
        expected,
        timeout,
        controller.call_state().await
    );
}
