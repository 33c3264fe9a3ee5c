//! End-to-end call flow tests
//!
//! Two real controllers negotiate over an in-memory signaling pair; the
//! peer connections, SDP and ICE gathering underneath are the real thing.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use banter_call::{
    CallConfig, CallRole, CallState, CandidateInit, Error, SessionController, SignalMessage,
};

use common::{init_logging, loopback_pair, wait_for_state, ScriptedDevices};

fn controller(
    signaling: Arc<common::LoopbackChannel>,
    devices: Arc<ScriptedDevices>,
) -> Arc<SessionController> {
    Arc::new(
        SessionController::new(CallConfig::default(), signaling, devices)
            .expect("default config must be valid"),
    )
}

// ============================================================
// Happy path: offer out, answer back, both sides in call
// ============================================================

#[tokio::test]
async fn test_caller_and_callee_establish_a_call() {
    init_logging();

    let (caller_signal, callee_signal) = loopback_pair();
    let caller = controller(caller_signal, Arc::new(ScriptedDevices::new()));
    let callee = controller(callee_signal, Arc::new(ScriptedDevices::new()));

    let _caller_loop = caller.spawn().await.unwrap();
    let _callee_loop = callee.spawn().await.unwrap();

    caller.start_call().await.unwrap();
    assert_eq!(caller.call_state().await, CallState::Connecting);

    // Callee answers the offer and goes straight to InCall
    wait_for_state(&callee, CallState::InCall, Duration::from_secs(5)).await;
    assert_eq!(callee.status().await.role, Some(CallRole::Callee));

    // Caller transitions only once the answer is applied
    wait_for_state(&caller, CallState::InCall, Duration::from_secs(5)).await;
    let status = caller.status().await;
    assert_eq!(status.role, Some(CallRole::Caller));
    assert!(!status.muted);
    assert!(status.video_enabled);

    // No media samples were written, so no remote track event has fired yet
    assert!(caller.remote_tracks().await.is_empty());
    assert!(caller.last_error().await.is_none());
}

// ============================================================
// Overlapping intents
// ============================================================

#[tokio::test]
async fn test_second_start_call_is_rejected_without_touching_the_session() {
    init_logging();

    let (caller_signal, callee_signal) = loopback_pair();
    let caller = controller(caller_signal, Arc::new(ScriptedDevices::new()));
    let callee = controller(callee_signal, Arc::new(ScriptedDevices::new()));

    let _caller_loop = caller.spawn().await.unwrap();
    let _callee_loop = callee.spawn().await.unwrap();

    caller.start_call().await.unwrap();
    wait_for_state(&caller, CallState::InCall, Duration::from_secs(5)).await;
    let session_id = caller.session_id().await;

    let err = caller.start_call().await.unwrap_err();
    assert!(matches!(err, Error::InvalidState(_)));

    assert_eq!(caller.call_state().await, CallState::InCall);
    assert_eq!(caller.session_id().await, session_id);
}

#[tokio::test]
async fn test_offer_during_live_call_is_ignored() {
    init_logging();

    let (caller_signal, callee_signal) = loopback_pair();
    let caller = controller(caller_signal, Arc::new(ScriptedDevices::new()));
    let callee = controller(callee_signal, Arc::new(ScriptedDevices::new()));

    let _caller_loop = caller.spawn().await.unwrap();
    let _callee_loop = callee.spawn().await.unwrap();

    caller.start_call().await.unwrap();
    wait_for_state(&caller, CallState::InCall, Duration::from_secs(5)).await;
    let session_id = caller.session_id().await;

    caller
        .handle_signal(SignalMessage::Offer {
            sdp: "v=0\r\n".to_string(),
        })
        .await;

    assert_eq!(caller.call_state().await, CallState::InCall);
    assert_eq!(caller.session_id().await, session_id);
}

// ============================================================
// Failure paths
// ============================================================

#[tokio::test]
async fn test_permission_failure_leaves_no_call_and_sends_nothing() {
    init_logging();

    let (caller_signal, callee_signal) = loopback_pair();
    let devices = Arc::new(ScriptedDevices::new());
    devices.deny.store(true, Ordering::SeqCst);
    let caller = controller(caller_signal, devices);
    let callee = controller(callee_signal, Arc::new(ScriptedDevices::new()));

    let _caller_loop = caller.spawn().await.unwrap();
    let _callee_loop = callee.spawn().await.unwrap();

    let err = caller.start_call().await.unwrap_err();
    assert!(matches!(err, Error::PermissionDenied(_)));
    assert_eq!(caller.call_state().await, CallState::NoCall);
    assert!(caller.last_error().await.is_some());

    // No offer ever reached the other side
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(callee.call_state().await, CallState::NoCall);
}

#[tokio::test]
async fn test_start_call_refused_while_signaling_is_down() {
    init_logging();

    let (caller_signal, _callee_signal) = loopback_pair();
    caller_signal.set_connected(false);
    let caller = controller(caller_signal, Arc::new(ScriptedDevices::new()));

    let err = caller.start_call().await.unwrap_err();
    assert!(matches!(err, Error::ChannelUnavailable));
    assert_eq!(caller.call_state().await, CallState::NoCall);
}

#[tokio::test]
async fn test_stray_candidate_is_a_noop() {
    init_logging();

    let (caller_signal, _callee_signal) = loopback_pair();
    let caller = controller(caller_signal, Arc::new(ScriptedDevices::new()));

    caller
        .on_remote_ice_candidate(CandidateInit {
            candidate: "candidate:1 1 udp 2130706431 192.0.2.1 54321 typ host".to_string(),
            sdp_mid: Some("0".to_string()),
            sdp_mline_index: Some(0),
        })
        .await;

    assert_eq!(caller.call_state().await, CallState::NoCall);
    assert!(caller.last_error().await.is_none());
}

#[tokio::test]
async fn test_idle_status_reports_default_flags() {
    init_logging();

    let (caller_signal, _callee_signal) = loopback_pair();
    let caller = controller(caller_signal, Arc::new(ScriptedDevices::new()));

    // Before any media is acquired the snapshot shows the idle defaults
    let status = caller.status().await;
    assert_eq!(status.state, CallState::NoCall);
    assert!(!status.muted);
    assert!(status.video_enabled);
    assert!(!status.has_remote_media);
}

// ============================================================
// In-call controls
// ============================================================

#[tokio::test]
async fn test_mute_toggle_is_an_involution_and_spares_video() {
    init_logging();

    let (caller_signal, callee_signal) = loopback_pair();
    let caller = controller(caller_signal, Arc::new(ScriptedDevices::new()));
    let callee = controller(callee_signal, Arc::new(ScriptedDevices::new()));

    let _caller_loop = caller.spawn().await.unwrap();
    let _callee_loop = callee.spawn().await.unwrap();

    caller.start_call().await.unwrap();
    wait_for_state(&caller, CallState::InCall, Duration::from_secs(5)).await;

    assert!(caller.toggle_mute().await.unwrap());
    let status = caller.status().await;
    assert!(status.muted);
    assert!(status.video_enabled);

    assert!(!caller.toggle_mute().await.unwrap());
    let status = caller.status().await;
    assert!(!status.muted);
    assert!(status.video_enabled);
}

#[tokio::test]
async fn test_toggles_rejected_outside_a_call() {
    init_logging();

    let (caller_signal, _callee_signal) = loopback_pair();
    let caller = controller(caller_signal, Arc::new(ScriptedDevices::new()));

    assert!(matches!(
        caller.toggle_mute().await.unwrap_err(),
        Error::InvalidState(_)
    ));
    assert!(matches!(
        caller.toggle_video().await.unwrap_err(),
        Error::InvalidState(_)
    ));
}

#[tokio::test]
async fn test_video_toggle_flips_only_the_camera() {
    init_logging();

    let (caller_signal, callee_signal) = loopback_pair();
    let caller = controller(caller_signal, Arc::new(ScriptedDevices::new()));
    let callee = controller(callee_signal, Arc::new(ScriptedDevices::new()));

    let _caller_loop = caller.spawn().await.unwrap();
    let _callee_loop = callee.spawn().await.unwrap();

    caller.start_call().await.unwrap();
    wait_for_state(&caller, CallState::InCall, Duration::from_secs(5)).await;

    assert!(!caller.toggle_video().await.unwrap());
    let status = caller.status().await;
    assert!(!status.video_enabled);
    assert!(!status.muted);
}

// ============================================================
// Hangup and preview renewal
// ============================================================

#[tokio::test]
async fn test_hangup_returns_to_no_call_with_a_fresh_preview() {
    init_logging();

    let (caller_signal, callee_signal) = loopback_pair();
    let devices = Arc::new(ScriptedDevices::new());
    let caller = controller(caller_signal, devices.clone());
    let callee = controller(callee_signal, Arc::new(ScriptedDevices::new()));

    let _caller_loop = caller.spawn().await.unwrap();
    let _callee_loop = callee.spawn().await.unwrap();

    caller.start_call().await.unwrap();
    wait_for_state(&caller, CallState::InCall, Duration::from_secs(5)).await;
    assert_eq!(devices.opens.load(Ordering::SeqCst), 1);

    caller.end_call().await.unwrap();

    assert_eq!(caller.call_state().await, CallState::NoCall);
    assert!(caller.session_id().await.is_none());
    assert!(caller.remote_tracks().await.is_empty());

    // Preview handle was released and re-acquired
    assert!(caller.media().is_acquired().await);
    assert_eq!(devices.opens.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_hangup_survives_preview_renewal_failure() {
    init_logging();

    let (caller_signal, callee_signal) = loopback_pair();
    let devices = Arc::new(ScriptedDevices::new());
    let caller = controller(caller_signal, devices.clone());
    let callee = controller(callee_signal, Arc::new(ScriptedDevices::new()));

    let _caller_loop = caller.spawn().await.unwrap();
    let _callee_loop = callee.spawn().await.unwrap();

    caller.start_call().await.unwrap();
    wait_for_state(&caller, CallState::InCall, Duration::from_secs(5)).await;

    // Device disappears before hangup; teardown must still complete
    devices.deny.store(true, Ordering::SeqCst);
    caller.end_call().await.unwrap();

    assert_eq!(caller.call_state().await, CallState::NoCall);
    assert!(!caller.media().is_acquired().await);
    assert!(caller.last_error().await.is_some());
}

#[tokio::test]
async fn test_hangup_from_no_call_is_harmless() {
    init_logging();

    let (caller_signal, _callee_signal) = loopback_pair();
    let caller = controller(caller_signal, Arc::new(ScriptedDevices::new()));

    caller.end_call().await.unwrap();
    assert_eq!(caller.call_state().await, CallState::NoCall);
    // Hangup leaves a live preview even when no call ever existed
    assert!(caller.media().is_acquired().await);
}

// ============================================================
// Remote-initiated call
// ============================================================

#[tokio::test]
async fn test_remote_start_call_request_places_the_call() {
    init_logging();

    let (caller_signal, callee_signal) = loopback_pair();
    let caller = controller(caller_signal, Arc::new(ScriptedDevices::new()));
    let callee = controller(callee_signal, Arc::new(ScriptedDevices::new()));

    let _caller_loop = caller.spawn().await.unwrap();
    let _callee_loop = callee.spawn().await.unwrap();

    // The callee side asks the other party to place the call
    callee
        .handle_signal(SignalMessage::StartCall)
        .await;

    wait_for_state(&callee, CallState::InCall, Duration::from_secs(5)).await;
    wait_for_state(&caller, CallState::InCall, Duration::from_secs(5)).await;
    assert_eq!(callee.status().await.role, Some(CallRole::Caller));
    assert_eq!(caller.status().await.role, Some(CallRole::Callee));
}
