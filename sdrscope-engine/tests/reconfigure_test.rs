mod common;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::{DeviceLog, ScriptedSource, small_config, spawn_loop, stop_loop, wait_until};
use sdrscope_engine::{DeviceErrorKind, EngineConfig, ReconfigError, Reconfigurator, SharedState};
use sdrscope_messages::{
    ConfigCommand, Decibels, DeviceConfig, Hertz, LoopState, ParseCommandError, ReconfigStatus,
};

fn reconfigurator(shared: &Arc<SharedState>, deadline: Duration) -> Reconfigurator {
    Reconfigurator::new(Arc::clone(shared), deadline)
}

#[test]
fn test_device_config_only_changes_while_paused() {
    let device_log = Arc::new(DeviceLog::default());
    let (shared, handle) = spawn_loop(ScriptedSource::new(Arc::clone(&device_log)), small_config());
    let requester = reconfigurator(&shared, Duration::from_secs(2));

    let changes = [
        ("gain", "30"),
        ("center_frequency", "99.5e6"),
        ("sample_rate", "1024000"),
        ("freq", "433920000"),
    ];
    for (param, value) in changes {
        assert!(wait_until(Duration::from_secs(5), || !shared.has_pending_command()
            && shared.loop_state() == LoopState::Running));
        requester.request_change(param, value).unwrap();
    }
    assert!(wait_until(Duration::from_secs(5), || {
        shared.reconfig_status()
            == ReconfigStatus::Applied(ConfigCommand::CenterFrequency(Hertz(433_920_000)))
    }));

    let calls = device_log.configures.lock().clone();
    assert_eq!(calls.len(), 4);
    for call in &calls {
        assert!(call.pause_requested, "configure ran with the pause flag clear");
        assert_eq!(call.loop_state, LoopState::Reconfiguring);
    }

    let config = shared.device_config();
    assert_eq!(config.gain, Decibels(30.0));
    assert_eq!(config.sample_rate, Hertz(1_024_000));
    assert_eq!(config.center_frequency, Hertz(433_920_000));

    stop_loop(&shared, handle);
}

#[test]
fn test_no_batches_delivered_during_settle_delay() {
    let device_log = Arc::new(DeviceLog::default());
    let config = EngineConfig {
        settle_delay: Duration::from_millis(300),
        ..small_config()
    };
    let (shared, handle) = spawn_loop(ScriptedSource::new(Arc::clone(&device_log)), config);
    assert!(wait_until(Duration::from_secs(5), || shared.cycles() >= 2));

    reconfigurator(&shared, Duration::from_secs(2))
        .request(ConfigCommand::Gain(Decibels(20.0)))
        .unwrap();
    assert!(wait_until(Duration::from_secs(5), || {
        shared.reconfig_status() == ReconfigStatus::Applied(ConfigCommand::Gain(Decibels(20.0)))
    }));
    assert!(wait_until(Duration::from_secs(5), || shared.loop_state() == LoopState::Running));
    stop_loop(&shared, handle);

    let configured_at = device_log.configures.lock()[0].at;
    let first_read_after = device_log
        .read_starts
        .lock()
        .iter()
        .copied()
        .find(|&t| t > configured_at)
        .expect("acquisition resumed");
    assert!(first_read_after.duration_since(configured_at) >= Duration::from_millis(300));
}

#[test]
fn test_request_times_out_when_loop_does_not_pause() {
    let device_log = Arc::new(DeviceLog::default());
    let source = ScriptedSource::new(Arc::clone(&device_log)).with_batch_delay(Duration::from_millis(600));
    let (shared, handle) = spawn_loop(source, small_config());

    // Land the request in the middle of a slow batch.
    assert!(wait_until(Duration::from_secs(5), || shared.cycles() >= 1));
    thread::sleep(Duration::from_millis(100));

    let deadline = Duration::from_millis(200);
    let result = reconfigurator(&shared, deadline).request_change("gain", "30");

    assert_eq!(result, Err(ReconfigError::Timeout(deadline)));
    assert!(!shared.is_pause_requested(), "pause request withdrawn");
    assert!(!shared.has_pending_command());

    // The slow batch completes and acquisition simply carries on.
    let cycles = shared.cycles();
    assert!(wait_until(Duration::from_secs(5), || shared.cycles() > cycles));
    assert_eq!(shared.loop_state(), LoopState::Running);
    assert!(device_log.configures.lock().is_empty());

    stop_loop(&shared, handle);
}

#[test]
fn test_second_request_while_pending_is_busy() {
    let device_log = Arc::new(DeviceLog::default());
    let config = EngineConfig {
        settle_delay: Duration::from_millis(500),
        ..small_config()
    };
    let (shared, handle) = spawn_loop(ScriptedSource::new(Arc::clone(&device_log)), config);
    let requester = reconfigurator(&shared, Duration::from_secs(2));
    assert!(wait_until(Duration::from_secs(5), || shared.cycles() >= 1));

    requester.request_change("gain", "20").unwrap();
    assert_eq!(
        requester.request_change("center_frequency", "98000000"),
        Err(ReconfigError::Busy)
    );

    assert!(wait_until(Duration::from_secs(5), || shared.loop_state() == LoopState::Running));
    assert_eq!(device_log.configures.lock().len(), 1);
    assert_eq!(shared.device_config().center_frequency, Hertz(101_100_000));

    stop_loop(&shared, handle);
}

#[test]
fn test_rejected_change_leaves_loop_paused_until_next_command() {
    let device_log = Arc::new(DeviceLog::default());
    let source = ScriptedSource::new(Arc::clone(&device_log)).with_max_gain(40.0);
    let (shared, handle) = spawn_loop(source, small_config());
    let requester = reconfigurator(&shared, Duration::from_secs(2));
    assert!(wait_until(Duration::from_secs(5), || shared.cycles() >= 1));

    // Accepted by the handshake, rejected by the device.
    requester.request_change("gain", "45").unwrap();
    assert!(wait_until(Duration::from_secs(5), || {
        matches!(shared.reconfig_status(), ReconfigStatus::Failed(_))
            && !shared.has_pending_command()
            && shared.loop_state() == LoopState::Paused
    }));
    assert!(shared.is_pause_requested());
    assert_eq!(
        shared.last_device_error().map(|e| e.kind),
        Some(DeviceErrorKind::InvalidParameter)
    );

    // Nothing is retried while paused.
    let cycles = shared.cycles();
    thread::sleep(Duration::from_millis(150));
    assert_eq!(shared.cycles(), cycles);
    assert_eq!(device_log.configures.lock().len(), 1);

    // A fresh command goes straight through since the loop is already paused.
    requester.request_change("gain", "35").unwrap();
    assert!(wait_until(Duration::from_secs(5), || shared.loop_state() == LoopState::Running));
    assert_eq!(shared.device_config().gain, Decibels(35.0));

    stop_loop(&shared, handle);
}

#[test]
fn test_resume_after_rejected_change() {
    let device_log = Arc::new(DeviceLog::default());
    let source = ScriptedSource::new(Arc::clone(&device_log)).with_max_gain(40.0);
    let (shared, handle) = spawn_loop(source, small_config());
    let requester = reconfigurator(&shared, Duration::from_secs(2));
    assert!(wait_until(Duration::from_secs(5), || shared.cycles() >= 1));

    requester.request(ConfigCommand::Gain(Decibels(48.0))).unwrap();
    assert!(wait_until(Duration::from_secs(5), || {
        matches!(shared.reconfig_status(), ReconfigStatus::Failed(_))
            && !shared.has_pending_command()
            && shared.loop_state() == LoopState::Paused
    }));

    assert!(requester.resume());
    assert_eq!(shared.loop_state(), LoopState::Running, "no stale pause acknowledgment");
    let cycles = shared.cycles();
    assert!(wait_until(Duration::from_secs(5), || shared.cycles() > cycles));
    assert_eq!(shared.loop_state(), LoopState::Running);

    stop_loop(&shared, handle);
}

#[test]
fn test_invalid_request_never_pauses() {
    let device_log = Arc::new(DeviceLog::default());
    let (shared, handle) = spawn_loop(ScriptedSource::new(Arc::clone(&device_log)), small_config());
    let requester = reconfigurator(&shared, Duration::from_secs(2));

    let result = requester.request_change("antenna", "RX2");
    assert_eq!(
        result,
        Err(ReconfigError::InvalidCommand(ParseCommandError::UnknownParameter(
            "antenna".to_string()
        )))
    );
    assert!(!shared.is_pause_requested());

    stop_loop(&shared, handle);
}

#[test]
fn test_request_without_a_running_loop_times_out() {
    // Nothing is reading, so nothing can acknowledge the pause.
    let shared = Arc::new(SharedState::new(&small_config(), DeviceConfig::default()));
    let deadline = Duration::from_millis(100);

    let result = reconfigurator(&shared, deadline).request_change("gain", "10");

    assert_eq!(result, Err(ReconfigError::Timeout(deadline)));
    assert!(!shared.is_pause_requested());
    assert!(!shared.has_pending_command());
}

#[test]
fn test_request_after_stop_fails() {
    let device_log = Arc::new(DeviceLog::default());
    let (shared, handle) = spawn_loop(ScriptedSource::new(Arc::clone(&device_log)), small_config());
    stop_loop(&shared, handle);

    let result = reconfigurator(&shared, Duration::from_millis(100)).request_change("gain", "10");
    assert_eq!(result, Err(ReconfigError::Stopped));
}
