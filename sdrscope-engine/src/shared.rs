//! State shared between the acquisition loop, the display and reconfiguration
//! requesters.
//!
//! Each display field is replaced wholesale behind its own lock, so a reader
//! never sees half of one update. Fields are independent: a [`Snapshot`] may
//! combine values from neighbouring cycles.

use log::debug;
use parking_lot::{Condvar, Mutex, RwLock};
use sdrscope_messages::{ConfigCommand, Decibels, DeviceConfig, LoopState, ReconfigStatus};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::config::EngineConfig;
use crate::error::{DeviceError, ReconfigError};
use crate::processor::{Frame, TimeExcerpt};
use crate::waterfall::WaterfallHistory;

/// Waterfall fill before the first spectrum arrives.
pub const WATERFALL_FLOOR_DB: f32 = -100.0;

#[derive(Debug, Clone, Copy, PartialEq)]
enum CommandSlot {
    Empty,
    Pending(ConfigCommand),
    /// Taken by the acquisition loop and being applied.
    Applying(ConfigCommand),
}

/// Pause handshake fields. Guarded together so the pause flag and the
/// command slot always change consistently.
#[derive(Debug)]
struct Control {
    pause_requested: bool,
    command: CommandSlot,
    state: LoopState,
    shutdown: bool,
}

pub struct SharedState {
    spectrum: RwLock<Arc<[f32]>>,
    waterfall: RwLock<Arc<WaterfallHistory>>,
    excerpt: RwLock<Arc<TimeExcerpt>>,
    /// f32 bit pattern
    utilization: AtomicU32,
    cycles: AtomicU64,
    overruns: AtomicU64,
    device_config: RwLock<DeviceConfig>,
    available_gains: RwLock<Vec<Decibels>>,
    reconfig_status: Mutex<ReconfigStatus>,
    last_device_error: Mutex<Option<DeviceError>>,
    control: Mutex<Control>,
    control_changed: Condvar,
}

/// One read of every display field.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub spectrum: Arc<[f32]>,
    pub waterfall: Arc<WaterfallHistory>,
    pub excerpt: Arc<TimeExcerpt>,
    pub utilization: f32,
    pub device_config: DeviceConfig,
    pub loop_state: LoopState,
    pub reconfig_status: ReconfigStatus,
    pub cycles: u64,
    pub overruns: u64,
}

impl SharedState {
    pub fn new(config: &EngineConfig, device_config: DeviceConfig) -> Self {
        let spectrum: Arc<[f32]> = vec![0.0; config.fft_size].into();
        Self {
            spectrum: RwLock::new(spectrum),
            waterfall: RwLock::new(Arc::new(WaterfallHistory::new(
                config.history_depth,
                config.fft_size,
                WATERFALL_FLOOR_DB,
            ))),
            excerpt: RwLock::new(Arc::new(TimeExcerpt::zeros(config.excerpt_length))),
            utilization: AtomicU32::new(0.0_f32.to_bits()),
            cycles: AtomicU64::new(0),
            overruns: AtomicU64::new(0),
            device_config: RwLock::new(device_config),
            available_gains: RwLock::new(Vec::new()),
            reconfig_status: Mutex::new(ReconfigStatus::Idle),
            last_device_error: Mutex::new(None),
            control: Mutex::new(Control {
                pause_requested: false,
                command: CommandSlot::Empty,
                state: LoopState::Running,
                shutdown: false,
            }),
            control_changed: Condvar::new(),
        }
    }

    // Display fields, written by the acquisition loop.

    /// Publish one cycle's results. `waterfall` already contains the frame's
    /// spectrum as its newest row.
    ///
    /// The history is cloned whole (`depth x width`) so readers holding the
    /// previous `Arc` are never disturbed.
    pub fn publish_frame(&self, frame: Frame, waterfall: &WaterfallHistory) {
        *self.spectrum.write() = frame.spectrum.into();
        *self.waterfall.write() = Arc::new(waterfall.clone());
        *self.excerpt.write() = Arc::new(frame.excerpt);
        self.cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub fn publish_utilization(&self, utilization: f32) {
        self.utilization
            .store(utilization.max(0.0).to_bits(), Ordering::Relaxed);
    }

    pub fn record_overrun(&self) {
        self.overruns.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_device_config(&self, config: DeviceConfig) {
        *self.device_config.write() = config;
    }

    pub fn set_available_gains(&self, gains: Vec<Decibels>) {
        *self.available_gains.write() = gains;
    }

    pub fn record_device_error(&self, error: DeviceError) {
        *self.last_device_error.lock() = Some(error);
    }

    pub fn set_reconfig_status(&self, status: ReconfigStatus) {
        *self.reconfig_status.lock() = status;
    }

    // Display fields, read by the consumer.

    pub fn spectrum(&self) -> Arc<[f32]> {
        self.spectrum.read().clone()
    }

    pub fn waterfall(&self) -> Arc<WaterfallHistory> {
        self.waterfall.read().clone()
    }

    pub fn excerpt(&self) -> Arc<TimeExcerpt> {
        self.excerpt.read().clone()
    }

    pub fn utilization(&self) -> f32 {
        f32::from_bits(self.utilization.load(Ordering::Relaxed))
    }

    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    pub fn overruns(&self) -> u64 {
        self.overruns.load(Ordering::Relaxed)
    }

    pub fn device_config(&self) -> DeviceConfig {
        *self.device_config.read()
    }

    pub fn available_gains(&self) -> Vec<Decibels> {
        self.available_gains.read().clone()
    }

    pub fn reconfig_status(&self) -> ReconfigStatus {
        self.reconfig_status.lock().clone()
    }

    pub fn last_device_error(&self) -> Option<DeviceError> {
        self.last_device_error.lock().clone()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            spectrum: self.spectrum(),
            waterfall: self.waterfall(),
            excerpt: self.excerpt(),
            utilization: self.utilization(),
            device_config: self.device_config(),
            loop_state: self.loop_state(),
            reconfig_status: self.reconfig_status(),
            cycles: self.cycles(),
            overruns: self.overruns(),
        }
    }

    // Pause handshake.

    pub fn request_pause(&self) {
        let mut control = self.control.lock();
        if !control.pause_requested {
            control.pause_requested = true;
            self.control_changed.notify_all();
        }
    }

    /// Clear the pause flag. No-op if it is already clear.
    pub fn clear_pause(&self) {
        let mut control = self.control.lock();
        if control.pause_requested {
            control.pause_requested = false;
            self.control_changed.notify_all();
        }
    }

    pub fn is_pause_requested(&self) -> bool {
        self.control.lock().pause_requested
    }

    /// Clear the pause flag unless a command is queued or being applied.
    /// Returns whether the flag is now clear.
    pub fn abandon_pause(&self) -> bool {
        let mut control = self.control.lock();
        if control.command != CommandSlot::Empty {
            return false;
        }
        if control.pause_requested {
            control.pause_requested = false;
            Self::resume_locked(&mut control);
            self.control_changed.notify_all();
        }
        true
    }

    /// With the pause flag cleared a paused loop is about to read again;
    /// publish that now so `Paused` is never reported for a loop that has
    /// been told to go.
    fn resume_locked(control: &mut Control) {
        if matches!(control.state, LoopState::Paused | LoopState::Reconfiguring) {
            debug!("acquisition {} -> {}", control.state, LoopState::Running);
            control.state = LoopState::Running;
        }
    }

    /// Queue a command for the acquisition loop and mark it submitted. Fails
    /// with `Busy` while an earlier command is queued or still being applied.
    pub fn submit_command(&self, command: ConfigCommand) -> Result<(), ReconfigError> {
        let mut control = self.control.lock();
        if control.shutdown {
            return Err(ReconfigError::Stopped);
        }
        if control.command != CommandSlot::Empty {
            return Err(ReconfigError::Busy);
        }
        control.command = CommandSlot::Pending(command);
        *self.reconfig_status.lock() = ReconfigStatus::Submitted(command);
        self.control_changed.notify_all();
        Ok(())
    }

    pub fn has_pending_command(&self) -> bool {
        self.control.lock().command != CommandSlot::Empty
    }

    /// Take the queued command. The slot stays occupied until
    /// [`complete_command`](Self::complete_command).
    pub fn take_command(&self) -> Option<ConfigCommand> {
        let mut control = self.control.lock();
        match control.command {
            CommandSlot::Pending(command) => {
                control.command = CommandSlot::Applying(command);
                Some(command)
            }
            CommandSlot::Empty | CommandSlot::Applying(_) => None,
        }
    }

    /// Free the command slot and, if `resume`, clear the pause flag in the
    /// same step.
    pub fn complete_command(&self, resume: bool) {
        let mut control = self.control.lock();
        control.command = CommandSlot::Empty;
        if resume {
            control.pause_requested = false;
            Self::resume_locked(&mut control);
        }
        self.control_changed.notify_all();
    }

    pub fn loop_state(&self) -> LoopState {
        self.control.lock().state
    }

    pub fn set_loop_state(&self, state: LoopState) {
        let mut control = self.control.lock();
        if control.state != state {
            debug!("acquisition {} -> {}", control.state, state);
            control.state = state;
            self.control_changed.notify_all();
        }
    }

    /// Block until the loop reports `target`, shuts down, or `timeout` passes.
    pub fn wait_for_state(&self, target: LoopState, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut control = self.control.lock();
        loop {
            if control.state == target {
                return true;
            }
            if control.shutdown || control.state == LoopState::Stopped {
                return false;
            }
            if self
                .control_changed
                .wait_until(&mut control, deadline)
                .timed_out()
            {
                return control.state == target;
            }
        }
    }

    /// Used by a paused loop: wait until there is something to act on or
    /// `timeout` passes.
    pub fn wait_for_control(&self, timeout: Duration) {
        let mut control = self.control.lock();
        let idle = control.pause_requested
            && !control.shutdown
            && !matches!(control.command, CommandSlot::Pending(_));
        if idle {
            self.control_changed.wait_for(&mut control, timeout);
        }
    }

    pub fn request_shutdown(&self) {
        let mut control = self.control.lock();
        control.shutdown = true;
        self.control_changed.notify_all();
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.control.lock().shutdown
    }

    /// Sleep for `duration` unless shutdown is requested first. Returns
    /// `false` if interrupted by shutdown.
    pub fn sleep_unless_shutdown(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        let mut control = self.control.lock();
        while !control.shutdown {
            if self
                .control_changed
                .wait_until(&mut control, deadline)
                .timed_out()
            {
                return !control.shutdown;
            }
        }
        false
    }
}
