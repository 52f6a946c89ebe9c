#![allow(dead_code)]

use num_complex::Complex32;
use parking_lot::Mutex;
use sdrscope_engine::{
    AcquisitionLoop, DeviceError, EngineConfig, SampleBatch, SampleSource, SharedState,
};
use sdrscope_messages::{Decibels, DeviceConfig, Hertz, LoopState};
use std::f64::consts::TAU;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// What the scripted device saw at each `configure`.
#[derive(Debug, Clone)]
pub struct ConfigureCall {
    pub target: DeviceConfig,
    pub pause_requested: bool,
    pub loop_state: LoopState,
    pub at: Instant,
}

/// Observations shared between a test and its scripted device.
#[derive(Default)]
pub struct DeviceLog {
    pub configures: Mutex<Vec<ConfigureCall>>,
    pub read_starts: Mutex<Vec<Instant>>,
    pub reads: AtomicUsize,
    pub closed: AtomicBool,
    pub read_timeout: Mutex<Option<Duration>>,
}

/// Blocking-mode device with scriptable delays and failures.
pub struct ScriptedSource {
    config: DeviceConfig,
    device_log: Arc<DeviceLog>,
    observer: Option<Arc<SharedState>>,
    batch_delay: Duration,
    max_gain: f32,
    fail_after_reads: Option<usize>,
    tone_offset: f64,
    phase: f64,
}

impl ScriptedSource {
    pub fn new(device_log: Arc<DeviceLog>) -> Self {
        Self {
            config: DeviceConfig::default(),
            device_log,
            observer: None,
            batch_delay: Duration::from_millis(5),
            max_gain: 49.6,
            fail_after_reads: None,
            tone_offset: 200_000.0,
            phase: 0.0,
        }
    }

    pub fn observing(mut self, shared: Arc<SharedState>) -> Self {
        self.observer = Some(shared);
        self
    }

    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = delay;
        self
    }

    pub fn with_max_gain(mut self, max_gain: f32) -> Self {
        self.max_gain = max_gain;
        self
    }

    pub fn failing_after(mut self, reads: usize) -> Self {
        self.fail_after_reads = Some(reads);
        self
    }
}

impl SampleSource for ScriptedSource {
    fn config(&self) -> DeviceConfig {
        self.config
    }

    fn available_gains(&self) -> Vec<i32> {
        vec![0, 100, 200, 300, Decibels(self.max_gain).to_tenths()]
    }

    fn set_sample_rate(&mut self, rate: Hertz) -> Result<(), DeviceError> {
        self.config.sample_rate = rate;
        Ok(())
    }

    fn set_center_frequency(&mut self, freq: Hertz) -> Result<(), DeviceError> {
        self.config.center_frequency = freq;
        Ok(())
    }

    fn set_gain(&mut self, gain: Decibels) -> Result<(), DeviceError> {
        if gain.0 > self.max_gain {
            return Err(DeviceError::invalid_parameter(format!("gain {gain} too high")));
        }
        self.config.gain = gain;
        Ok(())
    }

    fn configure(&mut self, config: &DeviceConfig) -> Result<(), DeviceError> {
        let (pause_requested, loop_state) = match &self.observer {
            Some(shared) => (shared.is_pause_requested(), shared.loop_state()),
            None => (true, LoopState::Reconfiguring),
        };
        self.device_log.configures.lock().push(ConfigureCall {
            target: *config,
            pause_requested,
            loop_state,
            at: Instant::now(),
        });

        if config.sample_rate != self.config.sample_rate {
            self.set_sample_rate(config.sample_rate)?;
        }
        if config.center_frequency != self.config.center_frequency {
            self.set_center_frequency(config.center_frequency)?;
        }
        if config.gain != self.config.gain {
            self.set_gain(config.gain)?;
        }
        Ok(())
    }

    fn read_batch(&mut self, count: usize) -> Result<Option<SampleBatch>, DeviceError> {
        self.device_log.read_starts.lock().push(Instant::now());
        let reads = self.device_log.reads.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_after_reads.is_some_and(|limit| reads > limit) {
            return Err(DeviceError::io("USB transfer failed"));
        }
        thread::sleep(self.batch_delay);

        let step = TAU * self.tone_offset / self.config.sample_rate.as_f64();
        let samples = (0..count)
            .map(|_| {
                let (sin, cos) = self.phase.sin_cos();
                self.phase = (self.phase + step) % TAU;
                Complex32::new(cos as f32, sin as f32)
            })
            .collect::<Vec<_>>();
        Ok(Some(SampleBatch::from(samples)))
    }

    fn set_read_timeout(&mut self, timeout: Duration) {
        *self.device_log.read_timeout.lock() = Some(timeout);
    }

    fn close(&mut self) {
        self.device_log.closed.store(true, Ordering::SeqCst);
    }
}

pub fn small_config() -> EngineConfig {
    EngineConfig {
        batch_size: 2048,
        fft_size: 512,
        history_depth: 16,
        excerpt_length: 500,
        settle_delay: Duration::from_millis(20),
        pause_deadline: Duration::from_secs(2),
        read_timeout: Duration::from_secs(2),
        ..EngineConfig::default()
    }
}

/// Start an acquisition loop on its own thread, with the device observing
/// the same shared state.
pub fn spawn_loop(
    source: ScriptedSource,
    config: EngineConfig,
) -> (Arc<SharedState>, JoinHandle<sdrscope_engine::Result<()>>) {
    let shared = Arc::new(SharedState::new(&config, source.config()));
    let source = source.observing(Arc::clone(&shared));
    let acquisition = AcquisitionLoop::new(Box::new(source), Arc::clone(&shared), config);
    let handle = thread::spawn(move || acquisition.run());
    (shared, handle)
}

pub fn stop_loop(shared: &SharedState, handle: JoinHandle<sdrscope_engine::Result<()>>) {
    shared.request_shutdown();
    handle
        .join()
        .expect("acquisition thread panicked")
        .expect("acquisition should stop cleanly");
}

/// Poll `condition` every 5 ms until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}
