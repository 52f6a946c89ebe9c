use flume::RecvTimeoutError;
use log::debug;
use num_complex::Complex32;
use sdrscope_messages::{Decibels, DeviceConfig, Hertz};
use std::f64::consts::TAU;
use std::thread;
use std::time::{Duration, Instant};

use super::{CancelHandle, ReadEnd, SampleBatch, SampleSource};
use crate::config::batch_period;
use crate::error::DeviceError;

/// R820T tuner gain table, tenths of a dB.
const R820T_GAINS: [i32; 29] = [
    0, 9, 14, 27, 37, 77, 87, 125, 144, 157, 166, 197, 207, 229, 254, 280, 297, 328, 338, 364,
    372, 386, 402, 421, 434, 439, 445, 480, 496,
];

const MIN_SAMPLE_RATE: u64 = 225_001;
const MAX_SAMPLE_RATE: u64 = 3_200_000;
const MIN_FREQUENCY: u64 = 24_000_000;
const MAX_FREQUENCY: u64 = 1_766_000_000;

/// Batches buffered between the producer thread and the delivery callback.
const QUEUE_DEPTH: usize = 2;

/// Slack on top of one batch period before a read counts as stalled.
const STALL_MARGIN: Duration = Duration::from_millis(500);

/// Simulated rtl-sdr style receiver producing a single complex tone.
///
/// The tone sits at a fixed offset from the center frequency, so retuning
/// does not move it on screen; gain scales its amplitude relative to the top
/// gain step. Asynchronous reads run a producer thread and deliver batches on
/// the caller's thread, mirroring a driver's callback mode.
pub struct ToneSource {
    config: DeviceConfig,
    generator: ToneGenerator,
    throttle: bool,
    read_timeout: Duration,
}

impl ToneSource {
    /// Open the simulated device, validating the initial tuning.
    pub fn open(config: DeviceConfig) -> Result<Self, DeviceError> {
        let mut source = Self {
            config,
            generator: ToneGenerator::new(0.0, 1e-3),
            throttle: true,
            read_timeout: Duration::from_secs(2),
        };
        check_sample_rate(config.sample_rate)?;
        check_frequency(config.center_frequency)?;
        source.set_gain(config.gain)?;
        Ok(source)
    }

    /// Offset of the tone from the center frequency, in Hz (may be negative).
    pub fn with_tone_offset(mut self, offset_hz: f64) -> Self {
        self.generator.offset_hz = offset_hz;
        self
    }

    /// Standard deviation of the additive noise, relative to a full-scale tone.
    pub fn with_noise(mut self, level: f32) -> Self {
        self.generator.noise = level;
        self
    }

    /// Pace batch delivery to the sample rate. On by default.
    pub fn with_throttle(mut self, throttle: bool) -> Self {
        self.throttle = throttle;
        self
    }

    fn amplitude(&self) -> f32 {
        let max = Decibels::from_tenths(R820T_GAINS[R820T_GAINS.len() - 1]);
        10.0_f32.powf((self.config.gain.0 - max.0) / 20.0)
    }

    fn batch_period(&self, count: usize) -> Duration {
        batch_period(count, self.config.sample_rate)
    }

    /// A batch cannot arrive faster than its own period, so the stall
    /// timeout never drops below that plus some slack.
    fn stall_timeout(&self, count: usize) -> Duration {
        self.read_timeout.max(self.batch_period(count) + STALL_MARGIN)
    }
}

impl SampleSource for ToneSource {
    fn config(&self) -> DeviceConfig {
        self.config
    }

    fn available_gains(&self) -> Vec<i32> {
        R820T_GAINS.to_vec()
    }

    fn set_sample_rate(&mut self, rate: Hertz) -> Result<(), DeviceError> {
        check_sample_rate(rate)?;
        self.config.sample_rate = rate;
        Ok(())
    }

    fn set_center_frequency(&mut self, freq: Hertz) -> Result<(), DeviceError> {
        check_frequency(freq)?;
        self.config.center_frequency = freq;
        Ok(())
    }

    /// Snaps to the nearest gain step, as the rtl-sdr driver does.
    fn set_gain(&mut self, gain: Decibels) -> Result<(), DeviceError> {
        let tenths = gain.to_tenths();
        let (min, max) = (R820T_GAINS[0], R820T_GAINS[R820T_GAINS.len() - 1]);
        if !gain.0.is_finite() || tenths < min || tenths > max {
            return Err(DeviceError::invalid_parameter(format!(
                "gain {gain} outside {}..{}",
                Decibels::from_tenths(min),
                Decibels::from_tenths(max)
            )));
        }
        let nearest = R820T_GAINS
            .iter()
            .copied()
            .min_by_key(|step| (step - tenths).abs())
            .unwrap_or(max);
        self.config.gain = Decibels::from_tenths(nearest);
        Ok(())
    }

    fn read_batch(&mut self, count: usize) -> Result<Option<SampleBatch>, DeviceError> {
        let started = Instant::now();
        let amplitude = self.amplitude();
        let batch = self
            .generator
            .generate(count, self.config.sample_rate, amplitude);
        if self.throttle {
            if let Some(remaining) = self.batch_period(count).checked_sub(started.elapsed()) {
                thread::sleep(remaining);
            }
        }
        Ok(Some(batch))
    }

    fn read_async(
        &mut self,
        count: usize,
        on_batch: &mut dyn FnMut(SampleBatch, &CancelHandle),
    ) -> Result<ReadEnd, DeviceError> {
        let (tx, rx) = flume::bounded(QUEUE_DEPTH);
        let cancel = CancelHandle::new();
        let producer_cancel = cancel.clone();
        let mut generator = self.generator.clone();
        let sample_rate = self.config.sample_rate;
        let amplitude = self.amplitude();
        let period = self.throttle.then(|| self.batch_period(count));
        let stall_timeout = self.stall_timeout(count);

        let producer = thread::Builder::new()
            .name("tone-source".to_string())
            .spawn(move || {
                while !producer_cancel.is_cancelled() {
                    let started = Instant::now();
                    let batch = generator.generate(count, sample_rate, amplitude);
                    if let Some(remaining) = period.and_then(|p| p.checked_sub(started.elapsed())) {
                        thread::sleep(remaining);
                    }
                    if tx.send(batch).is_err() {
                        break;
                    }
                }
                generator
            })
            .map_err(|e| DeviceError::io(format!("failed to start sample producer: {e}")))?;

        let result = loop {
            if cancel.is_cancelled() {
                break Ok(ReadEnd::Cancelled);
            }
            match rx.recv_timeout(stall_timeout) {
                Ok(batch) => on_batch(batch, &cancel),
                Err(RecvTimeoutError::Timeout) => {
                    break Err(DeviceError::io(format!(
                        "no samples within {stall_timeout:?}"
                    )));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    break Err(DeviceError::io("sample producer exited"));
                }
            }
        };

        // Dropping the receiver unblocks a producer waiting on a full queue;
        // anything still queued is discarded.
        cancel.cancel();
        drop(rx);
        match producer.join() {
            Ok(generator) => self.generator = generator,
            Err(_) => return Err(DeviceError::io("sample producer panicked")),
        }
        debug!("tone source read finished: {:?}", result);
        result
    }

    fn set_read_timeout(&mut self, timeout: Duration) {
        self.read_timeout = timeout;
    }

    fn close(&mut self) {
        debug!("tone source closed");
    }
}

fn check_sample_rate(rate: Hertz) -> Result<(), DeviceError> {
    if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&rate.as_hz()) {
        return Err(DeviceError::invalid_parameter(format!(
            "sample rate {rate} outside {MIN_SAMPLE_RATE}..={MAX_SAMPLE_RATE} Hz"
        )));
    }
    Ok(())
}

fn check_frequency(freq: Hertz) -> Result<(), DeviceError> {
    if !(MIN_FREQUENCY..=MAX_FREQUENCY).contains(&freq.as_hz()) {
        return Err(DeviceError::invalid_parameter(format!(
            "center frequency {freq} outside {MIN_FREQUENCY}..={MAX_FREQUENCY} Hz"
        )));
    }
    Ok(())
}

/// Phase-continuous tone plus deterministic noise.
#[derive(Debug, Clone)]
struct ToneGenerator {
    offset_hz: f64,
    noise: f32,
    phase: f64,
    rng: u64,
}

impl ToneGenerator {
    fn new(offset_hz: f64, noise: f32) -> Self {
        Self {
            offset_hz,
            noise,
            phase: 0.0,
            rng: 0x2545_f491_4f6c_dd1d,
        }
    }

    fn generate(&mut self, count: usize, sample_rate: Hertz, amplitude: f32) -> SampleBatch {
        let step = TAU * self.offset_hz / sample_rate.as_f64();
        let samples = (0..count)
            .map(|_| {
                let (sin, cos) = self.phase.sin_cos();
                self.phase = (self.phase + step) % TAU;
                let noise = Complex32::new(self.next_noise(), self.next_noise());
                Complex32::new(cos as f32, sin as f32) * amplitude + noise * self.noise
            })
            .collect::<Vec<_>>();
        SampleBatch::from(samples)
    }

    /// Uniform in [-1, 1), xorshift64.
    fn next_noise(&mut self) -> f32 {
        self.rng ^= self.rng << 13;
        self.rng ^= self.rng >> 7;
        self.rng ^= self.rng << 17;
        (self.rng >> 40) as f32 / (1u64 << 23) as f32 - 1.0
    }
}
