//! Sample sources: the device boundary of the engine.

mod file;
mod tone;

pub use file::FileIqSource;
pub use tone::ToneSource;

use num_complex::Complex32;
use sdrscope_messages::{Decibels, DeviceConfig, Hertz};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::error::DeviceError;

/// One chunk of complex samples delivered by the device.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBatch {
    samples: Vec<Complex32>,
}

impl SampleBatch {
    pub fn samples(&self) -> &[Complex32] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl From<Vec<Complex32>> for SampleBatch {
    fn from(samples: Vec<Complex32>) -> Self {
        Self { samples }
    }
}

/// Cancels the read that handed it out.
///
/// A handle only exists for the duration of a [`SampleSource::read_async`]
/// call and is only given to the batch callback, so a read can only be
/// cancelled from its own delivery context. Cancelling twice, or after the
/// read has returned, does nothing.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Why [`SampleSource::read_async`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadEnd {
    /// The callback cancelled the read. Pending batches were discarded.
    Cancelled,
    /// The source has no more samples (e.g. end of a recording).
    Exhausted,
}

/// Abstraction for IQ sample sources (hardware SDR, files, simulated devices).
///
/// Setters must only be called while no read is outstanding.
pub trait SampleSource: Send {
    /// Current tuning as the device reports it.
    fn config(&self) -> DeviceConfig;

    /// Supported gain steps in tenths of a dB.
    fn available_gains(&self) -> Vec<i32>;

    fn set_sample_rate(&mut self, rate: Hertz) -> Result<(), DeviceError>;

    fn set_center_frequency(&mut self, freq: Hertz) -> Result<(), DeviceError>;

    fn set_gain(&mut self, gain: Decibels) -> Result<(), DeviceError>;

    /// Blocking read of `count` samples. `Ok(None)` means end of stream.
    fn read_batch(&mut self, count: usize) -> Result<Option<SampleBatch>, DeviceError>;

    /// Stream batches of `count` samples into `on_batch` until the callback
    /// cancels through the handle it is given, the stream ends, or the device
    /// fails.
    ///
    /// The default implementation is built on [`read_batch`](Self::read_batch)
    /// and can only notice a cancel between batches, so a pause takes effect
    /// within one batch duration.
    fn read_async(
        &mut self,
        count: usize,
        on_batch: &mut dyn FnMut(SampleBatch, &CancelHandle),
    ) -> Result<ReadEnd, DeviceError> {
        let cancel = CancelHandle::new();
        while !cancel.is_cancelled() {
            match self.read_batch(count)? {
                Some(batch) => on_batch(batch, &cancel),
                None => return Ok(ReadEnd::Exhausted),
            }
        }
        Ok(ReadEnd::Cancelled)
    }

    /// Apply every field of `config` that differs from the current tuning.
    fn configure(&mut self, config: &DeviceConfig) -> Result<(), DeviceError> {
        let current = self.config();
        if config.sample_rate != current.sample_rate {
            self.set_sample_rate(config.sample_rate)?;
        }
        if config.center_frequency != current.center_frequency {
            self.set_center_frequency(config.center_frequency)?;
        }
        if config.gain != current.gain {
            self.set_gain(config.gain)?;
        }
        Ok(())
    }

    /// Longest a read may go without delivering a batch before the device is
    /// considered stalled. Sources that cannot stall ignore it.
    fn set_read_timeout(&mut self, _timeout: Duration) {}

    /// Release the device.
    fn close(&mut self) {}
}
