//! Engine tuning knobs that are fixed for the lifetime of a run.

use std::time::Duration;

use sdrscope_messages::Hertz;

use crate::error::ConfigError;

/// Sizes and timings of the acquisition pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Samples pulled from the device per acquisition cycle.
    pub batch_size: usize,
    /// Transform size: width of the spectrum and of each waterfall row.
    pub fft_size: usize,
    /// Number of rows kept in the waterfall.
    pub history_depth: usize,
    /// Number of leading samples of each batch kept for the time sink.
    pub excerpt_length: usize,
    /// Time the device needs after a retune before its output is trusted.
    pub settle_delay: Duration,
    /// How long a reconfiguration request waits for the loop to pause.
    pub pause_deadline: Duration,
    /// A device read that delivers nothing for this long is a failure.
    pub read_timeout: Duration,
    /// Utilization at or above this level is reported.
    pub overrun_threshold: f32,
    /// Consecutive batches above the threshold before reporting.
    pub sustained_overrun_cycles: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: 256 * 1024,
            fft_size: 512,
            history_depth: 100,
            excerpt_length: 500,
            settle_delay: Duration::from_millis(500),
            pause_deadline: Duration::from_secs(2),
            read_timeout: Duration::from_secs(2),
            overrun_threshold: 0.9,
            sustained_overrun_cycles: 3,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sizes = [
            ("batch_size", self.batch_size),
            ("fft_size", self.fft_size),
            ("history_depth", self.history_depth),
            ("excerpt_length", self.excerpt_length),
            ("sustained_overrun_cycles", self.sustained_overrun_cycles),
        ];
        if let Some((name, _)) = sizes.iter().find(|(_, size)| *size == 0) {
            return Err(ConfigError::ZeroSize(name));
        }
        if self.excerpt_length > self.batch_size {
            return Err(ConfigError::ExcerptTooLong {
                excerpt: self.excerpt_length,
                batch: self.batch_size,
            });
        }
        Ok(())
    }

    /// [`validate`](Self::validate), plus checks that depend on the rate the
    /// device starts at. A pause can only be acknowledged between batches, so
    /// the pause deadline must cover at least one of them.
    pub fn validate_for_rate(&self, sample_rate: Hertz) -> Result<(), ConfigError> {
        self.validate()?;
        let batch_period = self.batch_period(sample_rate);
        if self.pause_deadline < batch_period {
            return Err(ConfigError::PauseDeadlineTooShort {
                deadline: self.pause_deadline,
                batch_period,
            });
        }
        Ok(())
    }

    /// Time the device needs to deliver one batch at `sample_rate`.
    pub fn batch_period(&self, sample_rate: Hertz) -> Duration {
        batch_period(self.batch_size, sample_rate)
    }
}

/// Time needed to deliver `count` samples at `sample_rate`.
pub fn batch_period(count: usize, sample_rate: Hertz) -> Duration {
    if sample_rate.as_hz() == 0 {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(count as f64 / sample_rate.as_f64())
}
