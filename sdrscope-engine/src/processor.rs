//! Per-batch DSP: power spectrum, waterfall update and time-domain excerpt.

use num_complex::Complex32;
use rustfft::{Fft, FftPlanner};
use sdrscope_messages::{Decibels, DeviceConfig, Hertz};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::source::SampleBatch;
use crate::waterfall::WaterfallHistory;

/// Power floor applied before the log so silent bins read -200 dB, not -inf.
const POWER_FLOOR: f32 = 1e-20;

/// The first samples of a batch, split into I and Q for the time sink.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeExcerpt {
    pub i: Vec<f32>,
    pub q: Vec<f32>,
}

impl TimeExcerpt {
    pub fn zeros(len: usize) -> Self {
        Self {
            i: vec![0.0; len],
            q: vec![0.0; len],
        }
    }

    pub fn from_samples(samples: &[Complex32]) -> Self {
        Self {
            i: samples.iter().map(|s| s.re).collect(),
            q: samples.iter().map(|s| s.im).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.i.len()
    }

    pub fn is_empty(&self) -> bool {
        self.i.is_empty()
    }
}

/// Everything derived from one batch.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Power spectral density in dB, DC in the middle.
    pub spectrum: Vec<f32>,
    pub excerpt: TimeExcerpt,
    /// Wall-clock time spent in [`SpectralProcessor::process`].
    pub processing_time: Duration,
    /// Number of samples in the batch the frame was computed from.
    pub batch_len: usize,
}

/// Turns sample batches into display data.
pub struct SpectralProcessor {
    fft: Arc<dyn Fft<f32>>,
    fft_size: usize,
    excerpt_length: usize,
    buffer: Vec<Complex32>,
    scratch: Vec<Complex32>,
}

impl SpectralProcessor {
    pub fn new(fft_size: usize, excerpt_length: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);
        let scratch_len = fft.get_inplace_scratch_len();
        Self {
            fft,
            fft_size,
            excerpt_length,
            buffer: vec![Complex32::new(0.0, 0.0); fft_size],
            scratch: vec![Complex32::new(0.0, 0.0); scratch_len],
        }
    }

    /// Compute the spectrum, fold it into `waterfall` as the newest row and
    /// cut the time excerpt.
    pub fn process(&mut self, batch: &SampleBatch, waterfall: &mut WaterfallHistory) -> Frame {
        let started = Instant::now();

        let spectrum = self.spectrum(batch.samples());
        waterfall.push(&spectrum);

        let excerpt_len = self.excerpt_length.min(batch.len());
        let excerpt = TimeExcerpt::from_samples(&batch.samples()[..excerpt_len]);

        Frame {
            spectrum,
            excerpt,
            processing_time: started.elapsed(),
            batch_len: batch.len(),
        }
    }

    /// PSD of the first `fft_size` samples (zero padded if the input is
    /// shorter): `10 log10(|X/N|^2)`, shifted so DC sits at bin `N/2`.
    pub fn spectrum(&mut self, samples: &[Complex32]) -> Vec<f32> {
        let n = self.fft_size;
        let used = samples.len().min(n);
        self.buffer[..used].copy_from_slice(&samples[..used]);
        self.buffer[used..].fill(Complex32::new(0.0, 0.0));

        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

        let scale = 1.0 / n as f32;
        let mut spectrum: Vec<f32> = self
            .buffer
            .iter()
            .map(|x| Decibels::from_power((*x * scale).norm_sqr().max(POWER_FLOOR)).as_db())
            .collect();

        // FFT shift: [DC, positive, negative] -> [negative, DC, positive]
        spectrum.rotate_right(n / 2);
        spectrum
    }
}

/// Processing time over the time the device needs to deliver `batch_len`
/// samples at `sample_rate`. At or above 1.0 the pipeline cannot keep up.
pub fn utilization(elapsed: Duration, batch_len: usize, sample_rate: Hertz) -> f32 {
    if batch_len == 0 || sample_rate.as_hz() == 0 {
        return 0.0;
    }
    let nominal = batch_len as f64 / sample_rate.as_f64();
    (elapsed.as_secs_f64() / nominal) as f32
}

/// Frequency of each spectrum bin in MHz: `fft_size` evenly spaced points
/// from `center - rate/2` to `center + rate/2`, both ends included.
pub fn frequency_axis(config: &DeviceConfig, fft_size: usize) -> Vec<f64> {
    let half = config.sample_rate.as_f64() / 2.0;
    linspace(-half, half, fft_size)
        .map(|f| (f + config.center_frequency.as_f64()) / 1e6)
        .collect()
}

/// Time of each excerpt sample in milliseconds, from 0 to `len / rate`.
pub fn time_axis(sample_rate: Hertz, len: usize) -> Vec<f64> {
    let span = len as f64 / sample_rate.as_f64();
    linspace(0.0, span, len).map(|t| t * 1e3).collect()
}

fn linspace(start: f64, stop: f64, n: usize) -> impl Iterator<Item = f64> {
    let step = if n > 1 {
        (stop - start) / (n - 1) as f64
    } else {
        0.0
    };
    (0..n).map(move |i| start + step * i as f64)
}
