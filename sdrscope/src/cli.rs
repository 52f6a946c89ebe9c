use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use log::LevelFilter;

use sdrscope_engine::EngineConfig;
use sdrscope_messages::{Decibels, DeviceConfig, Hertz};

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    /// Simulated tuner producing a tone plus noise
    Tone,
    /// Interleaved f32 IQ recording
    File,
}

#[derive(Parser, Debug)]
#[clap(name = "sdrscope", about = "Live spectrum, waterfall and IQ view of an SDR stream")]
pub struct Cli {
    /// Where samples come from
    #[clap(long, value_enum, default_value = "tone")]
    pub source: SourceKind,

    /// File path to IQ recording for playback
    #[clap(long, required_if_eq("source", "file"))]
    pub file: Option<PathBuf>,

    /// Restart the recording at end of file instead of stopping
    #[clap(long, action)]
    pub loop_file: bool,

    /// Offset of the simulated tone from the center frequency in Hz
    #[clap(long, default_value = "200000", allow_hyphen_values = true)]
    pub tone_offset: f64,

    /// Sample rate in Hz
    #[clap(long, default_value = "2048000")]
    pub sample_rate: u64,

    /// Center frequency in Hz
    #[clap(long, default_value = "101100000")]
    pub center_frequency: u64,

    /// Tuner gain in dB. Defaults to the device maximum
    #[clap(long)]
    pub gain: Option<f32>,

    /// Number of FFT bins
    #[clap(long, default_value = "512")]
    pub fft_size: usize,

    /// Rows kept in the waterfall
    #[clap(long, default_value = "100")]
    pub history_depth: usize,

    /// Samples shown in the time and constellation views
    #[clap(long, default_value = "500")]
    pub excerpt_length: usize,

    /// Samples requested from the device per batch
    #[clap(long, default_value = "262144")]
    pub batch_size: usize,

    /// Display refresh period in milliseconds
    #[clap(long, default_value = "150")]
    pub refresh_ms: u64,

    /// Wait after retuning before samples are trusted again, in milliseconds
    #[clap(long, default_value = "500")]
    pub settle_ms: u64,

    /// Run without a window, logging status every refresh period
    #[clap(long, action)]
    pub headless: bool,

    /// Stop after this many seconds (headless only)
    #[clap(long, requires = "headless")]
    pub duration_secs: Option<u64>,

    /// Log verbosity
    #[clap(long, default_value = "info")]
    pub log_level: LevelFilter,
}

impl Cli {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            batch_size: self.batch_size,
            fft_size: self.fft_size,
            history_depth: self.history_depth,
            excerpt_length: self.excerpt_length,
            settle_delay: Duration::from_millis(self.settle_ms),
            ..EngineConfig::default()
        }
    }

    /// Initial tuning. The gain is filled in from the device when not given.
    pub fn device_config(&self) -> DeviceConfig {
        DeviceConfig {
            sample_rate: Hertz(self.sample_rate),
            center_frequency: Hertz(self.center_frequency),
            gain: Decibels(self.gain.unwrap_or(0.0)),
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["sdrscope"]);
        assert_eq!(cli.source, SourceKind::Tone);
        assert_eq!(cli.refresh_interval(), Duration::from_millis(150));
        assert_eq!(cli.device_config().sample_rate, Hertz(2_048_000));
        assert_eq!(cli.engine_config().batch_size, 262_144);
        assert!(cli.gain.is_none());
    }

    #[test]
    fn test_file_source_requires_path() {
        assert!(Cli::try_parse_from(["sdrscope", "--source", "file"]).is_err());
        let cli = Cli::try_parse_from(["sdrscope", "--source", "file", "--file", "rec.iq"]).unwrap();
        assert_eq!(cli.file, Some(PathBuf::from("rec.iq")));
    }

    #[test]
    fn test_negative_tone_offset() {
        let cli = Cli::parse_from(["sdrscope", "--tone-offset", "-301000"]);
        assert_eq!(cli.tone_offset, -301_000.0);
    }
}
