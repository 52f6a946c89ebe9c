use std::fmt;

use crate::{ConfigCommand, Decibels, Hertz};

/// Current tuning of the radio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceConfig {
    pub sample_rate: Hertz,
    pub center_frequency: Hertz,
    pub gain: Decibels,
}

impl DeviceConfig {
    /// Returns a copy of this configuration with `command` applied.
    pub fn with(mut self, command: ConfigCommand) -> Self {
        match command {
            ConfigCommand::SampleRate(rate) => self.sample_rate = rate,
            ConfigCommand::CenterFrequency(freq) => self.center_frequency = freq,
            ConfigCommand::Gain(gain) => self.gain = gain,
        }
        self
    }

    /// Default tuning with the gain set to the top of a driver gain table
    /// given in tenths of a dB.
    pub fn with_max_gain(gains_tenths: &[i32]) -> Self {
        let max = gains_tenths.iter().copied().max().unwrap_or(0);
        Self {
            gain: Decibels::from_tenths(max),
            ..Self::default()
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            sample_rate: Hertz(2_048_000),
            center_frequency: Hertz(101_100_000),
            gain: Decibels(0.0),
        }
    }
}

/// Acquisition loop state, as published to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Reading batches and publishing results.
    Running,
    /// A pause was requested while a read was outstanding; waiting for it to drain.
    PausePending,
    /// No read outstanding; the device may be reconfigured.
    Paused,
    /// Applying a configuration change and waiting out the settle delay.
    Reconfiguring,
    /// Shut down; the device has been released.
    Stopped,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Running => "running",
            Self::PausePending => "pause pending",
            Self::Paused => "paused",
            Self::Reconfiguring => "reconfiguring",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Outcome of the most recent reconfiguration request.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconfigStatus {
    Idle,
    /// The command was handed to the acquisition loop.
    Submitted(ConfigCommand),
    /// The acquisition loop applied the command to the device.
    Applied(ConfigCommand),
    /// The request or the device rejected the change.
    Failed(String),
}
