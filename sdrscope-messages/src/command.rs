use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::{Decibels, Hertz};

/// Commands sent from the UI to the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Stop acquisition and release the device.
    Stop,
    /// Pause acquisition, apply a device parameter change, then resume.
    Reconfigure(ConfigCommand),
    /// Clear a pause left behind by a failed reconfiguration.
    Resume,
}

/// The device parameters that may be changed while running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigParam {
    SampleRate,
    CenterFrequency,
    Gain,
}

impl ConfigParam {
    pub const fn name(self) -> &'static str {
        match self {
            Self::SampleRate => "sample_rate",
            Self::CenterFrequency => "center_frequency",
            Self::Gain => "gain",
        }
    }
}

impl fmt::Display for ConfigParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ConfigParam {
    type Err = ParseCommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "sample_rate" | "sampleRate" | "rate" => Ok(Self::SampleRate),
            "center_frequency" | "centerFrequency" | "center_freq" | "freq" => {
                Ok(Self::CenterFrequency)
            }
            "gain" => Ok(Self::Gain),
            other => Err(ParseCommandError::UnknownParameter(other.to_string())),
        }
    }
}

/// A single pending device change. Closed over the parameters the engine
/// knows how to apply; values are already typed and range-checked for sign.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigCommand {
    SampleRate(Hertz),
    CenterFrequency(Hertz),
    Gain(Decibels),
}

impl ConfigCommand {
    /// Parse a `(parameter, value)` pair as typed by a user.
    ///
    /// Frequencies accept plain or scientific notation (`"101.1e6"`) and are
    /// rounded to the nearest Hz.
    pub fn parse(param: &str, value: &str) -> Result<Self, ParseCommandError> {
        let param: ConfigParam = param.parse()?;
        let invalid = || ParseCommandError::InvalidValue {
            param,
            value: value.to_string(),
        };

        match param {
            ConfigParam::SampleRate | ConfigParam::CenterFrequency => {
                let hz: f64 = value.trim().parse().map_err(|_| invalid())?;
                if !hz.is_finite() || hz < 1.0 || hz > u64::MAX as f64 {
                    return Err(invalid());
                }
                let hz = Hertz(hz.round() as u64);
                Ok(match param {
                    ConfigParam::SampleRate => Self::SampleRate(hz),
                    _ => Self::CenterFrequency(hz),
                })
            }
            ConfigParam::Gain => {
                let db: f32 = value.trim().parse().map_err(|_| invalid())?;
                if !db.is_finite() {
                    return Err(invalid());
                }
                Ok(Self::Gain(Decibels(db)))
            }
        }
    }

    pub fn param(&self) -> ConfigParam {
        match self {
            Self::SampleRate(_) => ConfigParam::SampleRate,
            Self::CenterFrequency(_) => ConfigParam::CenterFrequency,
            Self::Gain(_) => ConfigParam::Gain,
        }
    }
}

impl fmt::Display for ConfigCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SampleRate(hz) => write!(f, "sample_rate={hz}"),
            Self::CenterFrequency(hz) => write!(f, "center_frequency={hz}"),
            Self::Gain(db) => write!(f, "gain={db}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseCommandError {
    #[error("unknown device parameter `{0}`")]
    UnknownParameter(String),
    #[error("invalid value `{value}` for {param}")]
    InvalidValue { param: ConfigParam, value: String },
}
