mod command;
mod state;
mod units;

pub use command::{Command, ConfigCommand, ConfigParam, ParseCommandError};
pub use state::{DeviceConfig, LoopState, ReconfigStatus};
pub use units::{Decibels, Hertz};
