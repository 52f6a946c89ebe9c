mod acquisition;
mod config;
mod error;
mod processor;
mod reconfigure;
mod shared;
mod source;
mod waterfall;

pub use acquisition::AcquisitionLoop;
pub use config::EngineConfig;
pub use error::{ConfigError, DeviceError, DeviceErrorKind, EngineError, ReconfigError, Result};
pub use processor::{Frame, SpectralProcessor, TimeExcerpt, frequency_axis, time_axis, utilization};
pub use reconfigure::Reconfigurator;
pub use shared::{SharedState, Snapshot, WATERFALL_FLOOR_DB};
pub use source::{CancelHandle, FileIqSource, ReadEnd, SampleBatch, SampleSource, ToneSource};
pub use waterfall::WaterfallHistory;

use flume::{Receiver, RecvTimeoutError};
use log::{debug, info, warn};
use sdrscope_messages::{Command, Decibels, ReconfigStatus};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// How often the control thread checks on the acquisition thread.
const COMMAND_POLL: Duration = Duration::from_millis(100);

/// The SDR engine backend.
/// Owns the sample source and processes commands from the UI.
pub struct Engine {
    source: Box<dyn SampleSource>,
    config: EngineConfig,
    shared: Arc<SharedState>,
}

impl Engine {
    /// Create a new Engine instance around an opened source.
    pub fn new(source: Box<dyn SampleSource>, config: EngineConfig) -> Result<Self> {
        config.validate_for_rate(source.config().sample_rate)?;
        debug!("Constructing a new engine");

        let shared = Arc::new(SharedState::new(&config, source.config()));
        let gains: Vec<Decibels> = source
            .available_gains()
            .into_iter()
            .map(Decibels::from_tenths)
            .collect();
        info!("device gains (dB): {}", acquisition::describe_gains(&gains));
        shared.set_available_gains(gains);

        Ok(Self {
            source,
            config,
            shared,
        })
    }

    /// Handle for display readers.
    pub fn shared(&self) -> Arc<SharedState> {
        Arc::clone(&self.shared)
    }

    pub fn reconfigurator(&self) -> Reconfigurator {
        Reconfigurator::new(self.shared(), self.config.pause_deadline)
    }

    /// Run the engine (blocking).
    ///
    /// Acquisition runs on its own thread; this thread services commands so
    /// reconfiguration waits never stall the display. Returns the acquisition
    /// result once it stops.
    pub fn run(self, cmd_rx: Receiver<Command>) -> Result<()> {
        let reconfigurator = self.reconfigurator();
        let shared = self.shared();
        let acquisition = AcquisitionLoop::new(self.source, self.shared, self.config);

        let handle = thread::Builder::new()
            .name("acquisition".to_string())
            .spawn(move || acquisition.run())
            .map_err(|e| DeviceError::io(format!("failed to start acquisition: {e}")))?;

        loop {
            match cmd_rx.recv_timeout(COMMAND_POLL) {
                Ok(Command::Stop) | Err(RecvTimeoutError::Disconnected) => {
                    shared.request_shutdown();
                    break;
                }
                Ok(Command::Reconfigure(command)) => {
                    if let Err(e) = reconfigurator.request(command) {
                        warn!("reconfiguration {command} failed: {e}");
                        shared.set_reconfig_status(ReconfigStatus::Failed(e.to_string()));
                    }
                }
                Ok(Command::Resume) => {
                    if reconfigurator.resume() {
                        shared.set_reconfig_status(ReconfigStatus::Idle);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    if handle.is_finished() {
                        break;
                    }
                }
            }
        }

        handle
            .join()
            .map_err(|_| EngineError::ThreadPanicked("acquisition"))?
    }
}
