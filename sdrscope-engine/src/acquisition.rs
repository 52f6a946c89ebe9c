//! The acquisition loop: reads batches, processes them, publishes results and
//! runs the pause/reconfigure handshake with [`SharedState`].

use log::{debug, error, info, warn};
use sdrscope_messages::{ConfigCommand, Decibels, LoopState, ReconfigStatus};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::processor::{SpectralProcessor, utilization};
use crate::shared::{SharedState, WATERFALL_FLOOR_DB};
use crate::source::{ReadEnd, SampleSource};
use crate::waterfall::WaterfallHistory;

/// How long a paused loop sleeps between checks when nothing wakes it.
const IDLE_POLL: Duration = Duration::from_millis(100);

/// Owns the device for the lifetime of a run.
///
/// State machine: `Running` -> `PausePending` (pause seen inside a read,
/// read cancelled from the delivery callback) -> `Paused` -> `Reconfiguring`
/// (command applied, settle delay) -> `Running`. `Stopped` is entered from any
/// state on shutdown, end of stream or a fatal device error.
pub struct AcquisitionLoop {
    source: Box<dyn SampleSource>,
    processor: SpectralProcessor,
    waterfall: WaterfallHistory,
    shared: Arc<SharedState>,
    config: EngineConfig,
    overrun: OverrunMonitor,
}

impl AcquisitionLoop {
    pub fn new(
        mut source: Box<dyn SampleSource>,
        shared: Arc<SharedState>,
        config: EngineConfig,
    ) -> Self {
        source.set_read_timeout(config.read_timeout);
        Self {
            source,
            processor: SpectralProcessor::new(config.fft_size, config.excerpt_length),
            waterfall: WaterfallHistory::new(
                config.history_depth,
                config.fft_size,
                WATERFALL_FLOOR_DB,
            ),
            overrun: OverrunMonitor::new(config.overrun_threshold, config.sustained_overrun_cycles),
            shared,
            config,
        }
    }

    /// Run until shutdown, end of stream or a fatal device error. The device
    /// is closed on every exit path.
    pub fn run(mut self) -> Result<()> {
        info!(
            "acquisition starting: {} samples/batch, fft {}, {} rows",
            self.config.batch_size, self.config.fft_size, self.config.history_depth
        );
        let result = self.run_until_stopped();
        if let Err(e) = &result {
            error!("acquisition stopped: {e}");
        }
        self.source.close();
        self.shared.set_loop_state(LoopState::Stopped);
        result
    }

    fn run_until_stopped(&mut self) -> Result<()> {
        loop {
            if self.shared.is_shutdown_requested() {
                info!("acquisition shutting down");
                return Ok(());
            }

            if !self.shared.is_pause_requested() {
                self.shared.set_loop_state(LoopState::Running);
                match self.acquire() {
                    Ok(ReadEnd::Cancelled) => continue,
                    Ok(ReadEnd::Exhausted) => {
                        info!("sample source exhausted");
                        return Ok(());
                    }
                    Err(e) => {
                        self.shared.record_device_error(e.clone());
                        return Err(EngineError::Device(e));
                    }
                }
            }

            // No read is outstanding past this point.
            self.shared.set_loop_state(LoopState::Paused);
            match self.shared.take_command() {
                Some(command) => self.reconfigure(command),
                None => self.shared.wait_for_control(IDLE_POLL),
            }
        }
    }

    /// One asynchronous read, lasting until the callback cancels it.
    fn acquire(&mut self) -> std::result::Result<ReadEnd, crate::DeviceError> {
        let Self {
            source,
            processor,
            waterfall,
            shared,
            config,
            overrun,
        } = self;
        let sample_rate = source.config().sample_rate;

        source.read_async(config.batch_size, &mut |batch, cancel| {
            let frame = processor.process(&batch, waterfall);
            let (processing_time, batch_len) = (frame.processing_time, frame.batch_len);
            let publish_started = Instant::now();
            shared.publish_frame(frame, waterfall);

            let busy = processing_time + publish_started.elapsed();
            let load = utilization(busy, batch_len, sample_rate);
            shared.publish_utilization(load);
            if overrun.observe(load) {
                shared.record_overrun();
            }

            // The delivery context is the only place a read may be cancelled.
            if shared.is_shutdown_requested() {
                cancel.cancel();
            } else if shared.is_pause_requested() {
                shared.set_loop_state(LoopState::PausePending);
                cancel.cancel();
            }
        })
    }

    fn reconfigure(&mut self, command: ConfigCommand) {
        self.shared.set_loop_state(LoopState::Reconfiguring);
        let target = self.source.config().with(command);

        match self.source.configure(&target) {
            Ok(()) => {
                let applied = self.source.config();
                self.shared.set_device_config(applied);
                info!(
                    "applied {command}: {} @ {}, gain {}",
                    applied.center_frequency, applied.sample_rate, applied.gain
                );
                if !self.shared.sleep_unless_shutdown(self.config.settle_delay) {
                    debug!("settle delay interrupted by shutdown");
                }
                self.shared.set_reconfig_status(ReconfigStatus::Applied(command));
                self.shared.complete_command(true);
            }
            Err(e) => {
                // Keep whatever part of the change the device did accept.
                self.shared.set_device_config(self.source.config());
                warn!("device rejected {command}: {e}; staying paused");
                self.shared
                    .set_reconfig_status(ReconfigStatus::Failed(e.to_string()));
                self.shared.record_device_error(e);
                self.shared.set_loop_state(LoopState::Paused);
                self.shared.complete_command(false);
            }
        }
    }
}

/// Tracks sustained high utilization and reports each episode once.
#[derive(Debug)]
pub(crate) struct OverrunMonitor {
    threshold: f32,
    sustain: usize,
    consecutive: usize,
    reported: bool,
}

impl OverrunMonitor {
    pub(crate) fn new(threshold: f32, sustain: usize) -> Self {
        Self {
            threshold,
            sustain: sustain.max(1),
            consecutive: 0,
            reported: false,
        }
    }

    /// Returns true when a new episode is reported.
    pub(crate) fn observe(&mut self, utilization: f32) -> bool {
        if utilization < self.threshold {
            self.consecutive = 0;
            self.reported = false;
            return false;
        }
        self.consecutive += 1;
        if self.reported || self.consecutive < self.sustain {
            return false;
        }
        self.reported = true;
        let advisory = EngineError::Overrun {
            utilization,
            cycles: self.consecutive,
        };
        if utilization >= 1.0 {
            warn!("{advisory}; samples are being dropped");
        } else {
            warn!("{advisory}; close to dropping samples");
        }
        true
    }
}

/// Human-readable gain list for logs.
pub(crate) fn describe_gains(gains: &[Decibels]) -> String {
    gains
        .iter()
        .map(|g| format!("{:.1}", g.0))
        .collect::<Vec<_>>()
        .join(", ")
}
