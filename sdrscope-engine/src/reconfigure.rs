//! Requester side of the pause/reconfigure handshake.

use log::{info, warn};
use sdrscope_messages::{ConfigCommand, LoopState};
use std::sync::Arc;
use std::time::Duration;

use crate::error::ReconfigError;
use crate::shared::SharedState;

/// Asks the acquisition loop to pause and hands it a device change.
///
/// Cheap to clone; intended to be called from a thread that may block for up
/// to `pause_deadline`, never from the display's refresh path.
#[derive(Clone)]
pub struct Reconfigurator {
    shared: Arc<SharedState>,
    pause_deadline: Duration,
}

impl Reconfigurator {
    pub fn new(shared: Arc<SharedState>, pause_deadline: Duration) -> Self {
        Self {
            shared,
            pause_deadline,
        }
    }

    /// Parse and request a change such as `("gain", "30")`.
    pub fn request_change(&self, param: &str, value: &str) -> Result<(), ReconfigError> {
        let command = ConfigCommand::parse(param, value)?;
        self.request(command)
    }

    /// Pause acquisition, wait for the loop to acknowledge, and queue
    /// `command`. Returns once the command is queued; it does not wait for
    /// the device to settle.
    ///
    /// If the loop does not pause within the deadline the pause request is
    /// withdrawn so acquisition carries on, and `Timeout` is returned.
    pub fn request(&self, command: ConfigCommand) -> Result<(), ReconfigError> {
        if self.shared.is_shutdown_requested() || self.shared.loop_state() == LoopState::Stopped {
            return Err(ReconfigError::Stopped);
        }
        if self.shared.has_pending_command() {
            return Err(ReconfigError::Busy);
        }

        self.shared.request_pause();
        if !self
            .shared
            .wait_for_state(LoopState::Paused, self.pause_deadline)
        {
            if self.shared.is_shutdown_requested()
                || self.shared.loop_state() == LoopState::Stopped
            {
                return Err(ReconfigError::Stopped);
            }
            self.shared.abandon_pause();
            warn!(
                "acquisition did not pause within {:?}; dropped {command}",
                self.pause_deadline
            );
            return Err(ReconfigError::Timeout(self.pause_deadline));
        }

        self.shared.submit_command(command)?;
        info!("queued {command}");
        Ok(())
    }

    /// Let acquisition continue after a rejected change left it paused.
    /// Does nothing while a command is queued or being applied.
    pub fn resume(&self) -> bool {
        self.shared.abandon_pause()
    }
}
