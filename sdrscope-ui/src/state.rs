use std::sync::Arc;

use flume::Sender;

use crate::control_panel::ControlPanel;
use crate::waterfall::Waterfall;
use sdrscope_engine::{SharedState, Snapshot, frequency_axis, time_axis};
use sdrscope_messages::{Command, DeviceConfig};

/// Local UI state derived from periodic reads of the engine's shared state.
pub(super) struct UiState {
    /// Most recent snapshot; display data may lag the engine by a cycle.
    pub snapshot: Option<Snapshot>,

    /// Bin frequencies in MHz for the current tuning.
    pub freq_axis: Vec<f64>,

    /// Excerpt sample times in ms for the current sample rate.
    pub time_axis: Vec<f64>,

    axes_for: Option<(DeviceConfig, usize, usize)>,

    pub waterfall: Waterfall,

    pub control_panel: ControlPanel,
}

impl UiState {
    pub fn new(shared: &SharedState, cmd_tx: Sender<Command>) -> Self {
        Self {
            snapshot: None,
            freq_axis: Vec::new(),
            time_axis: Vec::new(),
            axes_for: None,
            waterfall: Waterfall::new(),
            control_panel: ControlPanel::new(
                cmd_tx,
                shared.available_gains(),
                shared.device_config(),
            ),
        }
    }

    pub fn refresh(&mut self, shared: &Arc<SharedState>) {
        let snapshot = shared.snapshot();
        self.control_panel.update_from_engine_state(
            snapshot.device_config,
            snapshot.loop_state,
            &snapshot.reconfig_status,
        );
        self.waterfall.update(&snapshot.waterfall);

        let key = (
            snapshot.device_config,
            snapshot.spectrum.len(),
            snapshot.excerpt.len(),
        );
        if self.axes_for != Some(key) {
            self.freq_axis = frequency_axis(&key.0, key.1);
            self.time_axis = time_axis(key.0.sample_rate, key.2);
            self.axes_for = Some(key);
        }
        self.snapshot = Some(snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdrscope_engine::EngineConfig;
    use sdrscope_messages::{ConfigCommand, Hertz};

    #[test]
    fn test_axes_follow_tuning() {
        let config = EngineConfig {
            fft_size: 8,
            excerpt_length: 4,
            ..EngineConfig::default()
        };
        let shared = Arc::new(SharedState::new(&config, DeviceConfig::default()));
        let (tx, _rx) = flume::unbounded();
        let mut state = UiState::new(&shared, tx);

        state.refresh(&shared);
        assert_eq!(state.freq_axis.len(), 8);
        assert_eq!(state.time_axis.len(), 4);
        assert!((state.freq_axis[0] - (101.1 - 1.024)).abs() < 1e-9);

        let retuned = DeviceConfig::default().with(ConfigCommand::CenterFrequency(Hertz::mhz(90)));
        shared.set_device_config(retuned);
        state.refresh(&shared);
        assert!((state.freq_axis[7] - (90.0 + 1.024)).abs() < 1e-9);
        assert_eq!(state.snapshot.map(|s| s.device_config), Some(retuned));
    }
}
