use eframe::egui::{Color32, ComboBox, Response, TextEdit, Ui, Widget};
use flume::Sender;
use log::warn;

use sdrscope_messages::{
    Command, ConfigCommand, Decibels, DeviceConfig, LoopState, ParseCommandError, ReconfigStatus,
};

/// Build a center-frequency change from a value typed in MHz.
pub fn frequency_command(mhz: &str) -> Result<ConfigCommand, ParseCommandError> {
    let hz = mhz
        .trim()
        .parse::<f64>()
        .map(|mhz| (mhz * 1e6).to_string())
        .unwrap_or_else(|_| mhz.to_string());
    ConfigCommand::parse("center_frequency", &hz)
}

/// Control panel for tuning the device while it streams.
///
/// Changes are sent to the engine and never waited on; the outcome shows up
/// in the next snapshot as a `ReconfigStatus`.
pub struct ControlPanel {
    cmd_tx: Sender<Command>,
    gains: Vec<Decibels>,
    selected_gain: Decibels,
    frequency_text: String,
    frequency_dirty: bool,
    input_error: Option<String>,
    device_config: DeviceConfig,
    loop_state: LoopState,
    status: ReconfigStatus,
}

impl ControlPanel {
    pub fn new(cmd_tx: Sender<Command>, gains: Vec<Decibels>, config: DeviceConfig) -> Self {
        Self {
            cmd_tx,
            gains,
            selected_gain: config.gain,
            frequency_text: format_mhz(&config),
            frequency_dirty: false,
            input_error: None,
            device_config: config,
            loop_state: LoopState::Running,
            status: ReconfigStatus::Idle,
        }
    }

    /// Update from the latest engine snapshot. Fields the user is editing
    /// are left alone.
    pub fn update_from_engine_state(
        &mut self,
        config: DeviceConfig,
        loop_state: LoopState,
        status: &ReconfigStatus,
    ) {
        if config != self.device_config {
            self.selected_gain = config.gain;
            if !self.frequency_dirty {
                self.frequency_text = format_mhz(&config);
            }
        }
        self.device_config = config;
        self.loop_state = loop_state;
        self.status = status.clone();
    }

    fn send(&self, command: Command) {
        if self.cmd_tx.send(command).is_err() {
            warn!("engine is gone, dropping command");
        }
    }

    fn apply_frequency(&mut self) {
        match frequency_command(&self.frequency_text) {
            Ok(command) => {
                self.input_error = None;
                self.frequency_dirty = false;
                self.send(Command::Reconfigure(command));
            }
            Err(e) => self.input_error = Some(e.to_string()),
        }
    }

    fn status_line(&self) -> (String, Color32) {
        match &self.status {
            ReconfigStatus::Idle => ("idle".to_string(), Color32::GRAY),
            ReconfigStatus::Submitted(cmd) => (format!("applying {cmd}"), Color32::YELLOW),
            ReconfigStatus::Applied(cmd) => (format!("applied {cmd}"), Color32::LIGHT_GREEN),
            ReconfigStatus::Failed(reason) => (format!("failed: {reason}"), Color32::LIGHT_RED),
        }
    }
}

fn format_mhz(config: &DeviceConfig) -> String {
    format!("{:.3}", config.center_frequency.as_mhz())
}

impl Widget for &mut ControlPanel {
    fn ui(self, ui: &mut Ui) -> Response {
        ui.heading("Device");
        ui.separator();

        let config = self.device_config;
        ui.label(format!("Sample rate: {}", config.sample_rate));
        ui.label(format!("Center: {:.3} MHz", config.center_frequency.as_mhz()));
        ui.label(format!("Gain: {}", config.gain));
        ui.label(format!("State: {}", self.loop_state));

        ui.add_space(10.0);
        ui.separator();

        let accepting = self.loop_state != LoopState::Stopped;
        ui.add_enabled_ui(accepting, |ui| {
            let previous = self.selected_gain;
            ComboBox::from_label("Gain")
                .selected_text(self.selected_gain.to_string())
                .show_ui(ui, |ui| {
                    for &gain in &self.gains {
                        ui.selectable_value(&mut self.selected_gain, gain, gain.to_string());
                    }
                });
            if self.selected_gain != previous {
                self.send(Command::Reconfigure(ConfigCommand::Gain(self.selected_gain)));
            }

            ui.add_space(10.0);
            ui.horizontal(|ui| {
                ui.label("Center [MHz]:");
                if ui
                    .add(TextEdit::singleline(&mut self.frequency_text).desired_width(90.0))
                    .changed()
                {
                    self.frequency_dirty = true;
                }
            });
            if ui.button("Apply").clicked() {
                self.apply_frequency();
            }
            if let Some(error) = &self.input_error {
                ui.colored_label(Color32::LIGHT_RED, error);
            }

            if self.loop_state == LoopState::Paused && ui.button("Resume").clicked() {
                self.send(Command::Resume);
            }
        });

        ui.add_space(10.0);
        ui.separator();
        let (text, color) = self.status_line();
        ui.colored_label(color, text);

        ui.response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdrscope_messages::Hertz;

    #[test]
    fn test_frequency_command_from_mhz() {
        assert_eq!(
            frequency_command("99.5"),
            Ok(ConfigCommand::CenterFrequency(Hertz(99_500_000)))
        );
    }

    #[test]
    fn test_frequency_command_rejects_garbage() {
        assert!(matches!(
            frequency_command("fm"),
            Err(ParseCommandError::InvalidValue { .. })
        ));
        assert!(frequency_command("-5").is_err());
    }

    #[test]
    fn test_snapshot_does_not_clobber_edits() {
        let (tx, _rx) = flume::unbounded();
        let config = DeviceConfig::default();
        let mut panel = ControlPanel::new(tx, vec![Decibels(0.0)], config);
        panel.frequency_text = "433.92".to_string();
        panel.frequency_dirty = true;

        let retuned = config.with(ConfigCommand::Gain(Decibels(20.0)));
        panel.update_from_engine_state(retuned, LoopState::Running, &ReconfigStatus::Idle);

        assert_eq!(panel.frequency_text, "433.92");
        assert_eq!(panel.selected_gain, Decibels(20.0));
    }

    #[test]
    fn test_apply_sends_reconfigure() {
        let (tx, rx) = flume::unbounded();
        let mut panel = ControlPanel::new(tx, Vec::new(), DeviceConfig::default());
        panel.frequency_text = "100".to_string();
        panel.apply_frequency();

        assert_eq!(
            rx.try_recv(),
            Ok(Command::Reconfigure(ConfigCommand::CenterFrequency(Hertz(100_000_000))))
        );
        assert!(panel.input_error.is_none());
    }
}
