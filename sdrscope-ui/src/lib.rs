mod control_panel;
mod plots;
mod state;
mod waterfall;

use std::sync::Arc;
use std::time::{Duration, Instant};

use sdrscope_engine::SharedState;
use sdrscope_messages::Command;
use state::UiState;

/// Main application struct implementing the egui App trait.
///
/// Reads the engine's shared state on a fixed cadence and never blocks on
/// the acquisition thread.
pub struct SdrScopeApp {
    shared: Arc<SharedState>,

    /// Local application state
    state: UiState,

    refresh_interval: Duration,
    last_refresh: Option<Instant>,
}

impl SdrScopeApp {
    fn new(
        shared: Arc<SharedState>,
        cmd_tx: flume::Sender<Command>,
        refresh_interval: Duration,
    ) -> Self {
        Self {
            state: UiState::new(&shared, cmd_tx),
            shared,
            refresh_interval,
            last_refresh: None,
        }
    }

    fn poll_due(&self, now: Instant) -> bool {
        self.last_refresh
            .is_none_or(|last| now.duration_since(last) >= self.refresh_interval)
    }
}

impl eframe::App for SdrScopeApp {
    fn update(&mut self, ctx: &eframe::egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();
        if self.poll_due(now) {
            self.state.refresh(&self.shared);
            self.last_refresh = Some(now);
        }
        ctx.request_repaint_after(self.refresh_interval);

        eframe::egui::SidePanel::right("control_panel")
            .default_width(250.0)
            .show(ctx, |ui| {
                ui.add(&mut self.state.control_panel);
                if let Some(snapshot) = &self.state.snapshot {
                    ui.add_space(10.0);
                    plots::utilization_bar(ui, snapshot.utilization);
                    ui.label(format!("cycles: {}", snapshot.cycles));
                    ui.label(format!("overruns: {}", snapshot.overruns));
                    ui.add_space(10.0);
                    let side = ui.available_width().min(240.0);
                    plots::constellation(ui, &snapshot.excerpt.i, &snapshot.excerpt.q, side);
                }
            });

        eframe::egui::CentralPanel::default().show(ctx, |ui| {
            let Some(snapshot) = &self.state.snapshot else {
                ui.centered_and_justified(|ui| {
                    ui.label("Waiting for engine...");
                });
                return;
            };
            plots::spectrum_plot(ui, &self.state.freq_axis, &snapshot.spectrum, 200.0);
            ui.add_space(4.0);
            plots::time_plot(
                ui,
                &self.state.time_axis,
                &snapshot.excerpt.i,
                &snapshot.excerpt.q,
                150.0,
            );
            ui.add_space(4.0);
            ui.add(&mut self.state.waterfall);
        });
    }
}

/// Entry point for the UI module.
///
/// Runs the eframe application on the main thread (blocking).
pub fn run(
    shared: Arc<SharedState>,
    cmd_tx: flume::Sender<Command>,
    refresh_interval: Duration,
) -> anyhow::Result<()> {
    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 900.0])
            .with_title("sdrscope"),
        ..Default::default()
    };

    eframe::run_native(
        "sdrscope",
        options,
        Box::new(move |_cc| Ok(Box::new(SdrScopeApp::new(shared, cmd_tx, refresh_interval)))),
    )
    .map_err(|e| anyhow::anyhow!("{}", e))?;

    Ok(())
}
