mod cli;

use std::io::Write;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use log::{LevelFilter, info, warn};

use cli::{Cli, SourceKind};
use sdrscope_engine::{Engine, FileIqSource, SampleSource, SharedState, ToneSource};
use sdrscope_messages::{Command, Decibels, LoopState};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    env_logger::builder()
        .format(|buf, record| {
            writeln!(
                buf,
                "{:<5} - mod path |{}| - target | {} | args: |{}|",
                record.level(),
                record.module_path().unwrap_or(""),
                record.target(),
                record.args()
            )
        })
        .filter_level(cli.log_level)
        .filter_module("eframe", LevelFilter::Warn)
        .filter_module("egui_glow", LevelFilter::Warn)
        .filter_module("winit", LevelFilter::Warn)
        .init();

    let source = open_source(&cli)?;
    let engine = Engine::new(source, cli.engine_config()).context("engine setup failed")?;
    let shared = engine.shared();

    // Create flume channel for UI -> engine commands
    let (cmd_tx, cmd_rx) = flume::unbounded();

    // Spawn engine thread
    let engine_handle = thread::Builder::new()
        .name("engine".to_string())
        .spawn(move || engine.run(cmd_rx))
        .context("failed to start engine thread")?;

    if cli.headless {
        report_until_stopped(&shared, cli.refresh_interval(), cli.duration_secs);
    } else {
        // Run UI on main thread (blocking)
        sdrscope_ui::run(Arc::clone(&shared), cmd_tx.clone(), cli.refresh_interval())?;
    }

    // UI has exited - send stop command to engine
    let _ = cmd_tx.send(Command::Stop);

    engine_handle
        .join()
        .map_err(|_| anyhow::anyhow!("Engine thread panicked"))?
        .context("acquisition failed")?;

    info!(
        "stopped after {} cycles ({} overrun episodes)",
        shared.cycles(),
        shared.overruns()
    );
    Ok(())
}

fn open_source(cli: &Cli) -> anyhow::Result<Box<dyn SampleSource>> {
    let config = cli.device_config();
    let mut source: Box<dyn SampleSource> = match cli.source {
        SourceKind::Tone => Box::new(ToneSource::open(config)?.with_tone_offset(cli.tone_offset)),
        SourceKind::File => {
            let path = cli
                .file
                .as_ref()
                .context("--file is required with --source file")?;
            Box::new(FileIqSource::open(path, config, cli.loop_file)?.with_throttle(true))
        }
    };

    if cli.gain.is_none() {
        let max = source.available_gains().into_iter().max().unwrap_or(0);
        source.set_gain(Decibels::from_tenths(max))?;
    }
    let config = source.config();
    info!(
        "opened {:?} source: {} @ {}, gain {}",
        cli.source, config.center_frequency, config.sample_rate, config.gain
    );
    Ok(source)
}

/// Headless consumer: log the shared state on the refresh cadence until the
/// engine stops or `duration_secs` passes.
fn report_until_stopped(shared: &SharedState, interval: Duration, duration_secs: Option<u64>) {
    let deadline = duration_secs.map(|secs| Instant::now() + Duration::from_secs(secs));
    let report_every = (Duration::from_secs(1).as_millis() / interval.as_millis().max(1)).max(1);
    let mut ticks: u128 = 0;

    loop {
        thread::sleep(interval);
        let snapshot = shared.snapshot();
        if snapshot.loop_state == LoopState::Stopped {
            if let Some(error) = shared.last_device_error() {
                warn!("acquisition stopped: {error}");
            }
            break;
        }
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            break;
        }

        ticks += 1;
        if ticks % report_every == 0 {
            let peak = snapshot
                .spectrum
                .iter()
                .copied()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(&b.1));
            if let Some((bin, db)) = peak {
                info!(
                    "{} | cycle {} | utilization {:.1}% | peak bin {bin} at {db:.1} dB | {:?}",
                    snapshot.loop_state,
                    snapshot.cycles,
                    snapshot.utilization * 100.0,
                    snapshot.reconfig_status
                );
            }
        }
    }
}
