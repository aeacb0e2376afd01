//! Standalone valve controller running against the simulated hardware.
//!
//! Wires the full system together: file-backed settings and schedule stores,
//! the motion controller on its own high-priority thread, the Prometheus
//! scrape endpoint and the CSV motion recorder, with the control loop on the
//! main thread. Runs for a fixed duration (first argument, seconds; default
//! 30) and then shuts down in order: control loop, shutdown sentinel, motion
//! thread, exporters.
//!
//! Files:
//! - `settings.json` — shared settings record (created with defaults).
//! - `schedule.json` — optional day schedule.
//! - `data/motion.csv` — per-tick motion diagnostics.
//! - `http://0.0.0.0:8000/metrics` — gauge snapshot.

use std::fs::create_dir_all;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossbeam::channel::bounded;
use log::{error, info, warn};

use thermovalve::actuator::motion::{self, MotionController};
use thermovalve::actuator::{Command, MotionConfig};
use thermovalve::control::ControlLoop;
use thermovalve::hal::sim::{SimClimate, SimMotor, SimPositionSensor, valve_at};
use thermovalve::monitor::{self, MotionRecorder};
use thermovalve::store::{JsonScheduleStore, JsonSettingsStore, SettingsStore};

const METRICS_ADDR: &str = "0.0.0.0:8000";
const COMMAND_QUEUE_DEPTH: usize = 8;
const DEFAULT_RUN_SECS: u64 = 30;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let run_for = Duration::from_secs(
        std::env::args()
            .nth(1)
            .map(|arg| arg.parse().context("duration must be whole seconds"))
            .transpose()?
            .unwrap_or(DEFAULT_RUN_SECS),
    );

    let settings_store = JsonSettingsStore::open("settings.json")?;
    let schedule_store = JsonScheduleStore::open("schedule.json");
    let settings = settings_store.load()?;
    info!(
        "[Main] target {:.1}C, valve at {}, control {}",
        settings.target_temp,
        settings.last_position,
        if settings.enabled { "enabled" } else { "disabled" }
    );

    // Simulated plant: motor, feedback pot and room all hang off one valve.
    let valve = valve_at(settings.last_position);
    let motor = SimMotor::new(valve.clone());
    let position = SimPositionSensor::new(valve.clone());
    let climate = SimClimate::new(valve, 18.0);

    let metrics = monitor::shared();
    let running = Arc::new(AtomicBool::new(true));
    let metrics_handle =
        monitor::spawn_metrics_server(METRICS_ADDR, metrics.clone(), running.clone())?;

    create_dir_all("data").context("creating data directory")?;
    let recorder = MotionRecorder::new();
    let exporter_handle = recorder.start_exporter("data/motion.csv".to_string());

    let (tx, rx) = bounded::<Command>(COMMAND_QUEUE_DEPTH);
    let motion_handle = motion::spawn(
        MotionController::new(
            motor,
            position,
            rx,
            MotionConfig::default(),
            metrics.clone(),
        )
        .with_recorder(recorder.clone()),
    );

    let mut control = ControlLoop::new(climate, settings_store, schedule_store, tx.clone(), metrics)?;

    // Timer thread clears the flag; the control loop owns the main thread.
    {
        let running = running.clone();
        thread::spawn(move || {
            let deadline = Instant::now() + run_for;
            while Instant::now() < deadline && running.load(Ordering::Relaxed) {
                thread::sleep(Duration::from_millis(200));
            }
            running.store(false, Ordering::Relaxed);
        });
    }

    info!("[Main] running for {run_for:?}");
    control.run(&running);

    // Shutdown order: sentinel to the motion thread, join it, then tear down
    // the exporters.
    if tx.send(Command::Shutdown).is_err() {
        warn!("[Main] motion thread already gone");
    }
    match motion_handle.join() {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("[Main] motion controller failed: {e:#}"),
        Err(_) => error!("[Main] motion thread panicked"),
    }

    recorder.finish();
    if exporter_handle.join().is_err() {
        warn!("[Main] recorder exporter panicked");
    }
    if metrics_handle.join().is_err() {
        warn!("[Main] metrics server panicked");
    }

    info!("[Main] done");
    Ok(())
}
