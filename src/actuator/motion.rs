//! Closed-loop actuator motion controller.
//!
//! Runs on its own thread and continuously drives the motor toward the most
//! recently commanded target position, using filtered feedback readings. The
//! state machine only ever passes through `Stop` between directions, with a
//! debounce on leaving `Stop` so rapid target changes cannot chatter the
//! motor. Ticks are tight (20 ms) while moving and coarse (200 ms) while
//! stopped to keep sensor/bus load down at rest.
//!
//! Every exit path — shutdown sentinel, disconnected channel, motor fault —
//! goes through the same stop-and-release epilogue, so the valve is never
//! left powered.

use std::thread;
use std::time::Instant;

use anyhow::{Context, Result};
use crossbeam::channel::{Receiver, TryRecvError};
use log::{debug, error, info, warn};
use spin_sleep::{SpinSleeper, SpinStrategy};
use thread_priority::{ThreadBuilderExt, ThreadPriority};

use crate::hal::{MotorDriver, PositionSensor, VALVE_CHANNEL};
use crate::monitor::{MotionRecorder, MotionSample, SharedMetrics, lock};

use super::filter::PositionFilter;
use super::{Command, Direction, MotionConfig};

enum Intake {
    Continue,
    Shutdown,
}

pub struct MotionController<M: MotorDriver, P: PositionSensor> {
    motor: M,
    sensor: P,
    rx: Receiver<Command>,
    config: MotionConfig,
    filter: PositionFilter,
    metrics: SharedMetrics,
    recorder: Option<MotionRecorder>,
}

impl<M: MotorDriver, P: PositionSensor> MotionController<M, P> {
    pub fn new(
        motor: M,
        sensor: P,
        rx: Receiver<Command>,
        config: MotionConfig,
        metrics: SharedMetrics,
    ) -> Self {
        let filter = PositionFilter::new(config.filter_moving_step);
        Self {
            motor,
            sensor,
            rx,
            config,
            filter,
            metrics,
            recorder: None,
        }
    }

    pub fn with_recorder(mut self, recorder: MotionRecorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Drives until shutdown or a motor fault, then stops and releases the
    /// driver. The epilogue runs on every exit path; a fault is surfaced to
    /// the caller only after the motor is safe.
    pub fn run(mut self) -> Result<()> {
        let result = self
            .motor
            .enable()
            .context("enabling motor driver")
            .and_then(|_| self.drive());

        if let Err(e) = self.motor.stop_all() {
            warn!("[Motion] stop on exit failed: {e:#}");
        }
        if let Err(e) = self.motor.disable() {
            warn!("[Motion] driver release failed: {e:#}");
        }
        info!("[Motion] stopped and released");
        result
    }

    fn drive(&mut self) -> Result<()> {
        let sleeper = SpinSleeper::new(100_000).with_spin_strategy(SpinStrategy::YieldThread);

        let mut target: Option<i32> = None;
        let mut direction = Direction::Stop;
        // Instant we last left Stop; None = free to move immediately.
        let mut last_stop_exit: Option<Instant> = None;

        self.motor.stop_all().context("initial stop")?;

        loop {
            if let Intake::Shutdown = self.poll_commands(&mut target) {
                return Ok(());
            }

            let raw = match self.sensor.read() {
                Ok(v) => v,
                Err(e) => {
                    // Transient: hold state, skip the tick. Movement commands
                    // are reissued every tick, so nothing is lost.
                    warn!("[Motion] position read failed, holding state: {e:#}");
                    sleeper.sleep(self.tick(direction));
                    continue;
                }
            };
            let filtered = self.filter.apply(raw, direction);

            if let Some(recorder) = &self.recorder {
                recorder.record(MotionSample {
                    ts_ns: recorder.now_ns(),
                    target: target.unwrap_or(filtered),
                    raw,
                    filtered,
                    direction: direction_label(direction),
                });
            }
            lock(&self.metrics).actual_position = filtered as f64;

            if let Some(t) = target {
                direction = self.step(t, filtered, direction, &mut last_stop_exit)?;
            }

            sleeper.sleep(self.tick(direction));
        }
    }

    /// One state-machine step: possibly transition, then issue this tick's
    /// motor command. Full-speed commands are idempotent and reissued every
    /// tick; the zero-speed command is issued exactly once, on entry to Stop.
    fn step(
        &mut self,
        target: i32,
        filtered: i32,
        direction: Direction,
        last_stop_exit: &mut Option<Instant>,
    ) -> Result<Direction> {
        let lower_edge = target - self.config.margin;
        let upper_edge = target + self.config.margin;

        let next = match direction {
            Direction::Stop => {
                let debounced =
                    last_stop_exit.is_none_or(|at| at.elapsed() >= self.config.debounce);
                if debounced && filtered < lower_edge {
                    *last_stop_exit = Some(Instant::now());
                    info!("[Motion] {filtered} -> {target}: raising");
                    Direction::Up
                } else if debounced && filtered > upper_edge {
                    *last_stop_exit = Some(Instant::now());
                    info!("[Motion] {filtered} -> {target}: lowering");
                    Direction::Down
                } else {
                    Direction::Stop
                }
            }
            // >= / <= rather than window membership: an overshoot past the
            // deadband must still stop the motor.
            Direction::Up if filtered >= lower_edge => {
                info!("[Motion] arrived at {filtered} (target {target})");
                self.motor.stop_all().context("stopping at target")?;
                Direction::Stop
            }
            Direction::Down if filtered <= upper_edge => {
                info!("[Motion] arrived at {filtered} (target {target})");
                self.motor.stop_all().context("stopping at target")?;
                Direction::Stop
            }
            moving => moving,
        };

        match next {
            Direction::Up => self
                .motor
                .set_speed(VALVE_CHANNEL, self.config.speed)
                .context("raise command")?,
            Direction::Down => self
                .motor
                .set_speed(VALVE_CHANNEL, -self.config.speed)
                .context("lower command")?,
            Direction::Stop => {}
        }

        Ok(next)
    }

    /// Drains pending commands without blocking; the latest target wins and
    /// stale intermediates are discarded. A disconnected channel is treated
    /// as shutdown so an orphaned controller cannot keep the motor powered.
    fn poll_commands(&mut self, target: &mut Option<i32>) -> Intake {
        let mut latest: Option<i32> = None;
        loop {
            match self.rx.try_recv() {
                Ok(Command::MoveTo(t)) => latest = Some(t),
                Ok(Command::Shutdown) => {
                    info!("[Motion] shutdown requested");
                    return Intake::Shutdown;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    warn!("[Motion] command channel dropped, shutting down");
                    return Intake::Shutdown;
                }
            }
        }
        if let Some(t) = latest {
            if *target != Some(t) {
                debug!("[Motion] new target {t}");
            }
            *target = Some(t);
        }
        Intake::Continue
    }

    fn tick(&self, direction: Direction) -> std::time::Duration {
        match direction {
            Direction::Stop => self.config.idle_tick,
            _ => self.config.moving_tick,
        }
    }
}

fn direction_label(direction: Direction) -> &'static str {
    match direction {
        Direction::Up => "up",
        Direction::Down => "down",
        Direction::Stop => "stop",
    }
}

/// Spawns the controller on a named, max-priority thread. Failing to raise
/// the priority is logged and tolerated; the loop still runs.
pub fn spawn<M, P>(controller: MotionController<M, P>) -> thread::JoinHandle<Result<()>>
where
    M: MotorDriver + Send + 'static,
    P: PositionSensor + Send + 'static,
{
    thread::Builder::new()
        .name("motion".to_string())
        .spawn_with_priority(ThreadPriority::Max, move |priority| {
            if let Err(e) = priority {
                warn!("[Motion] could not raise thread priority: {e:?}");
            }
            let result = controller.run();
            if let Err(e) = &result {
                error!("[Motion] controller failed: {e:#}");
            }
            result
        })
        .expect("failed to spawn motion thread")
}
