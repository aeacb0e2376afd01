//! Fixed-cadence control loop.
//!
//! One cycle every 0.5 s: read the climate sensor, let the PID engine compute
//! a desired valve position (it gates itself to a 10 s sample time), enqueue
//! the target to the motion controller when it changed, republish gauges,
//! reconcile the persisted settings, and — on a coarser 60 s cadence —
//! evaluate the day schedule.
//!
//! The loop owns the settings store connection and the PID engine; nothing
//! else touches either. The motion controller is reached exclusively through
//! the one-directional command channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::{Local, NaiveTime};
use crossbeam::channel::Sender;
use log::{info, warn};
use spin_sleep::{SpinSleeper, SpinStrategy};

use crate::actuator::Command;
use crate::hal::ClimateSensor;
use crate::monitor::{SharedMetrics, lock};
use crate::store::{ScheduleStore, Settings, SettingsStore};

use super::pid::SetpointPid;
use super::schedule;

/// Target cycle period.
pub const CYCLE_PERIOD: Duration = Duration::from_millis(500);
/// How often the schedule is re-evaluated.
pub const SCHEDULE_PERIOD: Duration = Duration::from_secs(60);

pub struct ControlLoop<C, S, H>
where
    C: ClimateSensor,
    S: SettingsStore,
    H: ScheduleStore,
{
    climate: C,
    settings_store: S,
    schedule_store: H,
    pid: SetpointPid,
    tx: Sender<Command>,
    metrics: SharedMetrics,
    /// Last known good settings snapshot; kept when the store is unreachable.
    settings: Settings,
    active_entry: Option<NaiveTime>,
    last_schedule_eval: Option<Instant>,
    period: Duration,
    schedule_period: Duration,
}

impl<C, S, H> ControlLoop<C, S, H>
where
    C: ClimateSensor,
    S: SettingsStore,
    H: ScheduleStore,
{
    /// Loads the settings snapshot and builds the engine. The PID starts
    /// disabled; the first cycle's settings sync enables it with a rebase to
    /// the persisted position, so there is no startup jump.
    pub fn new(
        climate: C,
        settings_store: S,
        schedule_store: H,
        tx: Sender<Command>,
        metrics: SharedMetrics,
    ) -> anyhow::Result<Self> {
        let settings = settings_store.load()?;
        let pid = SetpointPid::new(
            settings.kp,
            settings.ki,
            settings.kd,
            settings.target_temp,
            (settings.lower, settings.upper),
        );
        Ok(Self {
            climate,
            settings_store,
            schedule_store,
            pid,
            tx,
            metrics,
            settings,
            active_entry: None,
            last_schedule_eval: None,
            period: CYCLE_PERIOD,
            schedule_period: SCHEDULE_PERIOD,
        })
    }

    #[cfg(test)]
    fn with_timing(mut self, period: Duration, schedule_period: Duration) -> Self {
        self.period = period;
        self.schedule_period = schedule_period;
        self
    }

    #[cfg(test)]
    fn with_pid_sample_time(mut self, sample_time: Duration) -> Self {
        self.pid = SetpointPid::new(
            self.settings.kp,
            self.settings.ki,
            self.settings.kd,
            self.settings.target_temp,
            (self.settings.lower, self.settings.upper),
        )
        .with_sample_time(sample_time);
        self
    }

    /// Runs cycles until the flag clears. Sleep is `period − elapsed` on a
    /// monotonic clock, so cumulative drift does not grow.
    pub fn run(&mut self, running: &AtomicBool) {
        info!("[Cycle] control loop started, period {:?}", self.period);
        let sleeper = SpinSleeper::new(100_000).with_spin_strategy(SpinStrategy::YieldThread);

        while running.load(Ordering::Relaxed) {
            let started = Instant::now();
            self.run_cycle(Local::now().time());
            sleeper.sleep(self.period.saturating_sub(started.elapsed()));
        }
        info!("[Cycle] control loop stopped");
    }

    /// One full cycle; split out so tests can step the loop synchronously.
    pub fn run_cycle(&mut self, now: NaiveTime) {
        self.read_and_regulate();
        self.publish_gauges();
        self.sync_settings();
        self.eval_schedule(now);
        lock(&self.metrics).cycles += 1;
    }

    /// Sensor read plus PID computation. A failed or implausible reading
    /// skips the dependent computation: prior state is kept and the actuator
    /// is not moved.
    fn read_and_regulate(&mut self) {
        let reading = match self.climate.read() {
            Ok(r) if r.is_plausible() => r,
            Ok(r) => {
                warn!(
                    "[Cycle] implausible reading t={:.1} h={:.1}, skipping",
                    r.temperature, r.humidity
                );
                return;
            }
            Err(e) => {
                warn!("[Cycle] climate read failed, skipping: {e:#}");
                return;
            }
        };

        {
            let mut m = lock(&self.metrics);
            m.temperature = reading.temperature;
            m.humidity = reading.humidity;
        }

        if let Some(output) = self.pid.compute(reading.temperature) {
            let target = output.round() as i32;
            if target != self.settings.last_position {
                self.command_move(target);
            }
        }
    }

    /// Enqueues the new position, then persists it. A full channel leaves
    /// both the store and the in-memory position untouched, so the target is
    /// retried on the next cycle; persisting an undelivered command would
    /// rebase a restart to a position the valve never reached.
    fn command_move(&mut self, target: i32) {
        match self.tx.try_send(Command::MoveTo(target)) {
            Ok(()) => {
                if let Err(e) = self.settings_store.set_last_position(target) {
                    warn!("[Cycle] persisting position failed: {e:#}");
                }
                self.settings.last_position = target;
                lock(&self.metrics).desired_position = target as f64;
            }
            Err(e) => warn!("[Cycle] dropping target {target}, retrying next cycle: {e}"),
        }
    }

    /// Reloads the settings record and folds it into the engine: gains,
    /// setpoint and bounds retune in place, the on/off flag flips auto-mode
    /// only on an actual change, and a pending manual override is honored
    /// then cleared. An unreachable store keeps the last known snapshot.
    fn sync_settings(&mut self) {
        let incoming = match self.settings_store.load() {
            Ok(s) => s,
            Err(e) => {
                warn!("[Cycle] settings store unreachable, keeping last known: {e:#}");
                return;
            }
        };

        if incoming.enabled != self.pid.is_enabled() {
            info!(
                "[Cycle] automatic control {}",
                if incoming.enabled { "enabled" } else { "disabled" }
            );
            self.pid
                .set_auto_mode(incoming.enabled, incoming.last_position as f64);
        }
        self.pid
            .set_tunings(incoming.kp, incoming.ki, incoming.kd);
        self.pid.set_setpoint(incoming.target_temp);
        self.pid.set_output_limits((incoming.lower, incoming.upper));

        self.settings = incoming;
        if self.settings.manual_position != 0 {
            self.apply_manual_override();
        }
    }

    /// One-shot operator move: enqueue the (bounds-clamped) raw position,
    /// then reset the field. Read-then-clear is not transactional; a crash in
    /// between replays the same absolute move once on restart, which is
    /// harmless.
    fn apply_manual_override(&mut self) {
        let target = self
            .settings
            .manual_position
            .clamp(self.settings.lower, self.settings.upper);
        info!("[Cycle] manual override -> {target}");
        self.command_move(target);
        if let Err(e) = self.settings_store.clear_manual_position() {
            warn!("[Cycle] clearing manual override failed: {e:#}");
        }
        self.settings.manual_position = 0;
    }

    /// Coarse-cadence schedule evaluation. The remembered entry key
    /// suppresses redundant setpoint pushes; no entry active (before the
    /// earliest time of day) leaves the setpoint alone.
    fn eval_schedule(&mut self, now: NaiveTime) {
        if let Some(at) = self.last_schedule_eval {
            if at.elapsed() < self.schedule_period {
                return;
            }
        }
        self.last_schedule_eval = Some(Instant::now());

        let rows = match self.schedule_store.rows() {
            Ok(rows) => rows,
            Err(e) => {
                warn!("[Cycle] schedule store unreachable: {e:#}");
                return;
            }
        };
        let entries = schedule::parse_rows(&rows);

        match schedule::active_entry(&entries, now) {
            Some(entry) => {
                if self.active_entry != Some(entry.at) {
                    // Persist first: a setpoint applied without the store
                    // update would be reverted by the next settings sync, and
                    // the remembered entry would suppress the re-push. A
                    // failed persist leaves the entry unremembered so the
                    // push retries at the next evaluation.
                    match self.settings_store.set_target_temp(entry.target_temp) {
                        Ok(()) => {
                            info!("[Cycle] schedule {} -> {:.1}C", entry.at, entry.target_temp);
                            self.pid.set_setpoint(entry.target_temp);
                            self.settings.target_temp = entry.target_temp;
                            self.active_entry = Some(entry.at);
                        }
                        Err(e) => {
                            warn!("[Cycle] persisting scheduled target failed, retrying: {e:#}")
                        }
                    }
                }
            }
            None => self.active_entry = None,
        }
    }

    fn publish_gauges(&self) {
        let (kp, ki, kd) = self.pid.tunings();
        let (p, i, d) = self.pid.terms();
        let mut m = lock(&self.metrics);
        m.target_temp = self.pid.setpoint();
        m.desired_position = self.settings.last_position as f64;
        m.kp = kp;
        m.ki = ki;
        m.kd = kd;
        m.term_p = p;
        m.term_i = i;
        m.term_d = d;
        m.heating_on = self.pid.is_enabled();
    }
}
