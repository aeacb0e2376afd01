//! PID setpoint engine: converts temperature error into a desired valve
//! position.
//!
//! Output is clamped to the configured position bounds, the proportional term
//! acts on the measurement (setpoint steps do not kick the valve), and the
//! derivative acts on the error. Gains for a radiator valve are negative: the
//! valve opens as the position decreases.
//!
//! Two behaviours matter more than the arithmetic:
//! - **Sample-time gating**: the engine recomputes at most once per
//!   `sample_time`; calls inside the window return the previous output
//!   unchanged. The control loop cycles at 0.5 s while the engine defaults to
//!   a 10 s sample time.
//! - **Auto-mode rebase**: re-enabling seeds the internal state from the
//!   persisted last position, so the first output after an off/on cycle is
//!   exactly the position the valve was left at. Disabling freezes the engine;
//!   `compute` returns `None` and the caller leaves the valve alone.

use std::time::{Duration, Instant};

/// Default recompute interval, matching the persisted tunables' cadence.
pub const UPDATE_RATE: Duration = Duration::from_secs(10);

#[derive(Debug)]
pub struct SetpointPid {
    kp: f64,
    ki: f64,
    kd: f64,
    setpoint: f64,
    out_min: f64,
    out_max: f64,
    sample_time: Duration,
    auto_mode: bool,

    proportional: f64,
    integral: f64,
    derivative: f64,
    last_output: Option<f64>,
    last_input: Option<f64>,
    last_error: Option<f64>,
    last_time: Option<Instant>,
}

impl SetpointPid {
    /// Engine starts disabled; the first settings sync enables it with a
    /// rebase to the persisted position.
    pub fn new(kp: f64, ki: f64, kd: f64, setpoint: f64, bounds: (i32, i32)) -> Self {
        Self {
            kp,
            ki,
            kd,
            setpoint,
            out_min: bounds.0 as f64,
            out_max: bounds.1 as f64,
            sample_time: UPDATE_RATE,
            auto_mode: false,
            proportional: 0.0,
            integral: 0.0,
            derivative: 0.0,
            last_output: None,
            last_input: None,
            last_error: None,
            last_time: None,
        }
    }

    pub fn with_sample_time(mut self, sample_time: Duration) -> Self {
        self.sample_time = sample_time;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.auto_mode
    }

    pub fn setpoint(&self) -> f64 {
        self.setpoint
    }

    pub fn tunings(&self) -> (f64, f64, f64) {
        (self.kp, self.ki, self.kd)
    }

    /// Current P/I/D contributions, for the metrics sink.
    pub fn terms(&self) -> (f64, f64, f64) {
        (self.proportional, self.integral, self.derivative)
    }

    /// Retune in place; the integral term is deliberately preserved so a gain
    /// tweak does not jolt the valve.
    pub fn set_tunings(&mut self, kp: f64, ki: f64, kd: f64) {
        self.kp = kp;
        self.ki = ki;
        self.kd = kd;
    }

    pub fn set_setpoint(&mut self, setpoint: f64) {
        self.setpoint = setpoint;
    }

    pub fn set_output_limits(&mut self, bounds: (i32, i32)) {
        self.out_min = bounds.0 as f64;
        self.out_max = bounds.1 as f64;
        self.integral = self.clamp(self.integral);
        self.last_output = self.last_output.map(|o| self.clamp(o));
    }

    /// Enable/disable automatic control. On the disabled→enabled edge the
    /// internal state is re-seeded so the next output equals `last_position`;
    /// disabling freezes the engine without touching its terms.
    pub fn set_auto_mode(&mut self, enabled: bool, last_position: f64) {
        if enabled && !self.auto_mode {
            let seed = self.clamp(last_position);
            self.proportional = 0.0;
            self.integral = seed;
            self.derivative = 0.0;
            self.last_input = None;
            self.last_error = None;
            self.last_output = Some(seed);
            self.last_time = Some(Instant::now());
        }
        self.auto_mode = enabled;
    }

    /// Computes the desired position for the measured temperature, or `None`
    /// while disabled. Inside the sample-time window the previous output is
    /// returned unchanged.
    pub fn compute(&mut self, input: f64) -> Option<f64> {
        if !self.auto_mode {
            return None;
        }

        let now = Instant::now();
        let dt = match self.last_time {
            Some(t) => now.duration_since(t),
            None => self.sample_time,
        };
        if let Some(out) = self.last_output {
            if dt < self.sample_time {
                return Some(out);
            }
        }
        let dt_s = dt.as_secs_f64().max(1e-9);

        let error = self.setpoint - input;
        let d_input = input - self.last_input.unwrap_or(input);
        let d_error = error - self.last_error.unwrap_or(error);

        self.proportional -= self.kp * d_input;
        self.integral = self.clamp(self.integral + self.ki * error * dt_s);
        self.derivative = self.kd * d_error / dt_s;

        let output = self.clamp(self.proportional + self.integral + self.derivative);

        self.last_output = Some(output);
        self.last_input = Some(input);
        self.last_error = Some(error);
        self.last_time = Some(now);
        Some(output)
    }

    fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.out_min, self.out_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_pid() -> SetpointPid {
        SetpointPid::new(-5.0, -0.01, -0.1, 22.0, (1034, 24600))
            .with_sample_time(Duration::ZERO)
    }

    #[test]
    fn disabled_engine_produces_nothing() {
        let mut pid = fast_pid();
        assert_eq!(pid.compute(20.0), None);
    }

    #[test]
    fn rebase_on_enable_returns_stored_position_exactly() {
        // Default 10 s sample time: the first compute after enabling is served
        // from the seeded output.
        let mut pid = SetpointPid::new(-5.0, -0.01, -0.1, 22.0, (1034, 24600));
        pid.set_auto_mode(true, 8000.0);
        assert_eq!(pid.compute(18.0), Some(8000.0));
    }

    #[test]
    fn rebase_seed_is_clamped_to_bounds() {
        let mut pid = SetpointPid::new(-5.0, -0.01, -0.1, 22.0, (1034, 24600));
        pid.set_auto_mode(true, 90_000.0);
        assert_eq!(pid.compute(22.0), Some(24600.0));
    }

    #[test]
    fn output_at_setpoint_converges_within_bounds() {
        let mut pid = fast_pid();
        pid.set_auto_mode(true, 8000.0);
        let mut last = pid.compute(22.0).unwrap();
        for _ in 0..200 {
            let out = pid.compute(22.0).unwrap();
            assert!((1034.0..=24600.0).contains(&out));
            // error is zero, so only the (zero-growth) integral remains
            assert!((out - last).abs() < 1.0);
            last = out;
        }
    }

    #[test]
    fn sample_time_gates_recomputation() {
        let mut pid = SetpointPid::new(-5.0, -0.01, -0.1, 22.0, (1034, 24600))
            .with_sample_time(Duration::from_secs(3600));
        pid.set_auto_mode(true, 8000.0);
        let first = pid.compute(18.0).unwrap();
        // temperature swings wildly, output must not budge inside the window
        assert_eq!(pid.compute(30.0), Some(first));
        assert_eq!(pid.compute(-10.0), Some(first));
    }

    #[test]
    fn disabling_freezes_and_reenabling_rebases() {
        let mut pid = fast_pid();
        pid.set_auto_mode(true, 8000.0);
        for _ in 0..10 {
            pid.compute(18.0);
        }
        pid.set_auto_mode(false, 0.0);
        assert_eq!(pid.compute(18.0), None);

        let mut pid2 = SetpointPid::new(-5.0, -0.01, -0.1, 22.0, (1034, 24600));
        pid2.set_auto_mode(true, 4321.0);
        assert_eq!(pid2.compute(18.0), Some(4321.0));
    }

    #[test]
    fn retune_preserves_integral() {
        let mut pid = fast_pid();
        pid.set_auto_mode(true, 8000.0);
        for _ in 0..5 {
            pid.compute(18.0);
        }
        let (_, integral_before, _) = pid.terms();
        pid.set_tunings(-8.0, -0.05, -0.2);
        pid.set_setpoint(21.0);
        let (_, integral_after, _) = pid.terms();
        assert_eq!(integral_before, integral_after);
    }

    #[test]
    fn tightened_limits_clamp_state() {
        let mut pid = fast_pid();
        pid.set_auto_mode(true, 20_000.0);
        pid.set_output_limits((1034, 10_000));
        let (_, integral, _) = pid.terms();
        assert!(integral <= 10_000.0);
        let out = pid.compute(22.0).unwrap();
        assert!(out <= 10_000.0);
    }

    #[test]
    fn cold_room_with_negative_gains_drives_position_down() {
        // Room below setpoint: negative gains push the output below the seed,
        // i.e. toward the open end of the valve.
        let mut pid = fast_pid();
        pid.set_auto_mode(true, 8000.0);
        pid.compute(22.0);
        let mut out = 8000.0;
        for _ in 0..50 {
            out = pid.compute(16.0).unwrap();
        }
        assert!(out < 8000.0, "expected output below seed, got {out}");
    }
}
