//! Gauge snapshot shared between the control loop, the motion thread and the
//! HTTP exposition endpoint. The core only ever sets values; scrapers read
//! them out as Prometheus text format.

use std::fmt::Write as _;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default, Clone)]
pub struct Metrics {
    /// Room temperature (°C) and relative humidity (%).
    pub temperature: f64,
    pub humidity: f64,
    /// Current PID setpoint (°C).
    pub target_temp: f64,
    /// Last position target handed to the motion controller.
    pub desired_position: f64,
    /// Filtered position estimate from the motion controller.
    pub actual_position: f64,
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    /// Computed PID contributions.
    pub term_p: f64,
    pub term_i: f64,
    pub term_d: f64,
    /// Automatic control on/off, exposed as an enum-style gauge.
    pub heating_on: bool,
    pub cycles: u64,
}

impl Metrics {
    /// Renders the snapshot in Prometheus text exposition format.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(1024);

        let mut gauge = |name: &str, help: &str, value: f64| {
            let _ = writeln!(out, "# HELP {name} {help}");
            let _ = writeln!(out, "# TYPE {name} gauge");
            let _ = writeln!(out, "{name} {value}");
        };

        gauge("temp", "Temperature C", self.temperature);
        gauge("humid", "Humidity %", self.humidity);
        gauge("target", "Target C", self.target_temp);
        gauge("desired_position", "Commanded valve position", self.desired_position);
        gauge("actual_position", "Filtered valve position", self.actual_position);
        gauge("pid_kp", "Proportional gain", self.kp);
        gauge("pid_ki", "Integral gain", self.ki);
        gauge("pid_kd", "Derivative gain", self.kd);
        gauge("pid_p", "Proportional term", self.term_p);
        gauge("pid_i", "Integral term", self.term_i);
        gauge("pid_d", "Derivative term", self.term_d);
        gauge("cycles", "Control cycles completed", self.cycles as f64);

        let _ = writeln!(out, "# HELP onoff Heating");
        let _ = writeln!(out, "# TYPE onoff gauge");
        let _ = writeln!(out, "onoff{{state=\"on\"}} {}", u8::from(self.heating_on));
        let _ = writeln!(out, "onoff{{state=\"off\"}} {}", u8::from(!self.heating_on));

        out
    }
}

pub type SharedMetrics = Arc<Mutex<Metrics>>;

pub fn shared() -> SharedMetrics {
    Arc::new(Mutex::new(Metrics::default()))
}

/// Locks the shared snapshot, recovering from a poisoned mutex: a panicked
/// writer must not take the exposition endpoint down with it.
pub fn lock(metrics: &SharedMetrics) -> MutexGuard<'_, Metrics> {
    match metrics.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
