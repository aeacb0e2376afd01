//! Persisted tunables and the day schedule.
//!
//! The control core consumes these through traits: the configuration web UI and
//! whatever database backs it live in a separate process. `MemorySettingsStore`
//! serves tests and embedding; `JsonSettingsStore` persists to disk for the
//! standalone binary.

pub mod file;
pub mod memory;

use anyhow::Result;
use serde::{Deserialize, Serialize};

pub use file::{JsonScheduleStore, JsonSettingsStore};
pub use memory::{MemoryScheduleStore, MemorySettingsStore};

/// The single persisted settings record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Desired room temperature (°C).
    pub target_temp: f64,
    /// Last commanded actuator position; used to resume without a jump.
    pub last_position: i32,
    /// Whether automatic control is active.
    pub enabled: bool,
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    /// Hard clamp for PID output (ADC counts).
    pub lower: i32,
    pub upper: i32,
    /// Deadband around a target inside which the actuator is "arrived".
    pub pos_margin: i32,
    /// Nonzero = operator-requested one-shot move; reset to 0 once honored.
    pub manual_position: i32,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            target_temp: 22.0,
            last_position: 8000,
            enabled: true,
            kp: -5.0,
            ki: -0.01,
            kd: -0.1,
            lower: 1034,
            upper: 24600,
            pos_margin: 50,
            manual_position: 0,
        }
    }
}

impl Settings {
    /// Restores the record invariants: ordered bounds, `last_position` inside
    /// them, non-negative margin. External writers are not trusted to hold
    /// these.
    pub fn normalized(mut self) -> Self {
        if self.lower > self.upper {
            std::mem::swap(&mut self.lower, &mut self.upper);
        }
        self.last_position = self.last_position.clamp(self.lower, self.upper);
        self.pos_margin = self.pos_margin.max(0);
        self
    }
}

/// Snapshot reads plus the three field writes the control loop performs.
/// Implementations create a default record on first use.
pub trait SettingsStore {
    fn load(&self) -> Result<Settings>;
    fn set_last_position(&self, position: i32) -> Result<()>;
    fn set_target_temp(&self, target: f64) -> Result<()>;
    fn clear_manual_position(&self) -> Result<()>;
}

/// Raw schedule rows `("HH:MM", target °C)`. Read-only from the core; the
/// configuration UI replaces rows wholesale. Parsing and ordering happen in
/// `control::schedule` so a malformed row never poisons the store.
pub trait ScheduleStore {
    fn rows(&self) -> Result<Vec<(String, f64)>>;
}
