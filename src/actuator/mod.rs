//! Actuator side of the system: the motion controller thread and its position
//! filter. The control loop talks to it exclusively through [`Command`]s on a
//! bounded channel; there is no reverse channel.

pub mod filter;
pub mod motion;

use std::time::Duration;

/// Commands accepted by the motion controller. `Shutdown` makes the thread
/// stop the motor, release the driver and exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    MoveTo(i32),
    Shutdown,
}

/// Actuator travel direction. Transitions always pass through `Stop`; the
/// controller never reverses directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Stop,
}

/// Motion controller tunables. Defaults are the production values; tests
/// shrink the timings to keep the suite fast.
#[derive(Debug, Clone)]
pub struct MotionConfig {
    /// Deadband around the target inside which the valve is "arrived".
    pub margin: i32,
    /// Minimum dwell between leaving `Stop` twice, against motor chatter.
    pub debounce: Duration,
    /// Tick period while the motor is running.
    pub moving_tick: Duration,
    /// Tick period while stopped; coarse polling keeps bus load down.
    pub idle_tick: Duration,
    /// Magnitude of the full-speed motor command.
    pub speed: i32,
    /// Per-tick slack of the position filter while moving.
    pub filter_moving_step: i32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        MotionConfig {
            margin: 50,
            debounce: Duration::from_secs(2),
            moving_tick: Duration::from_millis(20),
            idle_tick: Duration::from_millis(200),
            speed: 100,
            filter_moving_step: 20,
        }
    }
}
