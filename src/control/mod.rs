//! Control side of the system: PID setpoint engine, schedule evaluation and
//! the fixed-cadence orchestration cycle.

pub mod cycle;
pub mod pid;
pub mod schedule;

pub use cycle::ControlLoop;
pub use pid::SetpointPid;
