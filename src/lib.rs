//! Closed-loop valve temperature controller.
//!
//! A climate sensor feeds a PID setpoint engine that computes a desired valve
//! position; an independent motion thread drives a linear actuator toward that
//! position using feedback from a position sensor. The two halves communicate
//! over a one-directional command channel.
//!
//! ## Architecture
//! - **Control loop** (`control::cycle`): fixed 0.5 s cadence; reads temperature,
//!   runs the PID engine, reconciles persisted settings and the day schedule,
//!   enqueues position targets.
//! - **Motion controller** (`actuator::motion`): own thread; hysteresis +
//!   debounce state machine over filtered position readings, 20 ms ticks while
//!   moving, 200 ms while stopped.
//! - **Stores** (`store`): persisted tunables and the time-of-day schedule,
//!   behind traits so the web UI / database live outside this crate.
//! - **Monitor** (`monitor`): gauge snapshot served in Prometheus text format,
//!   plus a lock-free per-tick motion sample recorder (CSV).

pub mod actuator;
pub mod control;
pub mod hal;
pub mod monitor;
pub mod store;
