//! Hardware abstraction: motor driver, position sensor, climate sensor.
//!
//! The control core only ever talks to these traits. Real deployments implement
//! them over I2C/GPIO; `sim` provides software models for the demo binary and
//! the test suite.

pub mod sim;

use anyhow::Result;

/// Motor output channel on a dual-channel driver board. The valve actuator is
/// wired to channel 2 on the reference hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    M1,
    M2,
}

/// Channel the valve actuator is connected to.
pub const VALVE_CHANNEL: Channel = Channel::M2;

/// Dual-channel DC motor driver. Speed sign encodes direction; magnitude is
/// board-specific (full speed is whatever the caller configures).
pub trait MotorDriver {
    fn enable(&mut self) -> Result<()>;
    fn disable(&mut self) -> Result<()>;
    fn set_speed(&mut self, channel: Channel, speed: i32) -> Result<()>;
    /// Immediate zero-speed on all channels.
    fn stop_all(&mut self) -> Result<()>;
}

/// Raw actuator position from the feedback potentiometer ADC. Readings are
/// noisy; the motion controller filters them.
pub trait PositionSensor {
    fn read(&mut self) -> Result<i32>;
}

#[derive(Debug, Clone, Copy)]
pub struct ClimateReading {
    pub temperature: f64,
    pub humidity: f64,
}

impl ClimateReading {
    /// DHT22-class sensors report −40..80 °C and 0..100 %RH; anything outside
    /// is treated as a transient fault by the control loop.
    pub fn is_plausible(&self) -> bool {
        (-40.0..=80.0).contains(&self.temperature) && (0.0..=100.0).contains(&self.humidity)
    }
}

/// Combined temperature/humidity sensor. Reads may block on hardware I/O.
pub trait ClimateSensor {
    fn read(&mut self) -> Result<ClimateReading>;
}
