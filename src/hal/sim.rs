//! Software models of the valve hardware for the demo binary and tests.
//!
//! A single shared [`ValveState`] couples the three models: the motor driver
//! writes a speed, the position sensor integrates it into a position (with ADC
//! noise), and the climate model heats the room according to how far the valve
//! is open. Lower positions open the valve wider, which is why the default PID
//! gains are negative.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use parking_lot::Mutex;
use rand::random_range;

use super::{Channel, ClimateReading, ClimateSensor, MotorDriver, PositionSensor, VALVE_CHANNEL};

/// Hard end stops of the linear actuator (ADC counts).
pub const SIM_MIN_POS: i32 = 1034;
pub const SIM_MAX_POS: i32 = 24600;

/// Actuator travel in ADC counts per speed-unit-second. At full speed (100)
/// the valve traverses its whole range in roughly 30 seconds.
const TRAVEL_PER_SPEED_UNIT: f64 = 8.0;

#[derive(Debug)]
pub struct ValveState {
    position: f64,
    speed: i32,
    enabled: bool,
    last_step: Instant,
}

impl ValveState {
    fn step(&mut self) {
        let now = Instant::now();
        let dt = now.duration_since(self.last_step).as_secs_f64();
        self.last_step = now;
        if self.enabled && self.speed != 0 {
            self.position += self.speed as f64 * TRAVEL_PER_SPEED_UNIT * dt;
            self.position = self.position.clamp(SIM_MIN_POS as f64, SIM_MAX_POS as f64);
        }
    }

    /// 0.0 = fully closed (position at upper stop), 1.0 = fully open.
    fn opening(&self) -> f64 {
        1.0 - (self.position - SIM_MIN_POS as f64) / (SIM_MAX_POS - SIM_MIN_POS) as f64
    }
}

pub type SharedValve = Arc<Mutex<ValveState>>;

/// Creates the shared valve state at the given starting position.
pub fn valve_at(position: i32) -> SharedValve {
    Arc::new(Mutex::new(ValveState {
        position: position as f64,
        speed: 0,
        enabled: false,
        last_step: Instant::now(),
    }))
}

/// Simulated dual MC33926-style driver. Only the valve channel moves anything.
pub struct SimMotor {
    valve: SharedValve,
}

impl SimMotor {
    pub fn new(valve: SharedValve) -> Self {
        Self { valve }
    }
}

impl MotorDriver for SimMotor {
    fn enable(&mut self) -> Result<()> {
        let mut v = self.valve.lock();
        v.step();
        v.enabled = true;
        Ok(())
    }

    fn disable(&mut self) -> Result<()> {
        let mut v = self.valve.lock();
        v.step();
        v.enabled = false;
        v.speed = 0;
        Ok(())
    }

    fn set_speed(&mut self, channel: Channel, speed: i32) -> Result<()> {
        let mut v = self.valve.lock();
        v.step();
        if channel == VALVE_CHANNEL {
            v.speed = speed;
        }
        Ok(())
    }

    fn stop_all(&mut self) -> Result<()> {
        let mut v = self.valve.lock();
        v.step();
        v.speed = 0;
        Ok(())
    }
}

/// Simulated feedback potentiometer: true position plus a few counts of noise.
pub struct SimPositionSensor {
    valve: SharedValve,
    noise: i32,
}

impl SimPositionSensor {
    pub fn new(valve: SharedValve) -> Self {
        Self { valve, noise: 3 }
    }

    pub fn noiseless(valve: SharedValve) -> Self {
        Self { valve, noise: 0 }
    }
}

impl PositionSensor for SimPositionSensor {
    fn read(&mut self) -> Result<i32> {
        let mut v = self.valve.lock();
        v.step();
        let jitter = if self.noise > 0 {
            random_range(-self.noise..=self.noise)
        } else {
            0
        };
        Ok(v.position.round() as i32 + jitter)
    }
}

/// Simulated room: temperature relaxes toward an equilibrium set by the valve
/// opening, humidity wanders slowly.
pub struct SimClimate {
    valve: SharedValve,
    temperature: f64,
    humidity: f64,
    last_read: Instant,
}

impl SimClimate {
    pub fn new(valve: SharedValve, start_temperature: f64) -> Self {
        Self {
            valve,
            temperature: start_temperature,
            humidity: 45.0,
            last_read: Instant::now(),
        }
    }
}

impl ClimateSensor for SimClimate {
    fn read(&mut self) -> Result<ClimateReading> {
        let now = Instant::now();
        let dt = now.duration_since(self.last_read).as_secs_f64();
        self.last_read = now;

        let opening = {
            let mut v = self.valve.lock();
            v.step();
            v.opening()
        };

        // Equilibrium spans ~14 °C (valve closed) to ~26 °C (fully open);
        // relaxation constant keeps the room well slower than the control loop.
        let equilibrium = 14.0 + 12.0 * opening;
        self.temperature += (equilibrium - self.temperature) * (0.02 * dt).min(1.0);
        self.temperature += random_range(-0.05..0.05);

        self.humidity = (self.humidity + random_range(-0.2..0.2)).clamp(30.0, 60.0);

        Ok(ClimateReading {
            temperature: self.temperature,
            humidity: self.humidity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn valve_integrates_speed_while_enabled() {
        let valve = valve_at(8000);
        let mut motor = SimMotor::new(valve.clone());
        let mut sensor = SimPositionSensor::noiseless(valve);

        motor.enable().unwrap();
        motor.set_speed(VALVE_CHANNEL, 100).unwrap();
        thread::sleep(Duration::from_millis(50));
        let pos = sensor.read().unwrap();
        assert!(pos > 8000, "valve should have moved up, got {pos}");

        motor.stop_all().unwrap();
        let settled = sensor.read().unwrap();
        thread::sleep(Duration::from_millis(30));
        let later = sensor.read().unwrap();
        assert_eq!(settled, later);
    }

    #[test]
    fn valve_ignores_speed_while_disabled() {
        let valve = valve_at(8000);
        let mut motor = SimMotor::new(valve.clone());
        let mut sensor = SimPositionSensor::noiseless(valve);

        motor.set_speed(VALVE_CHANNEL, 100).unwrap();
        thread::sleep(Duration::from_millis(40));
        assert_eq!(sensor.read().unwrap(), 8000);
    }

    #[test]
    fn position_clamped_to_end_stops() {
        let valve = valve_at(SIM_MAX_POS - 1);
        let mut motor = SimMotor::new(valve.clone());
        let mut sensor = SimPositionSensor::noiseless(valve);

        motor.enable().unwrap();
        motor.set_speed(VALVE_CHANNEL, 100).unwrap();
        thread::sleep(Duration::from_millis(40));
        assert!(sensor.read().unwrap() <= SIM_MAX_POS);
    }
}
