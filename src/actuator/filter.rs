//! Position filter / rate limiter over the raw feedback readings.
//!
//! The potentiometer ADC jitters by a few counts and occasionally spikes. The
//! filter bounds how far the estimate may move per sample, with the slack
//! skewed toward the current direction of travel: genuine motion tracks with
//! little lag while a spike against the direction of travel is damped one
//! count harder. At rest a symmetric ±5 keeps the estimate pinned.

use super::Direction;

/// Symmetric per-sample slack while the actuator is stopped.
pub const IDLE_STEP: i32 = 5;

#[derive(Debug)]
pub struct PositionFilter {
    estimate: Option<i32>,
    moving_step: i32,
}

impl PositionFilter {
    pub fn new(moving_step: i32) -> Self {
        Self {
            estimate: None,
            moving_step,
        }
    }

    /// Folds one raw sample into the estimate. The first sample seeds the
    /// estimate unmodified.
    pub fn apply(&mut self, raw: i32, direction: Direction) -> i32 {
        let prev = match self.estimate {
            Some(p) => p,
            None => {
                self.estimate = Some(raw);
                return raw;
            }
        };

        let (down_slack, up_slack) = match direction {
            Direction::Up => (self.moving_step - 1, self.moving_step),
            Direction::Down => (self.moving_step, self.moving_step - 1),
            Direction::Stop => (IDLE_STEP, IDLE_STEP),
        };

        let next = raw.clamp(prev - down_slack, prev + up_slack);
        self.estimate = Some(next);
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::random_range;

    #[test]
    fn first_sample_seeds_estimate() {
        let mut f = PositionFilter::new(20);
        assert_eq!(f.apply(8000, Direction::Stop), 8000);
    }

    #[test]
    fn idle_slack_is_symmetric_five() {
        let mut f = PositionFilter::new(20);
        f.apply(8000, Direction::Stop);
        assert_eq!(f.apply(9000, Direction::Stop), 8005);
        assert_eq!(f.apply(0, Direction::Stop), 8000);
    }

    #[test]
    fn moving_up_favours_upward_motion() {
        let mut f = PositionFilter::new(20);
        f.apply(8000, Direction::Up);
        // +20 with the direction of travel, only -19 against it
        assert_eq!(f.apply(9000, Direction::Up), 8020);
        assert_eq!(f.apply(0, Direction::Up), 8001);
    }

    #[test]
    fn moving_down_favours_downward_motion() {
        let mut f = PositionFilter::new(20);
        f.apply(8000, Direction::Down);
        assert_eq!(f.apply(0, Direction::Down), 7980);
        assert_eq!(f.apply(9000, Direction::Down), 7999);
    }

    #[test]
    fn step_bound_holds_for_random_input() {
        let mut f = PositionFilter::new(20);
        let mut prev = f.apply(random_range(0..25000), Direction::Stop);
        for i in 0..5000 {
            let dir = match i % 3 {
                0 => Direction::Up,
                1 => Direction::Down,
                _ => Direction::Stop,
            };
            let next = f.apply(random_range(0..25000), dir);
            let max_step = match dir {
                Direction::Stop => IDLE_STEP,
                _ => 20,
            };
            assert!(
                (next - prev).abs() <= max_step,
                "estimate jumped {} -> {} under {:?}",
                prev,
                next,
                dir
            );
            prev = next;
        }
    }

    #[test]
    fn steady_readings_pass_through() {
        let mut f = PositionFilter::new(20);
        f.apply(8000, Direction::Stop);
        for _ in 0..10 {
            assert_eq!(f.apply(8002, Direction::Stop), 8002);
        }
    }
}
