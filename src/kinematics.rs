// src/kinematics.rs - Discrete-time bang-bang motor stepping
use crate::registry::{Motor, Registry};

/// Acceleration applied to a motor for one tick, in preference order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Thrust {
    /// `+A`, towards increasing position.
    Forward,
    /// `-A`, towards decreasing position.
    Reverse,
    /// No acceleration.
    Coast,
}

const CANDIDATES: [Thrust; 3] = [Thrust::Forward, Thrust::Reverse, Thrust::Coast];

impl Thrust {
    fn acceleration(self, magnitude: f64) -> f64 {
        match self {
            Thrust::Forward => magnitude,
            Thrust::Reverse => -magnitude,
            Thrust::Coast => 0.0,
        }
    }
}

/// Next (velocity, position) of `motor` under `thrust` after `dt` seconds.
pub fn project(motor: &Motor, thrust: Thrust, dt: f64) -> (f64, f64) {
    let a = thrust.acceleration(motor.acceleration);
    let velocity = motor.velocity + a * dt;
    let position = motor.position + motor.velocity * dt + a * dt * dt / 2.0;
    (velocity, position)
}

/// Advances one motor by one tick.
///
/// Evaluates forward, reverse and coast and commits whichever lands closest to the
/// target; equal distances keep the earlier candidate. This is a one-step lookahead,
/// so a motor can overshoot and oscillate around its target. `max_speed` is not
/// applied.
pub fn step(motor: &mut Motor, dt: f64) -> Thrust {
    let mut best = CANDIDATES[0];
    let (mut best_v, mut best_p) = project(motor, best, dt);
    let mut best_dist = (motor.target - best_p).abs();

    for &thrust in &CANDIDATES[1..] {
        let (v, p) = project(motor, thrust, dt);
        let dist = (motor.target - p).abs();
        if dist < best_dist {
            best = thrust;
            best_v = v;
            best_p = p;
            best_dist = dist;
        }
    }

    motor.velocity = best_v;
    motor.position = best_p;
    best
}

/// Advances every motor in the registry by one tick.
pub fn advance(registry: &mut Registry, dt: f64) {
    for (name, motor) in registry.motors_mut() {
        let thrust = step(motor, dt);
        tracing::trace!(
            "Motor '{}': {:?} -> P={} V={}",
            name,
            thrust,
            motor.position,
            motor.velocity
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    fn motor(s: f64, a: f64, tp: f64) -> Motor {
        Motor {
            max_speed: s,
            acceleration: a,
            position: 0.0,
            target: tp,
            velocity: 0.0,
        }
    }

    #[test]
    fn test_single_tick_accelerates_toward_target() {
        let mut m = motor(1.0, 1.0, 10.0);
        assert_eq!(step(&mut m, 0.1), Thrust::Forward);
        assert!((m.position - 0.005).abs() < EPS);
        assert!((m.velocity - 0.1).abs() < EPS);
    }

    #[test]
    fn test_reverse_when_target_below() {
        let mut m = motor(1.0, 2.0, -5.0);
        assert_eq!(step(&mut m, 0.1), Thrust::Reverse);
        assert!((m.position + 0.01).abs() < EPS);
        assert!((m.velocity + 0.2).abs() < EPS);
    }

    #[test]
    fn test_coast_when_already_on_course() {
        let mut m = motor(1.0, 1.0, 0.1);
        m.velocity = 1.0;
        assert_eq!(step(&mut m, 0.1), Thrust::Coast);
        assert_eq!(m.position, 0.1);
        assert_eq!(m.velocity, 1.0);
    }

    #[test]
    fn test_tie_prefers_forward() {
        let mut m = motor(1.0, 0.0, 10.0);
        m.velocity = 0.5;
        assert_eq!(step(&mut m, 0.1), Thrust::Forward);
        assert_eq!(m.velocity, 0.5);
        assert!((m.position - 0.05).abs() < EPS);
    }

    #[test]
    fn test_max_speed_not_enforced() {
        let mut m = motor(0.01, 1.0, 100.0);
        for _ in 0..10 {
            step(&mut m, 0.1);
        }
        assert!(m.velocity > m.max_speed);
    }

    #[test]
    fn test_distance_non_increasing_while_approaching() {
        // 30 ticks of full acceleration cover 4.5 au, short of the target.
        let mut m = motor(1.0, 1.0, 10.0);
        let mut last = (m.target - m.position).abs();
        for _ in 0..30 {
            step(&mut m, 0.1);
            let dist = (m.target - m.position).abs();
            assert!(dist <= last);
            last = dist;
        }
    }

    #[test]
    fn test_stays_near_target_once_reached() {
        let mut m = motor(1.0, 1.0, 0.0);
        for _ in 0..100 {
            step(&mut m, 0.1);
        }
        assert_eq!(m.position, 0.0);
        assert_eq!(m.velocity, 0.0);
    }
}
