//! Local car state and per-tick publishing.
//!
//! The publisher is push-based and unthrottled beyond the caller's tick
//! cadence: every tick sends the full transform, no delta compression and
//! no dead reckoning. An absent connection is a no-op, never a fault.
//!
//! The kinematics here are intentionally simple; collision and track logic
//! belong to the presentation layer.

use race_shared::{
    math::Vec3,
    net::{NetMsg, ReliableConn, Transform},
};

/// Per-tick throttle gain.
pub const ACCELERATION: f32 = 0.1;
/// Forward speed cap.
pub const MAX_SPEED: f32 = 1.0;
/// Reverse speed cap (negative = backwards).
pub const MAX_REVERSE: f32 = -0.5;
/// Yaw change per tick while steering, radians.
pub const STEER_RATE: f32 = 0.08;
/// Rolling friction applied every tick.
pub const FRICTION: f32 = 0.98;
/// Extra damping while the handbrake is held.
pub const HANDBRAKE_DAMPING: f32 = 0.9;

/// Where the local car starts a session.
pub const LOCAL_SPAWN: Vec3 = Vec3::new(0.0, 0.5, -490.0);
/// Initial yaw, facing down the track.
pub const LOCAL_SPAWN_ROTATION: f32 = std::f32::consts::FRAC_PI_2;

/// Sampled user input for one tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputState {
    pub accelerate: bool,
    pub brake: bool,
    pub steer_left: bool,
    pub steer_right: bool,
    pub handbrake: bool,
}

/// The locally driven car.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalCar {
    pub transform: Transform,
    pub speed: f32,
}

impl LocalCar {
    /// A car at the session spawn point.
    pub fn spawn() -> Self {
        Self {
            transform: Transform::new(LOCAL_SPAWN, LOCAL_SPAWN_ROTATION),
            speed: 0.0,
        }
    }

    /// Advances one tick of kinematics from sampled input.
    pub fn step(&mut self, input: InputState) {
        if input.accelerate {
            self.speed = (self.speed + ACCELERATION).min(MAX_SPEED);
        }
        if input.brake {
            self.speed = (self.speed - ACCELERATION).max(MAX_REVERSE);
        }
        if input.steer_left {
            self.transform.rotation += STEER_RATE;
        }
        if input.steer_right {
            self.transform.rotation -= STEER_RATE;
        }
        if input.handbrake {
            self.speed *= HANDBRAKE_DAMPING;
        }
        self.speed *= FRICTION;

        // Move along the current heading; yaw 0 faces +z.
        let heading = Vec3::new(self.transform.rotation.sin(), 0.0, self.transform.rotation.cos());
        self.transform.position = self.transform.position + heading * self.speed;
    }
}

/// Emits the local transform each tick while a connection is active.
#[derive(Debug, Default)]
pub struct StatePublisher {
    published: u64,
}

impl StatePublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sends the full current transform. `None` means no connection is
    /// established yet (or it is gone); that is a quiet no-op.
    pub async fn publish(
        &mut self,
        conn: Option<&mut ReliableConn>,
        car: &LocalCar,
    ) -> anyhow::Result<()> {
        let Some(conn) = conn else {
            return Ok(());
        };
        conn.send(&NetMsg::PositionUpdate(car.transform)).await?;
        self.published += 1;
        Ok(())
    }

    /// Number of updates emitted so far.
    pub fn published(&self) -> u64 {
        self.published
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_matches_session_start() {
        let car = LocalCar::spawn();
        assert_eq!(car.transform.position, LOCAL_SPAWN);
        assert_eq!(car.transform.rotation, LOCAL_SPAWN_ROTATION);
        assert_eq!(car.speed, 0.0);
    }

    #[test]
    fn speed_is_capped_both_ways() {
        let mut car = LocalCar::spawn();
        for _ in 0..100 {
            car.step(InputState {
                accelerate: true,
                ..Default::default()
            });
        }
        assert!(car.speed <= MAX_SPEED);

        for _ in 0..200 {
            car.step(InputState {
                brake: true,
                ..Default::default()
            });
        }
        assert!(car.speed >= MAX_REVERSE);
    }

    #[test]
    fn coasting_decays_to_rest() {
        let mut car = LocalCar::spawn();
        car.speed = 1.0;
        for _ in 0..500 {
            car.step(InputState::default());
        }
        assert!(car.speed.abs() < 1e-3);
    }

    #[test]
    fn steering_changes_yaw_only() {
        let mut car = LocalCar::spawn();
        let yaw = car.transform.rotation;
        car.step(InputState {
            steer_left: true,
            ..Default::default()
        });
        assert!((car.transform.rotation - (yaw + STEER_RATE)).abs() < 1e-6);
    }

    #[tokio::test]
    async fn publish_without_connection_is_a_noop() {
        let mut publisher = StatePublisher::new();
        let car = LocalCar::spawn();
        publisher.publish(None, &car).await.unwrap();
        assert_eq!(publisher.published(), 0);
    }
}
