//! Gravity, landing and the step-up slot.

use glam::Vec3;
use strider_kernel::{PhysicsWorld, SweepFilter, SweepHit};

use crate::proxy::CollisionProxy;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VerticalStepper;

impl VerticalStepper {
    /// Runs before the horizontal move. Stepping up is currently a no-op;
    /// low obstacles are handled by sliding.
    pub fn step_up(&self, _position: &mut Vec3, _step_height: f32) {}

    /// Apply gravity to `fall_velocity` and move down, landing on walkable ground.
    ///
    /// Only surfaces whose normal is within the slope limit of straight up
    /// can stop the fall. Returns the supporting hit on landing.
    pub fn step_down(
        &self,
        world: &dyn PhysicsWorld,
        proxy: &CollisionProxy,
        position: &mut Vec3,
        fall_velocity: &mut Vec3,
        cos_slope_angle: f32,
        dt: f32,
    ) -> Option<SweepHit> {
        *fall_velocity += world.gravity() * dt;
        let target = *position + *fall_velocity;

        let filter = SweepFilter::new(Vec3::Y, cos_slope_angle);
        match proxy.sweep(world, *position, target, &filter) {
            Some(hit) => {
                *position = position.lerp(target, hit.fraction);
                *fall_velocity = Vec3::ZERO;
                tracing::debug!(fraction = hit.fraction, object = ?hit.object, "landed");
                Some(hit)
            }
            None => {
                *position = target;
                None
            }
        }
    }
}
