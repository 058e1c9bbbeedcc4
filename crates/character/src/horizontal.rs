//! Sweep-and-slide horizontal movement.

use glam::Vec3;
use strider_kernel::{PhysicsWorld, SweepFilter};

use crate::proxy::CollisionProxy;
use crate::velocity::ComposedVelocity;

const EPSILON: f32 = 1e-6;

/// Per-tick input to [`HorizontalMover::move_horizontal`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveRequest {
    pub velocity: ComposedVelocity,
    /// Normal of this tick's deepest penetration, if the proxy was colliding.
    pub contact: Option<Vec3>,
    /// Mass used to push dynamic objects out of the way.
    pub mass: f32,
    pub physics_enabled: bool,
    pub dt: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HorizontalMover {
    pub max_iterations: usize,
    /// Remaining sweep fraction below which the move is considered done.
    pub min_fraction: f32,
}

impl Default for HorizontalMover {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            min_fraction: 0.01,
        }
    }
}

impl HorizontalMover {
    /// Move `position` by the requested velocity, sliding along whatever it hits.
    ///
    /// Returns how many surfaces were slid along.
    pub fn move_horizontal(
        &self,
        world: &mut dyn PhysicsWorld,
        proxy: &CollisionProxy,
        position: &mut Vec3,
        request: &MoveRequest,
    ) -> usize {
        if request.velocity.is_zero() {
            return 0;
        }
        let motion = request.velocity.velocity() * request.dt;
        let heading = request.velocity.direction;
        let mut target = *position + motion;

        if !request.physics_enabled {
            *position = target;
            return 0;
        }

        // Still pushing into the surface we were just recovered from.
        if let Some(normal) = request.contact.filter(|n| heading.dot(*n) > 0.0) {
            target = slide_target(*position, target, normal);
        }

        let mut fraction = 1.0_f32;
        let mut slides = 0;
        for iteration in 0..self.max_iterations {
            if fraction <= self.min_fraction {
                break;
            }
            let filter = SweepFilter::new(*position - target, 0.0);
            let Some(hit) = proxy.sweep(world, *position, target, &filter) else {
                break;
            };
            fraction -= hit.fraction;

            if world.is_dynamic(hit.object) {
                world.apply_impulse(hit.object, -hit.normal * request.mass * motion.length());
            }

            target = slide_target(*position, target, hit.normal);
            slides += 1;
            tracing::debug!(iteration, fraction = hit.fraction, normal = ?hit.normal, "slide");

            let remaining = (target - *position).normalize_or_zero();
            if remaining.dot(heading) <= 0.0 {
                break;
            }
        }

        *position = target;
        slides
    }
}

/// Redirect the move `current..target` along the surface with `normal`.
///
/// Keeps the move's length and drops its component along `normal`: a slide,
/// not a bounce.
pub fn slide_target(current: Vec3, target: Vec3, normal: Vec3) -> Vec3 {
    let movement = target - current;
    let length = movement.length();
    if length <= EPSILON {
        return target;
    }
    let direction = movement / length;
    let reflected = (direction - 2.0 * direction.dot(normal) * normal).normalize_or_zero();
    let perpendicular = reflected - reflected.dot(normal) * normal;
    current + perpendicular * length
}
