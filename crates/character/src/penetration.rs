//! Pushes a proxy out of whatever it overlaps.

use glam::Vec3;
use strider_common::ObjectId;
use strider_kernel::{PhysicsWorld, WorldError};

/// Outcome of one recovery pass.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PenetrationPass {
    /// Any contact point had negative distance.
    pub penetrating: bool,
    /// Most negative distance seen this pass, `0.0` when clean.
    pub deepest: f32,
    /// Normal of the deepest contact, pointing from the proxy into the obstruction.
    pub normal: Option<Vec3>,
}

/// Outcome of a full recovery loop.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Recovery {
    /// The first pass found the proxy penetrating.
    pub collided: bool,
    /// Normal of the deepest contact from the latest pass that had one.
    pub normal: Option<Vec3>,
    pub passes: usize,
    /// Still penetrating after the last allowed pass.
    pub unresolved: bool,
    /// Depth left by the last pass, `0.0` when clean.
    pub residual: f32,
}

/// Iterative, partial-correction penetration recovery.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PenetrationResolver {
    pub max_passes: usize,
    /// Share of each contact's depth corrected per pass.
    pub recovery_factor: f32,
}

impl Default for PenetrationResolver {
    fn default() -> Self {
        Self {
            max_passes: 5,
            recovery_factor: 0.2,
        }
    }
}

impl PenetrationResolver {
    /// One pass over every overlapping pair.
    ///
    /// The corrected position is written back to the proxy, so the next pass
    /// re-queries from there.
    pub fn resolve(
        &self,
        world: &mut dyn PhysicsWorld,
        proxy: ObjectId,
    ) -> Result<PenetrationPass, WorldError> {
        let transform = world.proxy_transform(proxy)?;
        let mut position = transform.position;
        let mut pass = PenetrationPass::default();

        for pair in world.overlapping_pairs(proxy) {
            for manifold in &pair.manifolds {
                let sign = if manifold.proxy_is_body_a { -1.0 } else { 1.0 };
                for point in manifold.points.iter().filter(|p| p.distance < 0.0) {
                    if point.distance < pass.deepest {
                        pass.deepest = point.distance;
                        pass.normal = Some(point.normal_on_b * sign);
                    }
                    position += point.normal_on_b * sign * point.distance * self.recovery_factor;
                    pass.penetrating = true;
                    tracing::trace!(
                        other = ?pair.other,
                        depth = point.distance,
                        "penetration contact"
                    );
                }
            }
        }

        if pass.penetrating {
            world.set_proxy_transform(proxy, transform.with_position(position))?;
        }
        Ok(pass)
    }

    /// Run passes until clean or `max_passes` is reached.
    pub fn recover(
        &self,
        world: &mut dyn PhysicsWorld,
        proxy: ObjectId,
    ) -> Result<Recovery, WorldError> {
        let mut recovery = Recovery::default();
        while recovery.passes < self.max_passes {
            let pass = self.resolve(world, proxy)?;
            if recovery.passes == 0 {
                recovery.collided = pass.penetrating;
            }
            recovery.passes += 1;
            if pass.normal.is_some() {
                recovery.normal = pass.normal;
            }
            recovery.residual = pass.deepest;
            if !pass.penetrating {
                return Ok(recovery);
            }
        }
        // The last pass corrected its contacts; see whether that was enough.
        let remaining = world
            .overlapping_pairs(proxy)
            .iter()
            .flat_map(|pair| &pair.manifolds)
            .flat_map(|m| &m.points)
            .map(|p| p.distance)
            .fold(0.0_f32, f32::min);
        recovery.residual = remaining;
        recovery.unresolved = remaining < 0.0;
        Ok(recovery)
    }
}
