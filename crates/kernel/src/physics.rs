//! The contract a collision world offers to character controllers.
//!
//! Controllers never look a world up globally; every operation that needs one
//! receives it as `&mut dyn PhysicsWorld`.

use std::cell::RefCell;
use std::rc::Rc;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use strider_common::{Capsule, CollisionGroups, EntityId, ObjectId, Transform};

/// Errors from world and host operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WorldError {
    #[error("object {0:?} not found")]
    UnknownObject(ObjectId),
    #[error("object {0:?} is not a character proxy")]
    NotAProxy(ObjectId),
    #[error("action {0:?} not found")]
    UnknownAction(ActionId),
    #[error("scene node {0} not found")]
    NodeMissing(EntityId),
}

/// Handle of a registered per-tick action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActionId(pub u32);

/// A single contact point between two objects.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactPoint {
    /// Signed separation. Negative values mean the shapes overlap.
    pub distance: f32,
    /// Contact normal reported on body B, pointing from B towards A.
    pub normal_on_b: Vec3,
    /// World-space contact location on body B.
    pub point: Vec3,
}

/// Narrowphase result for one pair of objects.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactManifold {
    /// Whether the querying proxy is body A of this manifold.
    pub proxy_is_body_a: bool,
    pub points: Vec<ContactPoint>,
}

/// An object whose bounds overlap the proxy, with its contact manifolds.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlapPair {
    pub other: ObjectId,
    pub manifolds: Vec<ContactManifold>,
}

/// First blocking contact found by a convex sweep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepHit {
    /// Fraction of the sweep travelled before contact, in `[0, 1]`.
    pub fraction: f32,
    /// Surface normal at the hit, pointing towards the swept shape.
    pub normal: Vec3,
    pub point: Vec3,
    pub object: ObjectId,
}

/// Directional acceptance test for sweep hits.
///
/// A hit is accepted when `normal.dot(direction) >= min_dot`; rejected hits
/// are ignored by the query as if the surface were not there.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepFilter {
    pub direction: Vec3,
    pub min_dot: f32,
}

impl SweepFilter {
    pub fn new(direction: Vec3, min_dot: f32) -> Self {
        Self { direction, min_dot }
    }

    /// Accepts every hit.
    pub fn unfiltered() -> Self {
        Self {
            direction: Vec3::ZERO,
            min_dot: f32::NEG_INFINITY,
        }
    }

    pub fn accepts(&self, normal: Vec3) -> bool {
        normal.dot(self.direction) >= self.min_dot
    }
}

impl Default for SweepFilter {
    fn default() -> Self {
        Self::unfiltered()
    }
}

/// Something the world runs once per simulation step.
pub trait TickAction {
    fn update_action(&mut self, world: &mut dyn PhysicsWorld, dt: f32);
}

/// Single-threaded shared handle to a registered action.
pub type SharedAction = Rc<RefCell<dyn TickAction>>;

/// Queries and lifecycle hooks a character controller needs from its world.
pub trait PhysicsWorld {
    /// Registers a non-dynamic capsule proxy and returns its handle.
    fn register_proxy(
        &mut self,
        shape: Capsule,
        transform: Transform,
        groups: CollisionGroups,
    ) -> ObjectId;

    fn deregister_proxy(&mut self, proxy: ObjectId) -> Result<(), WorldError>;

    fn proxy_transform(&self, proxy: ObjectId) -> Result<Transform, WorldError>;

    fn set_proxy_transform(&mut self, proxy: ObjectId, transform: Transform)
    -> Result<(), WorldError>;

    /// Objects currently overlapping `proxy`, with their contact manifolds.
    fn overlapping_pairs(&self, proxy: ObjectId) -> Vec<OverlapPair>;

    /// Sweeps `shape` from `from` to `to` and reports the closest accepted hit.
    ///
    /// `exclude` is the querying proxy: it is never reported, and its
    /// collision groups decide which objects are candidates.
    fn convex_sweep(
        &self,
        shape: &Capsule,
        from: &Transform,
        to: &Transform,
        exclude: ObjectId,
        filter: &SweepFilter,
    ) -> Option<SweepHit>;

    fn gravity(&self) -> Vec3;

    fn add_action(&mut self, action: SharedAction) -> ActionId;

    fn remove_action(&mut self, id: ActionId) -> Result<(), WorldError>;

    /// Whether `object` is moved by impulses.
    fn is_dynamic(&self, _object: ObjectId) -> bool {
        false
    }

    fn apply_impulse(&mut self, _object: ObjectId, _impulse: Vec3) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unfiltered_accepts_everything() {
        let f = SweepFilter::unfiltered();
        assert!(f.accepts(Vec3::Y));
        assert!(f.accepts(Vec3::NEG_Y));
        assert!(f.accepts(Vec3::ZERO));
    }

    #[test]
    fn slope_filter_rejects_steep_normals() {
        let cos45 = std::f32::consts::FRAC_PI_4.cos();
        let f = SweepFilter::new(Vec3::Y, cos45);
        assert!(f.accepts(Vec3::Y));
        let steep = Vec3::new(1.0, 0.5, 0.0).normalize();
        assert!(!f.accepts(steep));
    }
}
