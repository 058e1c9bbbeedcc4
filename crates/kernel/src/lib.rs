//! Kernel: the contracts a character controller consumes, plus reference
//! implementations of them.
//!
//! # Invariants
//! - Worlds are handed to callers explicitly; nothing here is global.
//! - A proxy is never reported by its own queries.
//! - Per-pair bookkeeping is keyed by canonical ordered pairs of handles.

pub mod collision;
pub mod geometry;
pub mod physics;
pub mod scene;

pub use collision::{Collider, CollisionWorld, ContactEvent, ContactStatus};
pub use physics::{
    ActionId, ContactManifold, ContactPoint, OverlapPair, PhysicsWorld, SharedAction, SweepFilter,
    SweepHit, TickAction, WorldError,
};
pub use scene::{HostTransform, ListenerId, Scene, SceneEvent, SceneNode};
