//! Kinematic character controller.
//!
//! A character is a capsule proxy registered with a [`strider_kernel::PhysicsWorld`]
//! and bound to a host node. Every world step the controller pushes the proxy
//! out of overlaps, slides it along obstacles, applies gravity and lands it on
//! walkable ground, then writes the result back to the host.
//!
//! # Invariants
//! - The world is always passed in; nothing here looks one up globally.
//! - Per-tick degeneracies (zero vectors, unresolved overlap) never fail a tick.
//! - The controller's own writes to its host never trigger a resync.

pub mod config;
pub mod controller;
pub mod error;
pub mod gate;
pub mod horizontal;
pub mod penetration;
pub mod proxy;
pub mod velocity;
pub mod vertical;

#[cfg(test)]
mod testing;

pub use config::{CharacterConfig, ShapeConfig};
pub use controller::CharacterController;
pub use error::CharacterError;
pub use gate::{NotifyGate, SuppressGuard};
pub use horizontal::{HorizontalMover, MoveRequest, slide_target};
pub use penetration::{PenetrationPass, PenetrationResolver, Recovery};
pub use proxy::CollisionProxy;
pub use velocity::{ComposedVelocity, VelocityInputs, compose};
pub use vertical::VerticalStepper;
