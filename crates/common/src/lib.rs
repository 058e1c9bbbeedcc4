//! Shared value types for the strider workspace.
//!
//! # Invariants
//! - Types here carry no behaviour beyond validation and small geometric helpers.
//! - Handles are plain indices so collision worlds can own objects in arenas.

mod groups;
mod pair;
mod shape;
mod types;

pub use groups::CollisionGroups;
pub use pair::{ObjectId, PairKey};
pub use shape::{Capsule, ShapeError};
pub use types::{EntityId, Transform};
