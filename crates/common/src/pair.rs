use serde::{Deserialize, Serialize};

/// Stable handle of an object stored in a collision world arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub u32);

/// Canonical ordered pair of object handles.
///
/// `PairKey::new(a, b) == PairKey::new(b, a)`, so per-pair bookkeeping does not
/// depend on which side of a query an object appeared on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairKey {
    low: ObjectId,
    high: ObjectId,
}

impl PairKey {
    pub fn new(a: ObjectId, b: ObjectId) -> Self {
        if a <= b {
            Self { low: a, high: b }
        } else {
            Self { low: b, high: a }
        }
    }

    pub fn low(&self) -> ObjectId {
        self.low
    }

    pub fn high(&self) -> ObjectId {
        self.high
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.low == id || self.high == id
    }

    /// The member of the pair that is not `id`, if `id` is a member.
    pub fn other(&self, id: ObjectId) -> Option<ObjectId> {
        if self.low == id {
            Some(self.high)
        } else if self.high == id {
            Some(self.low)
        } else {
            None
        }
    }
}
