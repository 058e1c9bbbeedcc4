use serde::{Deserialize, Serialize};

/// Collision category bits and the categories an object responds to.
///
/// Two objects interact only when each one's membership intersects the
/// other's filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollisionGroups {
    pub memberships: u32,
    pub filter: u32,
}

impl CollisionGroups {
    pub const STATIC: u32 = 1 << 0;
    pub const KINEMATIC: u32 = 1 << 1;
    pub const DYNAMIC: u32 = 1 << 2;
    pub const CHARACTER: u32 = 1 << 3;
    pub const ALL: u32 = u32::MAX;

    pub const fn new(memberships: u32, filter: u32) -> Self {
        Self {
            memberships,
            filter,
        }
    }

    /// Static world geometry: responds to everything.
    pub const fn fixed() -> Self {
        Self::new(Self::STATIC, Self::ALL)
    }

    /// Dynamic props: respond to everything.
    pub const fn dynamic() -> Self {
        Self::new(Self::DYNAMIC, Self::ALL)
    }

    /// Character proxies: solid to static, kinematic and dynamic geometry.
    pub const fn character() -> Self {
        Self::new(
            Self::CHARACTER,
            Self::STATIC | Self::KINEMATIC | Self::DYNAMIC,
        )
    }

    /// Clears any filter bits that would make this category solid against
    /// itself.
    pub const fn without_self_response(self) -> Self {
        Self::new(self.memberships, self.filter & !self.memberships)
    }

    pub const fn interacts_with(&self, other: &Self) -> bool {
        (self.memberships & other.filter) != 0 && (other.memberships & self.filter) != 0
    }
}

impl Default for CollisionGroups {
    fn default() -> Self {
        Self::fixed()
    }
}
