use glam::{Quat, Vec3};
use strider_common::{Capsule, CollisionGroups, ObjectId, Transform};
use strider_kernel::{PhysicsWorld, SweepFilter, SweepHit, WorldError};

/// A character's capsule as registered with a collision world.
///
/// Caches the orientation read at the start of each tick so sweeps during the
/// tick use a consistent rotation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionProxy {
    id: ObjectId,
    shape: Capsule,
    rotation: Quat,
}

impl CollisionProxy {
    pub fn register(
        world: &mut dyn PhysicsWorld,
        shape: Capsule,
        transform: Transform,
        groups: CollisionGroups,
    ) -> Self {
        let id = world.register_proxy(shape, transform, groups);
        Self {
            id,
            shape,
            rotation: transform.rotation,
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn shape(&self) -> &Capsule {
        &self.shape
    }

    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    /// Re-read the world transform, caching its rotation.
    pub fn sync(&mut self, world: &dyn PhysicsWorld) -> Result<Transform, WorldError> {
        let transform = world.proxy_transform(self.id)?;
        self.rotation = transform.rotation;
        Ok(transform)
    }

    pub fn set_position(
        &self,
        world: &mut dyn PhysicsWorld,
        position: Vec3,
    ) -> Result<(), WorldError> {
        let transform = world.proxy_transform(self.id)?;
        world.set_proxy_transform(self.id, transform.with_position(position))
    }

    /// Sweep this capsule between two positions, ignoring the proxy itself.
    pub fn sweep(
        &self,
        world: &dyn PhysicsWorld,
        from: Vec3,
        to: Vec3,
        filter: &SweepFilter,
    ) -> Option<SweepHit> {
        let start = self.at(from);
        let end = self.at(to);
        world.convex_sweep(&self.shape, &start, &end, self.id, filter)
    }

    pub fn deregister(self, world: &mut dyn PhysicsWorld) -> Result<(), WorldError> {
        world.deregister_proxy(self.id)
    }

    fn at(&self, position: Vec3) -> Transform {
        Transform {
            position,
            rotation: self.rotation,
            scale: Vec3::ONE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strider_kernel::{Collider, CollisionWorld};

    fn world_with_floor() -> CollisionWorld {
        let mut world = CollisionWorld::default();
        world.add_fixed(Collider::plane_through(Vec3::ZERO, Vec3::Y));
        world
    }

    #[test]
    fn register_and_deregister() {
        let mut world = world_with_floor();
        let proxy = CollisionProxy::register(
            &mut world,
            Capsule::default(),
            Transform::from_position(Vec3::new(0.0, 1.0, 0.0)),
            CollisionGroups::character(),
        );
        assert_eq!(world.object_count(), 2);
        proxy.deregister(&mut world).unwrap();
        assert_eq!(world.object_count(), 1);
    }

    #[test]
    fn sync_picks_up_external_rotation() {
        let mut world = world_with_floor();
        let mut proxy = CollisionProxy::register(
            &mut world,
            Capsule::default(),
            Transform::from_position(Vec3::new(0.0, 1.0, 0.0)),
            CollisionGroups::character(),
        );
        let turned = Quat::from_rotation_y(1.0);
        let mut t = world.proxy_transform(proxy.id()).unwrap();
        t.rotation = turned;
        world.set_proxy_transform(proxy.id(), t).unwrap();

        let synced = proxy.sync(&world).unwrap();
        assert_eq!(synced.rotation, turned);
        assert_eq!(proxy.rotation(), turned);
    }

    #[test]
    fn sweep_ignores_self() {
        let mut world = CollisionWorld::default();
        let proxy = CollisionProxy::register(
            &mut world,
            Capsule::default(),
            Transform::from_position(Vec3::new(0.0, 1.0, 0.0)),
            CollisionGroups::character(),
        );
        let hit = proxy.sweep(
            &world,
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(3.0, 1.0, 0.0),
            &SweepFilter::unfiltered(),
        );
        assert!(hit.is_none());
    }

    #[test]
    fn set_position_keeps_rotation() {
        let mut world = world_with_floor();
        let start = Transform {
            rotation: Quat::from_rotation_y(0.5),
            ..Transform::from_position(Vec3::new(0.0, 1.0, 0.0))
        };
        let proxy = CollisionProxy::register(
            &mut world,
            Capsule::default(),
            start,
            CollisionGroups::character(),
        );
        proxy.set_position(&mut world, Vec3::new(2.0, 1.0, 0.0)).unwrap();
        let t = world.proxy_transform(proxy.id()).unwrap();
        assert_eq!(t.position, Vec3::new(2.0, 1.0, 0.0));
        assert_eq!(t.rotation, start.rotation);
    }
}
