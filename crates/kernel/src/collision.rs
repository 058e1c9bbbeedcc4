use std::collections::BTreeMap;

use glam::Vec3;
use strider_common::{Capsule, CollisionGroups, ObjectId, PairKey, Transform};

use crate::geometry::{self, Proximity};
use crate::physics::{
    ActionId, ContactManifold, ContactPoint, OverlapPair, PhysicsWorld, SharedAction, SweepFilter,
    SweepHit, WorldError,
};

/// Contacts closer than this count as touching in sweeps.
const SWEEP_TOLERANCE: f32 = 1e-4;
/// Newton steps per candidate before a sweep gives up on converging.
const SWEEP_MAX_STEPS: usize = 64;
/// Fraction of prop velocity lost per second.
const PROP_DAMPING: f32 = 2.0;

/// Static geometry supported by the reference world.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Collider {
    /// Solid half-space `normal.x <= offset`; `normal` points to free space.
    Plane { normal: Vec3, offset: f32 },
    Sphere { center: Vec3, radius: f32 },
}

impl Collider {
    /// Plane through `point` whose free side faces `normal`.
    pub fn plane_through(point: Vec3, normal: Vec3) -> Self {
        let normal = normal.try_normalize().unwrap_or(Vec3::Y);
        Self::Plane {
            normal,
            offset: normal.dot(point),
        }
    }
}

#[derive(Debug, Clone)]
enum Body {
    Fixed(Collider),
    Prop {
        center: Vec3,
        radius: f32,
        mass: f32,
        velocity: Vec3,
    },
    Proxy {
        shape: Capsule,
        transform: Transform,
    },
}

#[derive(Debug, Clone)]
struct Object {
    body: Body,
    groups: CollisionGroups,
}

/// Status of a touching pair, keyed by its canonical [`PairKey`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContactStatus {
    /// Tick on which the pair started touching.
    pub since_tick: u64,
}

/// Pair-level contact transitions produced by [`CollisionWorld::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactEvent {
    Started(PairKey),
    Stopped(PairKey),
}

/// Reference collision world for character proxies.
///
/// Answers overlap and sweep queries analytically for capsule proxies against
/// planes, spheres, props and other proxies. It is not a dynamics engine:
/// props only drift with the impulses characters give them.
pub struct CollisionWorld {
    objects: BTreeMap<ObjectId, Object>,
    next_object: u32,
    gravity: Vec3,
    actions: BTreeMap<ActionId, SharedAction>,
    next_action: u32,
    tick: u64,
    contacts: BTreeMap<PairKey, ContactStatus>,
    contact_events: Vec<ContactEvent>,
}

impl Default for CollisionWorld {
    fn default() -> Self {
        Self::new(Vec3::new(0.0, -9.8, 0.0))
    }
}

impl std::fmt::Debug for CollisionWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollisionWorld")
            .field("objects", &self.objects.len())
            .field("actions", &self.actions.len())
            .field("gravity", &self.gravity)
            .field("tick", &self.tick)
            .finish()
    }
}

impl CollisionWorld {
    pub fn new(gravity: Vec3) -> Self {
        Self {
            objects: BTreeMap::new(),
            next_object: 0,
            gravity,
            actions: BTreeMap::new(),
            next_action: 0,
            tick: 0,
            contacts: BTreeMap::new(),
            contact_events: Vec::new(),
        }
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.gravity = gravity;
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn action_count(&self) -> usize {
        self.actions.len()
    }

    pub fn add_fixed(&mut self, collider: Collider) -> ObjectId {
        self.insert(Object {
            body: Body::Fixed(collider),
            groups: CollisionGroups::fixed(),
        })
    }

    /// Adds a dynamic sphere that characters can push.
    pub fn add_prop(&mut self, center: Vec3, radius: f32, mass: f32) -> ObjectId {
        self.insert(Object {
            body: Body::Prop {
                center,
                radius,
                mass: mass.max(f32::EPSILON),
                velocity: Vec3::ZERO,
            },
            groups: CollisionGroups::dynamic(),
        })
    }

    pub fn remove_object(&mut self, id: ObjectId) -> Result<(), WorldError> {
        if self.objects.remove(&id).is_none() {
            return Err(WorldError::UnknownObject(id));
        }
        self.forget_pairs(id);
        Ok(())
    }

    /// Centre of a fixed sphere or prop, or origin of a proxy.
    pub fn object_position(&self, id: ObjectId) -> Option<Vec3> {
        self.objects.get(&id).and_then(|o| match o.body {
            Body::Fixed(Collider::Sphere { center, .. }) => Some(center),
            Body::Fixed(Collider::Plane { .. }) => None,
            Body::Prop { center, .. } => Some(center),
            Body::Proxy { transform, .. } => Some(transform.position),
        })
    }

    pub fn prop_velocity(&self, id: ObjectId) -> Option<Vec3> {
        match self.objects.get(&id)?.body {
            Body::Prop { velocity, .. } => Some(velocity),
            _ => None,
        }
    }

    pub fn contacts(&self) -> &BTreeMap<PairKey, ContactStatus> {
        &self.contacts
    }

    pub fn drain_contact_events(&mut self) -> Vec<ContactEvent> {
        std::mem::take(&mut self.contact_events)
    }

    /// Advance the world by one step.
    ///
    /// Runs every registered action, drifts props, then refreshes pair
    /// contact status.
    pub fn step(&mut self, dt: f32) {
        let _span = tracing::info_span!("world_step", tick = self.tick + 1).entered();
        self.tick += 1;

        // Actions get `&mut self`, so run them from a snapshot of the list.
        let actions: Vec<(ActionId, SharedAction)> = self
            .actions
            .iter()
            .map(|(id, action)| (*id, action.clone()))
            .collect();
        for (id, action) in actions {
            match action.try_borrow_mut() {
                Ok(mut guard) => guard.update_action(self, dt),
                Err(_) => tracing::warn!(?id, "action already borrowed, skipped this step"),
            }
        }

        for object in self.objects.values_mut() {
            if let Body::Prop {
                center, velocity, ..
            } = &mut object.body
            {
                *center += *velocity * dt;
                *velocity *= (1.0 - PROP_DAMPING * dt).max(0.0);
            }
        }

        self.refresh_contacts();
    }

    fn insert(&mut self, object: Object) -> ObjectId {
        let id = ObjectId(self.next_object);
        self.next_object += 1;
        self.objects.insert(id, object);
        id
    }

    fn forget_pairs(&mut self, id: ObjectId) {
        let gone: Vec<PairKey> = self
            .contacts
            .keys()
            .filter(|k| k.contains(id))
            .copied()
            .collect();
        for key in gone {
            self.contacts.remove(&key);
            self.contact_events.push(ContactEvent::Stopped(key));
        }
    }

    fn refresh_contacts(&mut self) {
        let mut touching = Vec::new();
        for (id, object) in &self.objects {
            if let Body::Proxy { shape, transform } = &object.body {
                for (other, proximity) in self.proximities(*id, shape, transform) {
                    if proximity.distance <= SWEEP_TOLERANCE {
                        touching.push(PairKey::new(*id, other));
                    }
                }
            }
        }

        let stale: Vec<PairKey> = self
            .contacts
            .keys()
            .filter(|k| !touching.contains(k))
            .copied()
            .collect();
        for key in stale {
            self.contacts.remove(&key);
            tracing::trace!(?key, "contact stopped");
            self.contact_events.push(ContactEvent::Stopped(key));
        }
        for key in touching {
            if !self.contacts.contains_key(&key) {
                self.contacts.insert(
                    key,
                    ContactStatus {
                        since_tick: self.tick,
                    },
                );
                tracing::trace!(?key, "contact started");
                self.contact_events.push(ContactEvent::Started(key));
            }
        }
    }

    /// Objects the proxy `owner` may collide with.
    fn candidates(&self, owner: ObjectId) -> Vec<(ObjectId, &Object)> {
        let Some(owner_groups) = self.objects.get(&owner).map(|o| o.groups) else {
            return Vec::new();
        };
        self.objects
            .iter()
            .filter(|(id, other)| **id != owner && owner_groups.interacts_with(&other.groups))
            .map(|(id, other)| (*id, other))
            .collect()
    }

    /// Separation between a capsule placed at `transform` and every object the
    /// proxy `owner` may collide with.
    fn proximities(
        &self,
        owner: ObjectId,
        shape: &Capsule,
        transform: &Transform,
    ) -> Vec<(ObjectId, Proximity)> {
        self.candidates(owner)
            .into_iter()
            .map(|(id, other)| (id, proximity(shape, transform, other)))
            .collect()
    }

    fn proxy(&self, id: ObjectId) -> Result<(&Capsule, &Transform), WorldError> {
        match &self.objects.get(&id).ok_or(WorldError::UnknownObject(id))?.body {
            Body::Proxy { shape, transform } => Ok((shape, transform)),
            _ => Err(WorldError::NotAProxy(id)),
        }
    }
}

fn proximity(shape: &Capsule, transform: &Transform, other: &Object) -> Proximity {
    let (a, b) = shape.segment(transform);
    let r = shape.radius();
    match &other.body {
        Body::Fixed(Collider::Plane { normal, offset }) => {
            geometry::capsule_plane(a, b, r, *normal, *offset)
        }
        Body::Fixed(Collider::Sphere { center, radius }) => {
            geometry::capsule_sphere(a, b, r, *center, *radius)
        }
        Body::Prop { center, radius, .. } => geometry::capsule_sphere(a, b, r, *center, *radius),
        Body::Proxy {
            shape: other_shape,
            transform: other_transform,
        } => {
            let (c, d) = other_shape.segment(other_transform);
            geometry::capsule_capsule(a, b, r, c, d, other_shape.radius())
        }
    }
}

/// Earliest time of impact of one candidate along `motion`, via Newton steps
/// on the separation. Separation between convex shapes is convex in the
/// translation parameter, so the steps never overshoot the contact.
fn time_of_impact(
    motion: Vec3,
    separation: impl Fn(f32) -> Proximity,
) -> Option<(f32, Proximity)> {
    let mut t = 0.0;
    let mut p = separation(t);
    if p.distance < 0.0 {
        // Starting inside: only a hit when still driving further in.
        return (motion.dot(p.normal) < 0.0).then_some((0.0, p));
    }
    for _ in 0..SWEEP_MAX_STEPS {
        let closing = -motion.dot(p.normal);
        if closing <= f32::EPSILON {
            return None;
        }
        if p.distance <= SWEEP_TOLERANCE {
            return Some((t, p));
        }
        t += p.distance / closing;
        if t > 1.0 {
            return None;
        }
        p = separation(t);
    }
    None
}

impl PhysicsWorld for CollisionWorld {
    fn register_proxy(
        &mut self,
        shape: Capsule,
        transform: Transform,
        groups: CollisionGroups,
    ) -> ObjectId {
        let id = self.insert(Object {
            body: Body::Proxy { shape, transform },
            groups: groups.without_self_response(),
        });
        tracing::debug!(?id, "registered character proxy");
        id
    }

    fn deregister_proxy(&mut self, proxy: ObjectId) -> Result<(), WorldError> {
        self.proxy(proxy)?;
        self.remove_object(proxy)?;
        tracing::debug!(?proxy, "deregistered character proxy");
        Ok(())
    }

    fn proxy_transform(&self, proxy: ObjectId) -> Result<Transform, WorldError> {
        self.proxy(proxy).map(|(_, t)| *t)
    }

    fn set_proxy_transform(
        &mut self,
        proxy: ObjectId,
        new: Transform,
    ) -> Result<(), WorldError> {
        match self.objects.get_mut(&proxy).map(|o| &mut o.body) {
            Some(Body::Proxy { transform, .. }) => {
                *transform = new;
                Ok(())
            }
            Some(_) => Err(WorldError::NotAProxy(proxy)),
            None => Err(WorldError::UnknownObject(proxy)),
        }
    }

    fn overlapping_pairs(&self, proxy: ObjectId) -> Vec<OverlapPair> {
        let Ok((shape, transform)) = self.proxy(proxy) else {
            return Vec::new();
        };
        self.proximities(proxy, shape, transform)
            .into_iter()
            .filter(|(_, p)| p.distance < 0.0)
            .map(|(other, p)| {
                // Body A is the lower handle of the canonical pair.
                let proxy_is_body_a = PairKey::new(proxy, other).low() == proxy;
                let normal_on_b = if proxy_is_body_a { p.normal } else { -p.normal };
                OverlapPair {
                    other,
                    manifolds: vec![ContactManifold {
                        proxy_is_body_a,
                        points: vec![ContactPoint {
                            distance: p.distance,
                            normal_on_b,
                            point: p.point,
                        }],
                    }],
                }
            })
            .collect()
    }

    fn convex_sweep(
        &self,
        shape: &Capsule,
        from: &Transform,
        to: &Transform,
        exclude: ObjectId,
        filter: &SweepFilter,
    ) -> Option<SweepHit> {
        let motion = to.position - from.position;
        if motion.length_squared() <= f32::EPSILON * f32::EPSILON {
            return None;
        }
        let mut best: Option<SweepHit> = None;
        for (object, other) in self.candidates(exclude) {
            let hit = time_of_impact(motion, |t| {
                proximity(shape, &from.with_position(from.position + motion * t), other)
            });
            let Some((fraction, p)) = hit else {
                continue;
            };
            if !filter.accepts(p.normal) {
                continue;
            }
            if best.is_none_or(|b| fraction < b.fraction) {
                best = Some(SweepHit {
                    fraction,
                    normal: p.normal,
                    point: p.point,
                    object,
                });
            }
        }
        best
    }

    fn gravity(&self) -> Vec3 {
        self.gravity
    }

    fn add_action(&mut self, action: SharedAction) -> ActionId {
        let id = ActionId(self.next_action);
        self.next_action += 1;
        self.actions.insert(id, action);
        id
    }

    fn remove_action(&mut self, id: ActionId) -> Result<(), WorldError> {
        self.actions
            .remove(&id)
            .map(|_| ())
            .ok_or(WorldError::UnknownAction(id))
    }

    fn is_dynamic(&self, object: ObjectId) -> bool {
        matches!(
            self.objects.get(&object).map(|o| &o.body),
            Some(Body::Prop { .. })
        )
    }

    fn apply_impulse(&mut self, object: ObjectId, impulse: Vec3) {
        if let Some(Body::Prop { mass, velocity, .. }) =
            self.objects.get_mut(&object).map(|o| &mut o.body)
        {
            *velocity += impulse / *mass;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::TickAction;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn capsule() -> Capsule {
        Capsule::new(0.5, 2.0).unwrap()
    }

    fn world_with_floor() -> (CollisionWorld, ObjectId) {
        let mut w = CollisionWorld::default();
        let floor = w.add_fixed(Collider::plane_through(Vec3::ZERO, Vec3::Y));
        (w, floor)
    }

    #[test]
    fn world_starts_empty() {
        let w = CollisionWorld::default();
        assert_eq!(w.tick(), 0);
        assert_eq!(w.object_count(), 0);
        assert_eq!(w.gravity(), Vec3::new(0.0, -9.8, 0.0));
    }

    #[test]
    fn register_and_deregister_proxy() {
        let (mut w, floor) = world_with_floor();
        let p = w.register_proxy(capsule(), Transform::default(), CollisionGroups::character());
        assert!(w.proxy_transform(p).is_ok());
        assert_eq!(w.deregister_proxy(floor), Err(WorldError::NotAProxy(floor)));
        w.deregister_proxy(p).unwrap();
        assert_eq!(w.proxy_transform(p), Err(WorldError::UnknownObject(p)));
    }

    #[test]
    fn no_overlap_when_standing_on_floor() {
        let (mut w, _) = world_with_floor();
        let p = w.register_proxy(
            capsule(),
            Transform::from_position(Vec3::new(0.0, 1.0, 0.0)),
            CollisionGroups::character(),
        );
        assert!(w.overlapping_pairs(p).is_empty());
    }

    #[test]
    fn sunk_proxy_reports_penetration() {
        let (mut w, floor) = world_with_floor();
        let p = w.register_proxy(
            capsule(),
            Transform::from_position(Vec3::new(0.0, 0.8, 0.0)),
            CollisionGroups::character(),
        );
        let pairs = w.overlapping_pairs(p);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].other, floor);
        let manifold = &pairs[0].manifolds[0];
        // Floor was registered first, so the proxy is body B.
        assert!(!manifold.proxy_is_body_a);
        let point = manifold.points[0];
        assert!((point.distance + 0.2).abs() < 1e-5);
        // Normal on B points from B (proxy) towards A (floor).
        assert!((point.normal_on_b - Vec3::NEG_Y).length() < 1e-5);
    }

    #[test]
    fn proxies_do_not_collide_with_each_other_by_default() {
        let mut w = CollisionWorld::default();
        let a = w.register_proxy(capsule(), Transform::default(), CollisionGroups::character());
        w.register_proxy(capsule(), Transform::default(), CollisionGroups::character());
        assert!(w.overlapping_pairs(a).is_empty());
    }

    #[test]
    fn proxies_collide_when_groups_allow() {
        let mut w = CollisionWorld::default();
        let groups = CollisionGroups::new(CollisionGroups::KINEMATIC, CollisionGroups::ALL);
        let a = w.register_proxy(capsule(), Transform::default(), groups);
        let b = w.register_proxy(
            capsule(),
            Transform::from_position(Vec3::new(0.8, 0.0, 0.0)),
            CollisionGroups::character(),
        );
        let pairs = w.overlapping_pairs(b);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].other, a);
        assert!(!pairs[0].manifolds[0].proxy_is_body_a);
    }

    #[test]
    fn downward_sweep_hits_floor() {
        let (mut w, floor) = world_with_floor();
        let from = Transform::from_position(Vec3::new(0.0, 2.0, 0.0));
        let to = Transform::from_position(Vec3::new(0.0, 0.0, 0.0));
        let p = w.register_proxy(capsule(), from, CollisionGroups::character());
        let hit = w
            .convex_sweep(&capsule(), &from, &to, p, &SweepFilter::unfiltered())
            .unwrap();
        assert_eq!(hit.object, floor);
        // Travel 1.0 of the 2.0 before the bottom cap touches y=0.
        assert!((hit.fraction - 0.5).abs() < 1e-3);
        assert!((hit.normal - Vec3::Y).length() < 1e-5);
    }

    #[test]
    fn sweep_ignores_filtered_surfaces() {
        let mut w = CollisionWorld::default();
        let steep = Vec3::new(1.0, 0.5, 0.0).normalize();
        w.add_fixed(Collider::plane_through(Vec3::ZERO, steep));
        let from = Transform::from_position(Vec3::new(0.0, 3.0, 0.0));
        let to = Transform::from_position(Vec3::new(0.0, -1.0, 0.0));
        let p = w.register_proxy(capsule(), from, CollisionGroups::character());
        let cos45 = std::f32::consts::FRAC_PI_4.cos();
        assert!(
            w.convex_sweep(&capsule(), &from, &to, p, &SweepFilter::new(Vec3::Y, cos45))
                .is_none()
        );
        assert!(
            w.convex_sweep(&capsule(), &from, &to, p, &SweepFilter::unfiltered())
                .is_some()
        );
    }

    #[test]
    fn sweep_away_from_surface_misses() {
        let (mut w, _) = world_with_floor();
        let from = Transform::from_position(Vec3::new(0.0, 1.0, 0.0));
        let to = Transform::from_position(Vec3::new(0.0, 3.0, 0.0));
        let p = w.register_proxy(capsule(), from, CollisionGroups::character());
        assert!(
            w.convex_sweep(&capsule(), &from, &to, p, &SweepFilter::unfiltered())
                .is_none()
        );
    }

    #[test]
    fn sweep_picks_closest_hit() {
        let mut w = CollisionWorld::default();
        let near = w.add_fixed(Collider::Sphere {
            center: Vec3::new(3.0, 1.0, 0.0),
            radius: 0.5,
        });
        w.add_fixed(Collider::Sphere {
            center: Vec3::new(6.0, 1.0, 0.0),
            radius: 0.5,
        });
        let from = Transform::from_position(Vec3::new(0.0, 1.0, 0.0));
        let to = Transform::from_position(Vec3::new(10.0, 1.0, 0.0));
        let p = w.register_proxy(capsule(), from, CollisionGroups::character());
        let hit = w
            .convex_sweep(&capsule(), &from, &to, p, &SweepFilter::unfiltered())
            .unwrap();
        assert_eq!(hit.object, near);
        // Surfaces meet after travelling 3.0 - 0.5 - 0.5 = 2.0 of 10.0.
        assert!((hit.fraction - 0.2).abs() < 1e-3);
    }

    #[test]
    fn impulses_move_props() {
        let mut w = CollisionWorld::default();
        let prop = w.add_prop(Vec3::new(2.0, 0.5, 0.0), 0.5, 2.0);
        assert!(w.is_dynamic(prop));
        w.apply_impulse(prop, Vec3::new(4.0, 0.0, 0.0));
        assert_eq!(w.prop_velocity(prop), Some(Vec3::new(2.0, 0.0, 0.0)));
        w.step(0.1);
        let x = w.object_position(prop).unwrap().x;
        assert!((x - 2.2).abs() < 1e-5);
    }

    #[test]
    fn fixed_geometry_is_not_dynamic() {
        let (w, floor) = world_with_floor();
        assert!(!w.is_dynamic(floor));
    }

    struct Counter(Rc<RefCell<u32>>);

    impl TickAction for Counter {
        fn update_action(&mut self, _world: &mut dyn PhysicsWorld, _dt: f32) {
            *self.0.borrow_mut() += 1;
        }
    }

    #[test]
    fn actions_run_once_per_step() {
        let mut w = CollisionWorld::default();
        let count = Rc::new(RefCell::new(0));
        let id = w.add_action(Rc::new(RefCell::new(Counter(count.clone()))));
        w.step(0.016);
        w.step(0.016);
        assert_eq!(*count.borrow(), 2);
        w.remove_action(id).unwrap();
        w.step(0.016);
        assert_eq!(*count.borrow(), 2);
        assert_eq!(w.remove_action(id), Err(WorldError::UnknownAction(id)));
    }

    #[test]
    fn contact_events_use_canonical_pairs() {
        let (mut w, floor) = world_with_floor();
        let p = w.register_proxy(
            capsule(),
            Transform::from_position(Vec3::new(0.0, 1.0, 0.0)),
            CollisionGroups::character(),
        );
        w.step(0.016);
        let key = PairKey::new(p, floor);
        assert_eq!(w.drain_contact_events(), vec![ContactEvent::Started(key)]);
        assert_eq!(w.contacts().get(&PairKey::new(floor, p)).unwrap().since_tick, 1);

        w.step(0.016);
        assert!(w.drain_contact_events().is_empty());

        w.set_proxy_transform(p, Transform::from_position(Vec3::new(0.0, 5.0, 0.0)))
            .unwrap();
        w.step(0.016);
        assert_eq!(w.drain_contact_events(), vec![ContactEvent::Stopped(key)]);
        assert!(w.contacts().is_empty());
    }

    #[test]
    fn removing_object_stops_its_contacts() {
        let (mut w, floor) = world_with_floor();
        let p = w.register_proxy(
            capsule(),
            Transform::from_position(Vec3::new(0.0, 1.0, 0.0)),
            CollisionGroups::character(),
        );
        w.step(0.016);
        w.drain_contact_events();
        w.remove_object(floor).unwrap();
        assert_eq!(
            w.drain_contact_events(),
            vec![ContactEvent::Stopped(PairKey::new(p, floor))]
        );
    }
}
