//! Scripted world double for exact control over overlaps and sweeps.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use glam::Vec3;
use strider_common::{Capsule, CollisionGroups, ObjectId, Transform};
use strider_kernel::{
    ActionId, ContactManifold, ContactPoint, OverlapPair, PhysicsWorld, SharedAction, SweepFilter,
    SweepHit, WorldError,
};

/// A recorded `convex_sweep` call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct SweepCall {
    pub from: Vec3,
    pub to: Vec3,
    pub filter: SweepFilter,
}

/// Answers sweeps from a queue of canned hits and overlaps from a fixed list.
///
/// Canned hits still go through the query's filter, like a real world would.
pub(crate) struct ScriptedWorld {
    pub gravity: Vec3,
    proxies: BTreeMap<ObjectId, Transform>,
    next_object: u32,
    overlaps: Vec<OverlapPair>,
    sweeps: RefCell<VecDeque<Option<SweepHit>>>,
    pub sweep_log: RefCell<Vec<SweepCall>>,
    pub dynamic: BTreeSet<ObjectId>,
    pub impulses: Vec<(ObjectId, Vec3)>,
    pub actions: BTreeMap<ActionId, SharedAction>,
    next_action: u32,
}

impl Default for ScriptedWorld {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -9.8, 0.0),
            proxies: BTreeMap::new(),
            next_object: 100,
            overlaps: Vec::new(),
            sweeps: RefCell::new(VecDeque::new()),
            sweep_log: RefCell::new(Vec::new()),
            dynamic: BTreeSet::new(),
            impulses: Vec::new(),
            actions: BTreeMap::new(),
            next_action: 0,
        }
    }
}

impl ScriptedWorld {
    pub fn add_proxy(&mut self, position: Vec3) -> ObjectId {
        self.register_proxy(
            Capsule::default(),
            Transform::from_position(position),
            CollisionGroups::character(),
        )
    }

    /// Report one overlapping contact on every `overlapping_pairs` call.
    pub fn push_overlap(&mut self, proxy_is_body_a: bool, distance: f32, normal_on_b: Vec3) {
        let other = ObjectId(self.overlaps.len() as u32);
        self.overlaps.push(OverlapPair {
            other,
            manifolds: vec![ContactManifold {
                proxy_is_body_a,
                points: vec![ContactPoint {
                    distance,
                    normal_on_b,
                    point: Vec3::ZERO,
                }],
            }],
        });
    }

    /// Queue the answer to the next sweep. `None` means the path is clear.
    pub fn push_sweep(&self, hit: Option<SweepHit>) {
        self.sweeps.borrow_mut().push_back(hit);
    }

    pub fn sweep_calls(&self) -> Vec<SweepCall> {
        self.sweep_log.borrow().clone()
    }

    /// Run every registered action once, like a world step.
    pub fn step(&mut self, dt: f32) {
        let actions: Vec<SharedAction> = self.actions.values().cloned().collect();
        for action in actions {
            action.borrow_mut().update_action(self, dt);
        }
    }
}

pub(crate) fn hit(fraction: f32, normal: Vec3) -> SweepHit {
    SweepHit {
        fraction,
        normal,
        point: Vec3::ZERO,
        object: ObjectId(7),
    }
}

impl PhysicsWorld for ScriptedWorld {
    fn register_proxy(
        &mut self,
        _shape: Capsule,
        transform: Transform,
        _groups: CollisionGroups,
    ) -> ObjectId {
        let id = ObjectId(self.next_object);
        self.next_object += 1;
        self.proxies.insert(id, transform);
        id
    }

    fn deregister_proxy(&mut self, proxy: ObjectId) -> Result<(), WorldError> {
        self.proxies
            .remove(&proxy)
            .map(|_| ())
            .ok_or(WorldError::UnknownObject(proxy))
    }

    fn proxy_transform(&self, proxy: ObjectId) -> Result<Transform, WorldError> {
        self.proxies
            .get(&proxy)
            .copied()
            .ok_or(WorldError::UnknownObject(proxy))
    }

    fn set_proxy_transform(
        &mut self,
        proxy: ObjectId,
        transform: Transform,
    ) -> Result<(), WorldError> {
        let slot = self
            .proxies
            .get_mut(&proxy)
            .ok_or(WorldError::UnknownObject(proxy))?;
        *slot = transform;
        Ok(())
    }

    fn overlapping_pairs(&self, _proxy: ObjectId) -> Vec<OverlapPair> {
        self.overlaps.clone()
    }

    fn convex_sweep(
        &self,
        _shape: &Capsule,
        from: &Transform,
        to: &Transform,
        _exclude: ObjectId,
        filter: &SweepFilter,
    ) -> Option<SweepHit> {
        self.sweep_log.borrow_mut().push(SweepCall {
            from: from.position,
            to: to.position,
            filter: *filter,
        });
        let hit = self.sweeps.borrow_mut().pop_front().flatten()?;
        filter.accepts(hit.normal).then_some(hit)
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
        self.dynamic.contains(&object)
    }

    fn apply_impulse(&mut self, object: ObjectId, impulse: Vec3) {
        self.impulses.push((object, impulse));
    }
}
