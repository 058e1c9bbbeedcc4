use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use strider_common::{EntityId, Transform};

use crate::physics::WorldError;

/// An event record produced by every mutation to the scene.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneEvent {
    /// Node was spawned with the given transform.
    Spawned { id: EntityId, transform: Transform },
    /// Node was despawned. Carries the transform it had.
    Despawned { id: EntityId, transform: Transform },
    /// Node transform was updated.
    TransformUpdated {
        id: EntityId,
        old: Transform,
        new: Transform,
    },
}

/// Handle of a transform-changed listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

type TransformListener = Box<dyn FnMut(EntityId, &Transform)>;

/// Host node store: the transforms characters are bound to.
///
/// Every transform write notifies the node's listeners synchronously, before
/// `set_transform` returns. Uses BTreeMap for deterministic iteration order.
#[derive(Default)]
pub struct Scene {
    nodes: BTreeMap<EntityId, Transform>,
    listeners: BTreeMap<EntityId, Vec<(ListenerId, TransformListener)>>,
    next_listener: u64,
    /// Append-only event log of all mutations.
    event_log: Vec<SceneEvent>,
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("nodes", &self.nodes)
            .field("listeners", &self.listeners.values().map(Vec::len).sum::<usize>())
            .field("events", &self.event_log.len())
            .finish()
    }
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience for hosts that hand nodes to controllers.
    pub fn shared() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self::new()))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Drain and return the event log.
    pub fn drain_events(&mut self) -> Vec<SceneEvent> {
        std::mem::take(&mut self.event_log)
    }

    pub fn events(&self) -> &[SceneEvent] {
        &self.event_log
    }

    pub fn nodes(&self) -> &BTreeMap<EntityId, Transform> {
        &self.nodes
    }

    /// Spawn a new node with the given transform. Returns its id.
    pub fn spawn(&mut self, transform: Transform) -> EntityId {
        let id = EntityId::new();
        self.nodes.insert(id, transform);
        self.event_log.push(SceneEvent::Spawned { id, transform });
        id
    }

    /// Remove a node and its listeners. Returns its last transform.
    pub fn despawn(&mut self, id: EntityId) -> Option<Transform> {
        let removed = self.nodes.remove(&id);
        if let Some(transform) = removed {
            self.listeners.remove(&id);
            self.event_log.push(SceneEvent::Despawned { id, transform });
        }
        removed
    }

    pub fn transform(&self, id: EntityId) -> Option<Transform> {
        self.nodes.get(&id).copied()
    }

    /// Update a node's transform, log the change and notify its listeners.
    pub fn set_transform(&mut self, id: EntityId, new: Transform) -> Result<(), WorldError> {
        let slot = self.nodes.get_mut(&id).ok_or(WorldError::NodeMissing(id))?;
        let old = *slot;
        *slot = new;
        self.event_log
            .push(SceneEvent::TransformUpdated { id, old, new });
        if let Some(listeners) = self.listeners.get_mut(&id) {
            for (_, listener) in listeners.iter_mut() {
                listener(id, &new);
            }
        }
        Ok(())
    }

    /// Register a callback fired after every transform write to `id`.
    pub fn subscribe(
        &mut self,
        id: EntityId,
        listener: impl FnMut(EntityId, &Transform) + 'static,
    ) -> Result<ListenerId, WorldError> {
        if !self.nodes.contains_key(&id) {
            return Err(WorldError::NodeMissing(id));
        }
        let handle = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners
            .entry(id)
            .or_default()
            .push((handle, Box::new(listener)));
        Ok(handle)
    }

    pub fn unsubscribe(&mut self, id: EntityId, listener: ListenerId) -> bool {
        let Some(listeners) = self.listeners.get_mut(&id) else {
            return false;
        };
        let before = listeners.len();
        listeners.retain(|(handle, _)| *handle != listener);
        before != listeners.len()
    }
}

/// Read/write access to the world transform of the node a controller drives.
pub trait HostTransform {
    fn entity(&self) -> EntityId;

    fn world_transform(&self) -> Result<Transform, WorldError>;

    fn set_world_transform(&mut self, transform: Transform) -> Result<(), WorldError>;
}

/// A node living in a shared [`Scene`].
#[derive(Debug, Clone)]
pub struct SceneNode {
    scene: Rc<RefCell<Scene>>,
    id: EntityId,
}

impl SceneNode {
    pub fn new(scene: Rc<RefCell<Scene>>, id: EntityId) -> Result<Self, WorldError> {
        if scene.borrow().transform(id).is_none() {
            return Err(WorldError::NodeMissing(id));
        }
        Ok(Self { scene, id })
    }

    pub fn scene(&self) -> &Rc<RefCell<Scene>> {
        &self.scene
    }
}

impl HostTransform for SceneNode {
    fn entity(&self) -> EntityId {
        self.id
    }

    fn world_transform(&self) -> Result<Transform, WorldError> {
        self.scene
            .borrow()
            .transform(self.id)
            .ok_or(WorldError::NodeMissing(self.id))
    }

    fn set_world_transform(&mut self, transform: Transform) -> Result<(), WorldError> {
        self.scene.borrow_mut().set_transform(self.id, transform)
    }
}
