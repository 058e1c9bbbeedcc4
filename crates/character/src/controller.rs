use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use glam::{Quat, Vec3};
use strider_common::{EntityId, ObjectId, Transform};
use strider_kernel::{
    ActionId, HostTransform, ListenerId, PhysicsWorld, Scene, SceneNode, SharedAction, TickAction,
};

use crate::config::{CharacterConfig, validate_slope};
use crate::error::CharacterError;
use crate::gate::NotifyGate;
use crate::horizontal::{HorizontalMover, MoveRequest};
use crate::penetration::PenetrationResolver;
use crate::proxy::CollisionProxy;
use crate::velocity::{self, ComposedVelocity, VelocityInputs};
use crate::vertical::VerticalStepper;

/// Step used to size jumps before the first tick has run.
const DEFAULT_DT: f32 = 1.0 / 60.0;

/// Listener registration on a [`Scene`], removed again on detach.
struct Subscription {
    scene: Rc<RefCell<Scene>>,
    entity: EntityId,
    listener: ListenerId,
}

/// Kinematic character controller bound to one host node.
///
/// Each tick runs penetration recovery, the step-up slot, a sweep-and-slide
/// horizontal move and gravity with landing, then writes the result back to
/// both the world proxy and the host node.
///
/// # Invariants
/// - `cos_slope_angle` always equals `cos(max_slope_angle)`.
/// - `fall_velocity` changes only through gravity, jumps, landings and resets.
/// - Host notifications caused by the controller's own commit are ignored.
pub struct CharacterController {
    host: Box<dyn HostTransform>,
    proxy: CollisionProxy,
    action: Option<ActionId>,
    subscription: Option<Subscription>,
    attached: bool,

    move_velocity: Vec3,
    forward_speed: f32,
    right_speed: f32,
    animation_velocities: BTreeMap<String, Vec3>,
    fall_velocity: Vec3,
    normalized_velocity: Vec3,
    current_velocity: Vec3,

    colliding: bool,
    collision_normal: Vec3,
    grounded: bool,

    step_height: f32,
    max_slope_angle: f32,
    cos_slope_angle: f32,
    mass: f32,
    physics_enabled: bool,
    last_dt: f32,

    gate: NotifyGate,
    pending: Rc<Cell<Option<Transform>>>,

    resolver: PenetrationResolver,
    mover: HorizontalMover,
    stepper: VerticalStepper,
}

impl std::fmt::Debug for CharacterController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CharacterController")
            .field("entity", &self.host.entity())
            .field("proxy", &self.proxy.id())
            .field("current_velocity", &self.current_velocity)
            .field("fall_velocity", &self.fall_velocity)
            .field("grounded", &self.grounded)
            .field("physics_enabled", &self.physics_enabled)
            .finish()
    }
}

impl CharacterController {
    /// Validate `config`, read the host transform and register a proxy there.
    ///
    /// The controller is not yet ticked by the world; see [`Self::attach`].
    pub fn new(
        world: &mut dyn PhysicsWorld,
        host: Box<dyn HostTransform>,
        config: &CharacterConfig,
    ) -> Result<Self, CharacterError> {
        let shape = config.validate()?;
        let transform = host.world_transform()?;
        let proxy = CollisionProxy::register(world, shape, transform, config.groups);
        tracing::info!(entity = %host.entity(), proxy = ?proxy.id(), "character attached");

        Ok(Self {
            host,
            proxy,
            action: None,
            subscription: None,
            attached: true,
            move_velocity: Vec3::ZERO,
            forward_speed: 0.0,
            right_speed: 0.0,
            animation_velocities: BTreeMap::new(),
            fall_velocity: Vec3::ZERO,
            normalized_velocity: Vec3::ZERO,
            current_velocity: Vec3::ZERO,
            colliding: false,
            collision_normal: Vec3::ZERO,
            grounded: false,
            step_height: config.max_step_height,
            max_slope_angle: config.max_slope_angle,
            cos_slope_angle: config.max_slope_angle.to_radians().cos(),
            mass: config.mass,
            physics_enabled: true,
            last_dt: DEFAULT_DT,
            gate: NotifyGate::new(),
            pending: Rc::new(Cell::new(None)),
            resolver: PenetrationResolver::default(),
            mover: HorizontalMover::default(),
            stepper: VerticalStepper,
        })
    }

    /// Create a controller and register it as a per-tick action of `world`.
    pub fn attach(
        world: &mut dyn PhysicsWorld,
        host: Box<dyn HostTransform>,
        config: &CharacterConfig,
    ) -> Result<Rc<RefCell<Self>>, CharacterError> {
        let controller = Rc::new(RefCell::new(Self::new(world, host, config)?));
        let action: SharedAction = controller.clone();
        let id = world.add_action(action);
        controller.borrow_mut().action = Some(id);
        Ok(controller)
    }

    /// [`Self::attach`] to a scene node, resyncing the proxy whenever
    /// something else moves the node.
    pub fn attach_to_scene(
        world: &mut dyn PhysicsWorld,
        scene: &Rc<RefCell<Scene>>,
        entity: EntityId,
        config: &CharacterConfig,
    ) -> Result<Rc<RefCell<Self>>, CharacterError> {
        let node = SceneNode::new(Rc::clone(scene), entity)?;
        let controller = Self::attach(world, Box::new(node), config)?;
        let listener = controller.borrow().transform_listener();
        let subscribed = scene.borrow_mut().subscribe(entity, listener);
        match subscribed {
            Ok(listener) => {
                controller.borrow_mut().subscription = Some(Subscription {
                    scene: Rc::clone(scene),
                    entity,
                    listener,
                });
                Ok(controller)
            }
            Err(err) => {
                controller.borrow_mut().detach(world)?;
                Err(err.into())
            }
        }
    }

    /// Deregister the proxy and the tick action, and drop scratch state.
    ///
    /// Detaching twice is a no-op.
    pub fn detach(&mut self, world: &mut dyn PhysicsWorld) -> Result<(), CharacterError> {
        if !self.attached {
            return Ok(());
        }
        self.attached = false;
        if let Some(id) = self.action.take() {
            world.remove_action(id)?;
        }
        if let Some(sub) = self.subscription.take() {
            sub.scene.borrow_mut().unsubscribe(sub.entity, sub.listener);
        }
        self.proxy.deregister(world)?;
        self.pending.set(None);
        self.reset_velocity_state();
        self.colliding = false;
        self.grounded = false;
        tracing::info!(entity = %self.host.entity(), "character detached");
        Ok(())
    }

    /// Listener for host transform changes.
    ///
    /// Moves made while the controller commits are ignored; anything else is
    /// stored and applied to the proxy at the start of the next tick.
    pub fn transform_listener(&self) -> impl FnMut(EntityId, &Transform) + 'static {
        let gate = self.gate.clone();
        let pending = Rc::clone(&self.pending);
        move |_, transform| {
            if !gate.is_suppressed() {
                pending.set(Some(*transform));
            }
        }
    }

    /// Direct notification hook for hosts that call the controller themselves.
    ///
    /// Returns whether the proxy was moved.
    pub fn on_transform_changed(
        &mut self,
        world: &mut dyn PhysicsWorld,
        transform: Transform,
    ) -> Result<bool, CharacterError> {
        if self.gate.is_suppressed() {
            return Ok(false);
        }
        self.pending.set(None);
        world.set_proxy_transform(self.proxy.id(), transform)?;
        Ok(true)
    }

    /// Run one tick of the movement pipeline.
    pub fn on_tick(
        &mut self,
        world: &mut dyn PhysicsWorld,
        dt: f32,
    ) -> Result<(), CharacterError> {
        let entity = self.host.entity();
        let _span = tracing::info_span!("character_tick", %entity).entered();
        if dt > 0.0 {
            self.last_dt = dt;
        }

        if let Some(external) = self.pending.take() {
            world.set_proxy_transform(self.proxy.id(), external)?;
            tracing::debug!(position = ?external.position, "proxy resynced to external move");
        }

        self.colliding = false;
        if self.physics_enabled {
            let recovery = self.resolver.recover(world, self.proxy.id())?;
            self.colliding = recovery.collided;
            if let Some(normal) = recovery.normal {
                self.collision_normal = normal;
            }
            if recovery.unresolved {
                tracing::warn!(
                    %entity,
                    passes = recovery.passes,
                    residual = recovery.residual,
                    "character still penetrating after recovery"
                );
            }
        }

        let transform = self.proxy.sync(world)?;
        let mut position = transform.position;

        self.stepper.step_up(&mut position, self.step_height);

        let composed = self.compose(&transform);
        self.normalized_velocity = composed.direction;
        self.current_velocity = composed.velocity();
        let request = MoveRequest {
            velocity: composed,
            contact: self.colliding.then_some(self.collision_normal),
            mass: self.mass,
            physics_enabled: self.physics_enabled,
            dt,
        };
        self.mover
            .move_horizontal(world, &self.proxy, &mut position, &request);

        if self.physics_enabled {
            let landing = self.stepper.step_down(
                world,
                &self.proxy,
                &mut position,
                &mut self.fall_velocity,
                self.cos_slope_angle,
                dt,
            );
            self.grounded = landing.is_some();
        } else {
            self.grounded = false;
        }

        self.commit(world, position)
    }

    fn compose(&self, transform: &Transform) -> ComposedVelocity {
        let extra: Vec<Vec3> = self.animation_velocities.values().copied().collect();
        velocity::compose(&VelocityInputs {
            move_velocity: self.move_velocity,
            forward_speed: self.forward_speed,
            right_speed: self.right_speed,
            forward_axis: transform.forward(),
            right_axis: transform.right(),
            extra: &extra,
        })
    }

    /// Write `position` to the proxy and the host with notifications suppressed.
    fn commit(
        &mut self,
        world: &mut dyn PhysicsWorld,
        position: Vec3,
    ) -> Result<(), CharacterError> {
        let _suppress = self.gate.suppress();
        self.proxy.set_position(world, position)?;
        let host = self.host.world_transform()?;
        self.host.set_world_transform(host.with_position(position))?;
        Ok(())
    }

    /// Launch upwards so the character rises about `height` against gravity.
    ///
    /// Ignored while already moving vertically unless `force` is set.
    pub fn jump(&mut self, world: &dyn PhysicsWorld, height: f32, force: bool) {
        if !force && self.fall_velocity != Vec3::ZERO {
            return;
        }
        // Fall velocity is applied once per tick, so v^2 = 2gh picks up a dt.
        let launch = -world.gravity() * height * 2.0 * self.last_dt;
        self.fall_velocity += Vec3::new(
            signed_sqrt(launch.x),
            signed_sqrt(launch.y),
            signed_sqrt(launch.z),
        );
        self.grounded = false;
        tracing::debug!(entity = %self.host.entity(), height, "jump");
    }

    /// Zero every velocity the controller holds.
    pub fn reset_velocity_state(&mut self) {
        self.move_velocity = Vec3::ZERO;
        self.forward_speed = 0.0;
        self.right_speed = 0.0;
        self.fall_velocity = Vec3::ZERO;
        self.normalized_velocity = Vec3::ZERO;
        self.current_velocity = Vec3::ZERO;
        self.animation_velocities.clear();
    }

    /// Rotate the host node and proxy by `rotation`.
    pub fn rotate(
        &mut self,
        world: &mut dyn PhysicsWorld,
        rotation: Quat,
    ) -> Result<(), CharacterError> {
        let current = self.host.world_transform()?.rotation;
        self.set_rotation(world, (rotation * current).normalize())
    }

    pub fn set_rotation(
        &mut self,
        world: &mut dyn PhysicsWorld,
        rotation: Quat,
    ) -> Result<(), CharacterError> {
        let _suppress = self.gate.suppress();
        let mut host = self.host.world_transform()?;
        host.rotation = rotation;
        self.host.set_world_transform(host)?;
        let mut proxy = world.proxy_transform(self.proxy.id())?;
        proxy.rotation = rotation;
        world.set_proxy_transform(self.proxy.id(), proxy)?;
        Ok(())
    }

    pub fn set_velocity(&mut self, velocity: Vec3) {
        self.move_velocity = velocity;
    }

    pub fn velocity(&self) -> Vec3 {
        self.move_velocity
    }

    pub fn set_forward_velocity(&mut self, speed: f32) {
        self.forward_speed = speed;
    }

    pub fn forward_velocity(&self) -> f32 {
        self.forward_speed
    }

    pub fn set_right_velocity(&mut self, speed: f32) {
        self.right_speed = speed;
    }

    pub fn right_velocity(&self) -> f32 {
        self.right_speed
    }

    /// Add or replace a named animation move velocity.
    pub fn set_animation_velocity(&mut self, name: impl Into<String>, velocity: Vec3) {
        self.animation_velocities.insert(name.into(), velocity);
    }

    pub fn clear_animation_velocity(&mut self, name: &str) -> Option<Vec3> {
        self.animation_velocities.remove(name)
    }

    pub fn set_max_step_height(&mut self, height: f32) {
        self.step_height = height.max(0.0);
    }

    pub fn max_step_height(&self) -> f32 {
        self.step_height
    }

    /// Set the steepest walkable slope, in degrees.
    pub fn set_max_slope_angle(&mut self, degrees: f32) -> Result<(), CharacterError> {
        validate_slope(degrees)?;
        self.max_slope_angle = degrees;
        self.cos_slope_angle = degrees.to_radians().cos();
        Ok(())
    }

    pub fn max_slope_angle(&self) -> f32 {
        self.max_slope_angle
    }

    pub fn set_mass(&mut self, mass: f32) {
        self.mass = mass.max(0.0);
    }

    pub fn mass(&self) -> f32 {
        self.mass
    }

    /// With physics disabled the character moves freely: no recovery, no
    /// sweeps and no gravity.
    pub fn set_physics_enabled(&mut self, enabled: bool) {
        self.physics_enabled = enabled;
    }

    pub fn is_physics_enabled(&self) -> bool {
        self.physics_enabled
    }

    pub fn entity(&self) -> EntityId {
        self.host.entity()
    }

    pub fn proxy_id(&self) -> ObjectId {
        self.proxy.id()
    }

    /// Combined horizontal velocity of the last tick.
    pub fn current_velocity(&self) -> Vec3 {
        self.current_velocity
    }

    pub fn normalized_velocity(&self) -> Vec3 {
        self.normalized_velocity
    }

    pub fn fall_velocity(&self) -> Vec3 {
        self.fall_velocity
    }

    pub fn is_colliding(&self) -> bool {
        self.colliding
    }

    pub fn collision_normal(&self) -> Vec3 {
        self.collision_normal
    }

    /// The last tick ended standing on walkable ground.
    pub fn is_grounded(&self) -> bool {
        self.grounded
    }

    /// An external move is waiting to be applied to the proxy.
    pub fn has_pending_resync(&self) -> bool {
        self.pending.get().is_some()
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }
}

impl TickAction for CharacterController {
    fn update_action(&mut self, world: &mut dyn PhysicsWorld, dt: f32) {
        if let Err(err) = self.on_tick(world, dt) {
            tracing::error!(entity = %self.host.entity(), %err, "character tick failed");
        }
    }
}

fn signed_sqrt(v: f32) -> f32 {
    v.abs().sqrt().copysign(v)
}
