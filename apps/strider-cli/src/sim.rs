use std::cell::RefCell;
use std::rc::Rc;

use anyhow::Context;
use glam::{Quat, Vec3};
use serde::Serialize;
use strider_character::CharacterController;
use strider_common::{EntityId, ObjectId, Transform};
use strider_kernel::{Collider, CollisionWorld, ContactEvent, PhysicsWorld, Scene};

use crate::scenario::{InputSpec, Scenario, StaticSpec};

struct Character {
    name: String,
    entity: EntityId,
    controller: Rc<RefCell<CharacterController>>,
    inputs: Vec<InputSpec>,
}

/// A scenario instantiated on the reference collision world.
pub struct Simulation {
    world: CollisionWorld,
    scene: Rc<RefCell<Scene>>,
    characters: Vec<Character>,
    props: Vec<(String, ObjectId)>,
    dt: f32,
    contacts_started: usize,
    contacts_stopped: usize,
}

/// End-of-run state, printed or emitted as JSON.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub ticks: u64,
    pub characters: Vec<CharacterSummary>,
    pub props: Vec<PropSummary>,
    pub contacts_started: usize,
    pub contacts_stopped: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CharacterSummary {
    pub name: String,
    pub position: Vec3,
    pub velocity: Vec3,
    pub fall_velocity: Vec3,
    pub grounded: bool,
    pub colliding: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PropSummary {
    pub name: String,
    pub position: Vec3,
    pub velocity: Vec3,
}

impl Simulation {
    pub fn new(scenario: &Scenario) -> anyhow::Result<Self> {
        let mut world = CollisionWorld::new(scenario.gravity);
        for s in &scenario.statics {
            let collider = match *s {
                StaticSpec::Plane { point, normal } => Collider::plane_through(point, normal),
                StaticSpec::Sphere { center, radius } => Collider::Sphere { center, radius },
            };
            world.add_fixed(collider);
        }
        let props = scenario
            .props
            .iter()
            .map(|p| (p.name.clone(), world.add_prop(p.center, p.radius, p.mass)))
            .collect();

        let scene = Scene::shared();
        let mut characters = Vec::with_capacity(scenario.characters.len());
        for spec in &scenario.characters {
            let transform = Transform {
                rotation: Quat::from_rotation_y(spec.yaw_degrees.to_radians()),
                ..Transform::from_position(spec.position)
            };
            let entity = scene.borrow_mut().spawn(transform);
            let controller =
                CharacterController::attach_to_scene(&mut world, &scene, entity, &spec.config)
                    .with_context(|| format!("attaching character {}", spec.name))?;
            tracing::info!(name = %spec.name, %entity, "character spawned");
            let mut inputs = spec.inputs.clone();
            inputs.sort_by_key(|i| i.at_tick);
            characters.push(Character {
                name: spec.name.clone(),
                entity,
                controller,
                inputs,
            });
        }

        Ok(Self {
            world,
            scene,
            characters,
            props,
            dt: scenario.dt,
            contacts_started: 0,
            contacts_stopped: 0,
        })
    }

    /// Apply due inputs, then step the world once.
    pub fn step(&mut self) -> anyhow::Result<()> {
        let tick = self.world.tick();
        for character in &self.characters {
            let mut controller = character.controller.borrow_mut();
            for input in character.inputs.iter().filter(|i| i.at_tick == tick) {
                apply_input(&mut controller, &mut self.world, input)
                    .with_context(|| format!("tick {tick}: input for {}", character.name))?;
            }
        }
        self.world.step(self.dt);
        for event in self.world.drain_contact_events() {
            match event {
                ContactEvent::Started(_) => self.contacts_started += 1,
                ContactEvent::Stopped(_) => self.contacts_stopped += 1,
            }
        }
        Ok(())
    }

    pub fn run(&mut self, ticks: u64) -> anyhow::Result<Summary> {
        let _span = tracing::info_span!("simulate", ticks).entered();
        for _ in 0..ticks {
            self.step()?;
        }
        self.summary()
    }

    pub fn summary(&self) -> anyhow::Result<Summary> {
        let scene = self.scene.borrow();
        let characters = self
            .characters
            .iter()
            .map(|c| {
                let position = scene
                    .transform(c.entity)
                    .with_context(|| format!("character {} lost its node", c.name))?
                    .position;
                let controller = c.controller.borrow();
                Ok(CharacterSummary {
                    name: c.name.clone(),
                    position,
                    velocity: controller.current_velocity(),
                    fall_velocity: controller.fall_velocity(),
                    grounded: controller.is_grounded(),
                    colliding: controller.is_colliding(),
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        let props = self
            .props
            .iter()
            .map(|(name, id)| PropSummary {
                name: name.clone(),
                position: self.world.object_position(*id).unwrap_or(Vec3::ZERO),
                velocity: self.world.prop_velocity(*id).unwrap_or(Vec3::ZERO),
            })
            .collect();
        Ok(Summary {
            ticks: self.world.tick(),
            characters,
            props,
            contacts_started: self.contacts_started,
            contacts_stopped: self.contacts_stopped,
        })
    }
}

fn apply_input(
    controller: &mut CharacterController,
    world: &mut dyn PhysicsWorld,
    input: &InputSpec,
) -> anyhow::Result<()> {
    if input.reset {
        controller.reset_velocity_state();
    }
    if let Some(physics) = input.physics {
        controller.set_physics_enabled(physics);
    }
    if let Some(velocity) = input.velocity {
        controller.set_velocity(velocity);
    }
    if let Some(forward) = input.forward {
        controller.set_forward_velocity(forward);
    }
    if let Some(right) = input.right {
        controller.set_right_velocity(right);
    }
    if let Some(degrees) = input.rotate_degrees {
        controller.rotate(world, Quat::from_rotation_y(degrees.to_radians()))?;
    }
    if let Some(height) = input.jump {
        controller.jump(world, height, input.force_jump);
    }
    Ok(())
}
