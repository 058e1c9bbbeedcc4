use anyhow::{Context, bail};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use strider_character::CharacterConfig;

/// A scripted simulation: static geometry, props and characters with inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Scenario {
    pub gravity: Vec3,
    pub dt: f32,
    pub ticks: u64,
    #[serde(with = "serde_yaml::with::singleton_map_recursive")]
    pub statics: Vec<StaticSpec>,
    pub props: Vec<PropSpec>,
    pub characters: Vec<CharacterSpec>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -9.8, 0.0),
            dt: 1.0 / 60.0,
            ticks: 120,
            statics: Vec::new(),
            props: Vec::new(),
            characters: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum StaticSpec {
    Plane { point: Vec3, normal: Vec3 },
    Sphere { center: Vec3, radius: f32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PropSpec {
    pub name: String,
    pub center: Vec3,
    pub radius: f32,
    pub mass: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CharacterSpec {
    pub name: String,
    pub position: Vec3,
    #[serde(default)]
    pub yaw_degrees: f32,
    #[serde(default)]
    pub config: CharacterConfig,
    #[serde(default)]
    pub inputs: Vec<InputSpec>,
}

/// Input changes applied at the start of tick `at_tick`. Unset fields keep
/// their previous value.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InputSpec {
    pub at_tick: u64,
    pub velocity: Option<Vec3>,
    pub forward: Option<f32>,
    pub right: Option<f32>,
    /// Jump height; forced jumps ignore whether the character is airborne.
    pub jump: Option<f32>,
    pub force_jump: bool,
    pub rotate_degrees: Option<f32>,
    pub physics: Option<bool>,
    pub reset: bool,
}

impl Scenario {
    pub fn from_yaml_str(source: &str) -> anyhow::Result<Self> {
        let scenario: Self = serde_yaml::from_str(source).context("parsing scenario YAML")?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        Self::from_yaml_str(&source).with_context(|| format!("loading {}", path.display()))
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !(self.dt.is_finite() && self.dt > 0.0) {
            bail!("dt must be positive, got {}", self.dt);
        }
        for (i, s) in self.statics.iter().enumerate() {
            match s {
                StaticSpec::Plane { normal, .. } if normal.length_squared() == 0.0 => {
                    bail!("static #{i}: plane normal must be non-zero");
                }
                StaticSpec::Sphere { radius, .. } if *radius <= 0.0 => {
                    bail!("static #{i}: sphere radius must be positive");
                }
                _ => {}
            }
        }
        for prop in &self.props {
            if prop.radius <= 0.0 || prop.mass <= 0.0 {
                bail!("prop {}: radius and mass must be positive", prop.name);
            }
        }
        let mut names = std::collections::BTreeSet::new();
        for c in &self.characters {
            if !names.insert(c.name.as_str()) {
                bail!("duplicate character name {}", c.name);
            }
            c.config
                .validate()
                .with_context(|| format!("character {}", c.name))?;
        }
        Ok(())
    }
}
