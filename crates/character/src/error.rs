use strider_common::ShapeError;
use strider_kernel::WorldError;

/// Errors raised while setting up or driving a character.
///
/// Per-tick degeneracies never surface here; only structural misuse does.
#[derive(Debug, thiserror::Error)]
pub enum CharacterError {
    #[error("invalid capsule: {0}")]
    InvalidCapsule(#[from] ShapeError),
    #[error("invalid character config: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    World(#[from] WorldError),
    #[error("config parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
