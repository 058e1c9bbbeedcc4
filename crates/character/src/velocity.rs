//! Combines the separate movement inputs into one velocity.

use glam::Vec3;

/// Everything that contributes to a character's horizontal motion this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocityInputs<'a> {
    /// Manual velocity, e.g. from input.
    pub move_velocity: Vec3,
    /// Signed speed along the model's facing.
    pub forward_speed: f32,
    /// Signed speed along the right axis.
    pub right_speed: f32,
    /// Forward vector of the actor (-Z convention). Motion runs along its negation.
    pub forward_axis: Vec3,
    pub right_axis: Vec3,
    /// External per-animation move velocities.
    pub extra: &'a [Vec3],
}

/// Output of [`compose`]: a unit direction and a speed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComposedVelocity {
    pub direction: Vec3,
    pub speed: f32,
}

impl ComposedVelocity {
    pub const ZERO: Self = Self {
        direction: Vec3::ZERO,
        speed: 0.0,
    };

    pub fn velocity(&self) -> Vec3 {
        self.direction * self.speed
    }

    pub fn is_zero(&self) -> bool {
        self.direction == Vec3::ZERO || self.speed == 0.0
    }
}

/// Combine all inputs into one velocity.
///
/// Contributions are summed for direction only. The speed is the largest
/// single contribution, not their sum: pressing forward and strafe together
/// turns the character diagonally without making it faster.
pub fn compose(inputs: &VelocityInputs<'_>) -> ComposedVelocity {
    let mut direction = Vec3::ZERO;
    let mut speed_sq = 0.0_f32;

    if inputs.move_velocity != Vec3::ZERO {
        direction = inputs.move_velocity;
        speed_sq = inputs.move_velocity.length_squared();
    }
    if inputs.forward_speed != 0.0 {
        direction += -inputs.forward_axis.normalize_or_zero() * inputs.forward_speed;
        speed_sq = speed_sq.abs().max(inputs.forward_speed * inputs.forward_speed);
    }
    if inputs.right_speed != 0.0 {
        direction += inputs.right_axis.normalize_or_zero() * inputs.right_speed;
        speed_sq = speed_sq.abs().max(inputs.right_speed * inputs.right_speed);
    }
    for extra in inputs.extra.iter().filter(|v| **v != Vec3::ZERO) {
        direction += *extra;
        speed_sq = speed_sq.max(extra.length_squared());
    }

    match direction.try_normalize() {
        Some(direction) => ComposedVelocity {
            direction,
            speed: speed_sq.sqrt(),
        },
        None => ComposedVelocity::ZERO,
    }
}
