use glam::Vec3;

use crate::Transform;

/// Errors from constructing collision shapes.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ShapeError {
    #[error("capsule radius must be positive and finite, got {0}")]
    Radius(f32),
    #[error("capsule height {height} must be finite and at least twice the radius {radius}")]
    Height { radius: f32, height: f32 },
}

/// A Y-aligned capsule centred on its transform origin.
///
/// `height` is the full extent from the bottom of the lower cap to the top of
/// the upper cap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Capsule {
    radius: f32,
    height: f32,
}

impl Capsule {
    pub fn new(radius: f32, height: f32) -> Result<Self, ShapeError> {
        if !(radius.is_finite() && radius > 0.0) {
            return Err(ShapeError::Radius(radius));
        }
        if !height.is_finite() || height < 2.0 * radius {
            return Err(ShapeError::Height { radius, height });
        }
        Ok(Self { radius, height })
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    /// Half length of the inner segment between the two cap centres.
    pub fn half_segment(&self) -> f32 {
        (self.height * 0.5 - self.radius).max(0.0)
    }

    /// World-space endpoints of the inner segment (bottom, top).
    pub fn segment(&self, transform: &Transform) -> (Vec3, Vec3) {
        let axis = transform.rotation * Vec3::Y * self.half_segment();
        (transform.position - axis, transform.position + axis)
    }
}

impl Default for Capsule {
    fn default() -> Self {
        Self {
            radius: 0.5,
            height: 2.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_dimensions() {
        assert_eq!(Capsule::new(0.0, 1.0), Err(ShapeError::Radius(0.0)));
        assert!(Capsule::new(f32::NAN, 1.0).is_err());
        assert!(matches!(
            Capsule::new(1.0, 1.5),
            Err(ShapeError::Height { .. })
        ));
    }

    #[test]
    fn sphere_like_capsule_has_no_segment() {
        let c = Capsule::new(0.5, 1.0).unwrap();
        assert_eq!(c.half_segment(), 0.0);
    }

    #[test]
    fn segment_is_vertical_for_identity() {
        let c = Capsule::new(0.5, 2.0).unwrap();
        let (a, b) = c.segment(&Transform::from_position(Vec3::new(0.0, 1.0, 0.0)));
        assert_eq!(a, Vec3::new(0.0, 0.5, 0.0));
        assert_eq!(b, Vec3::new(0.0, 1.5, 0.0));
    }
}
