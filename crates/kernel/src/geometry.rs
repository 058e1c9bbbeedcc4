//! Closed-form capsule distance queries used by the reference world.

use glam::Vec3;

const EPSILON: f32 = 1e-6;

/// Separation between a capsule and another shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Proximity {
    /// Signed distance between surfaces. Negative when overlapping.
    pub distance: f32,
    /// Unit normal pointing from the other shape towards the capsule.
    pub normal: Vec3,
    /// Closest point on the other shape's surface.
    pub point: Vec3,
}

/// Closest point to `p` on the segment `a..b`.
pub fn closest_on_segment(p: Vec3, a: Vec3, b: Vec3) -> Vec3 {
    let ab = b - a;
    let len2 = ab.length_squared();
    if len2 <= EPSILON {
        return a;
    }
    let t = ((p - a).dot(ab) / len2).clamp(0.0, 1.0);
    a + ab * t
}

/// Closest points between segments `p1..q1` and `p2..q2`.
pub fn closest_between_segments(p1: Vec3, q1: Vec3, p2: Vec3, q2: Vec3) -> (Vec3, Vec3) {
    let d1 = q1 - p1;
    let d2 = q2 - p2;
    let r = p1 - p2;
    let a = d1.length_squared();
    let e = d2.length_squared();
    let f = d2.dot(r);

    if a <= EPSILON && e <= EPSILON {
        return (p1, p2);
    }
    let (s, t) = if a <= EPSILON {
        (0.0, (f / e).clamp(0.0, 1.0))
    } else {
        let c = d1.dot(r);
        if e <= EPSILON {
            ((-c / a).clamp(0.0, 1.0), 0.0)
        } else {
            let b = d1.dot(d2);
            let denom = a * e - b * b;
            let mut s = if denom > EPSILON {
                ((b * f - c * e) / denom).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let mut t = (b * s + f) / e;
            if t < 0.0 {
                t = 0.0;
                s = (-c / a).clamp(0.0, 1.0);
            } else if t > 1.0 {
                t = 1.0;
                s = ((b - c) / a).clamp(0.0, 1.0);
            }
            (s, t)
        }
    };
    (p1 + d1 * s, p2 + d2 * t)
}

/// Capsule (segment `a..b`, `radius`) against the half-space `normal.x <= offset`.
pub fn capsule_plane(a: Vec3, b: Vec3, radius: f32, normal: Vec3, offset: f32) -> Proximity {
    let sa = normal.dot(a) - offset;
    let sb = normal.dot(b) - offset;
    let (deepest, s) = if sa <= sb { (a, sa) } else { (b, sb) };
    Proximity {
        distance: s - radius,
        normal,
        point: deepest - normal * s,
    }
}

/// Capsule against a sphere.
pub fn capsule_sphere(a: Vec3, b: Vec3, radius: f32, center: Vec3, sphere_radius: f32) -> Proximity {
    let q = closest_on_segment(center, a, b);
    let (normal, len) = direction_or_up(q - center);
    Proximity {
        distance: len - radius - sphere_radius,
        normal,
        point: center + normal * sphere_radius,
    }
}

/// Capsule against another capsule (segment `c..d`, `other_radius`).
pub fn capsule_capsule(
    a: Vec3,
    b: Vec3,
    radius: f32,
    c: Vec3,
    d: Vec3,
    other_radius: f32,
) -> Proximity {
    let (on_self, on_other) = closest_between_segments(a, b, c, d);
    let (normal, len) = direction_or_up(on_self - on_other);
    Proximity {
        distance: len - radius - other_radius,
        normal,
        point: on_other + normal * other_radius,
    }
}

fn direction_or_up(delta: Vec3) -> (Vec3, f32) {
    let len = delta.length();
    if len > EPSILON {
        (delta / len, len)
    } else {
        (Vec3::Y, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_projection_clamps() {
        let a = Vec3::ZERO;
        let b = Vec3::new(0.0, 2.0, 0.0);
        assert_eq!(closest_on_segment(Vec3::new(1.0, 1.0, 0.0), a, b), Vec3::Y);
        assert_eq!(closest_on_segment(Vec3::new(0.0, 5.0, 0.0), a, b), b);
        assert_eq!(closest_on_segment(Vec3::new(0.0, -5.0, 0.0), a, b), a);
    }

    #[test]
    fn parallel_segments() {
        let (p, q) = closest_between_segments(
            Vec3::ZERO,
            Vec3::Y,
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::new(2.0, 1.0, 0.0),
        );
        assert!(((p - q).length() - 2.0).abs() < 1e-5);
    }

    #[test]
    fn crossing_segments() {
        let (p, q) = closest_between_segments(
            Vec3::new(-1.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, -1.0),
            Vec3::new(0.0, 1.0, 1.0),
        );
        assert!((p - Vec3::ZERO).length() < 1e-5);
        assert!((q - Vec3::Y).length() < 1e-5);
    }

    #[test]
    fn capsule_resting_on_floor() {
        // Capsule bottom cap centre at y=0.5, radius 0.5: touching y=0.
        let p = capsule_plane(
            Vec3::new(0.0, 0.5, 0.0),
            Vec3::new(0.0, 1.5, 0.0),
            0.5,
            Vec3::Y,
            0.0,
        );
        assert!(p.distance.abs() < 1e-6);
        assert_eq!(p.normal, Vec3::Y);
        assert_eq!(p.point, Vec3::ZERO);
    }

    #[test]
    fn capsule_sinking_into_floor() {
        let p = capsule_plane(
            Vec3::new(0.0, 0.3, 0.0),
            Vec3::new(0.0, 1.3, 0.0),
            0.5,
            Vec3::Y,
            0.0,
        );
        assert!((p.distance + 0.2).abs() < 1e-6);
    }

    #[test]
    fn capsule_next_to_sphere() {
        let p = capsule_sphere(
            Vec3::ZERO,
            Vec3::Y,
            0.5,
            Vec3::new(2.0, 0.5, 0.0),
            1.0,
        );
        assert!((p.distance - 0.5).abs() < 1e-6);
        assert!((p.normal - Vec3::NEG_X).length() < 1e-6);
    }

    #[test]
    fn coincident_centres_fall_back_to_up() {
        let p = capsule_sphere(Vec3::ZERO, Vec3::ZERO, 0.5, Vec3::ZERO, 0.5);
        assert_eq!(p.normal, Vec3::Y);
        assert_eq!(p.distance, -1.0);
    }

    #[test]
    fn side_by_side_capsules() {
        let p = capsule_capsule(
            Vec3::ZERO,
            Vec3::Y,
            0.5,
            Vec3::new(0.8, 0.0, 0.0),
            Vec3::new(0.8, 1.0, 0.0),
            0.5,
        );
        assert!((p.distance + 0.2).abs() < 1e-5);
        assert!((p.normal - Vec3::NEG_X).length() < 1e-5);
    }
}
