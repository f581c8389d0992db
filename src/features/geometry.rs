//! Joint geometry in image space.
//!
//! Angles are measured in the x/y plane; z from monocular pose models is too
//! noisy to trust for joint angles.

use crate::models::Point3;

/// Angle at `vertex` formed by `a` and `b`, in degrees (0-180).
///
/// Uses the dot product formula: cos(θ) = (v1 · v2) / (|v1| × |v2|).
/// Degenerate (zero-length) limbs report 180°, i.e. straight.
pub fn joint_angle(a: Point3, vertex: Point3, b: Point3) -> f32 {
    let v1 = (a.x - vertex.x, a.y - vertex.y);
    let v2 = (b.x - vertex.x, b.y - vertex.y);

    let dot = v1.0 * v2.0 + v1.1 * v2.1;
    let mag1 = (v1.0 * v1.0 + v1.1 * v1.1).sqrt();
    let mag2 = (v2.0 * v2.0 + v2.1 * v2.1).sqrt();

    if mag1 < 1e-4 || mag2 < 1e-4 {
        return 180.0;
    }

    let cos_angle = (dot / (mag1 * mag2)).clamp(-1.0, 1.0);
    cos_angle.acos().to_degrees()
}

/// Deviation of the segment `from -> to` from image-vertical, in degrees (0-180).
pub fn lean_from_vertical(from: Point3, to: Point3) -> f32 {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let mag = (dx * dx + dy * dy).sqrt();
    if mag < 1e-4 {
        return 0.0;
    }
    // Image y grows downward, so "up" is (0, -1).
    let cos_angle = (-dy / mag).clamp(-1.0, 1.0);
    cos_angle.acos().to_degrees()
}

pub fn midpoint(a: Point3, b: Point3) -> Point3 {
    Point3 {
        x: (a.x + b.x) / 2.0,
        y: (a.y + b.y) / 2.0,
        z: (a.z + b.z) / 2.0,
    }
}

pub fn horizontal_spread(a: Point3, b: Point3) -> f32 {
    (a.x - b.x).abs()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f32, y: f32) -> Point3 {
        Point3 { x, y, z: 0.0 }
    }

    #[test]
    fn test_straight_limb() {
        let angle = joint_angle(p(0.0, 0.0), p(0.5, 0.0), p(1.0, 0.0));
        assert!((angle - 180.0).abs() < 1.0);
    }

    #[test]
    fn test_right_angle() {
        let angle = joint_angle(p(0.0, 0.0), p(0.5, 0.0), p(0.5, 0.5));
        assert!((angle - 90.0).abs() < 1.0);
    }

    #[test]
    fn test_degenerate_limb_is_straight() {
        let angle = joint_angle(p(0.5, 0.5), p(0.5, 0.5), p(1.0, 0.0));
        assert_eq!(angle, 180.0);
    }

    #[test]
    fn test_upright_trunk_has_no_lean() {
        let hips = p(0.5, 0.8);
        let shoulders = p(0.5, 0.3);
        assert!(lean_from_vertical(hips, shoulders) < 0.01);
    }

    #[test]
    fn test_forty_five_degree_lean() {
        let lean = lean_from_vertical(p(0.5, 0.8), p(0.8, 0.5));
        assert!((lean - 45.0).abs() < 0.5);
    }
}
