/*!
Core math aliases and small value types shared by the collision submodules.

This module intentionally contains no collision algorithms. It defines the data types
exchanged between:
- shape support functions and the GJK engine
- the spatial grid (broad-phase)
- the shape-query provider (static world)
- the movement resolution state machine
*/

use std::ops::Mul;

use nalgebra as na;

use crate::constants::VERY_SMALL_NUMBER;

/// Common math aliases for clarity and consistency.
pub type Vec3 = na::Vector3<f32>;
pub type Vec2 = na::Vector2<f32>;
pub type Quat = na::UnitQuaternion<f32>;
pub type Iso = na::Isometry3<f32>;

/// World up axis.
#[inline]
pub fn up() -> Vec3 {
    Vec3::new(0.0, 1.0, 0.0)
}

/// Normalize `v`, returning the zero vector instead of NaN when `v` is (near) zero.
#[inline]
pub fn normalize_safe(v: Vec3) -> Vec3 {
    let len_sq = v.norm_squared();
    if len_sq > VERY_SMALL_NUMBER && len_sq.is_finite() {
        v / len_sq.sqrt()
    } else {
        Vec3::zeros()
    }
}

/// True if any component is NaN or infinite.
#[inline]
pub fn is_non_finite(v: &Vec3) -> bool {
    !(v.x.is_finite() && v.y.is_finite() && v.z.is_finite())
}

/// Expand a planar (x, z) input into a horizontal world vector.
#[inline]
pub fn xz_to_vec3(xz: Vec2) -> Vec3 {
    Vec3::new(xz.x, 0.0, xz.y)
}

/// A directed motion: unit direction plus non-negative length.
///
/// `dir` is either a unit vector or zero (in which case `len` is zero too).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Delta {
    pub dir: Vec3,
    pub len: f32,
}

impl Delta {
    /// Build a delta from a direction (normalized safely) and a magnitude.
    #[inline]
    pub fn new(dir: Vec3, len: f32) -> Self {
        let dir = normalize_safe(dir);
        if dir == Vec3::zeros() {
            return Self::zero();
        }
        Self { dir, len }
    }

    #[inline]
    pub fn from_vector(v: Vec3) -> Self {
        let len = v.norm();
        let dir = normalize_safe(v);
        if dir == Vec3::zeros() {
            return Self::zero();
        }
        Self { dir, len }
    }

    #[inline]
    pub fn zero() -> Self {
        Self {
            dir: Vec3::zeros(),
            len: 0.0,
        }
    }

    #[inline]
    pub fn as_vector(&self) -> Vec3 {
        self.dir * self.len
    }

    #[inline]
    pub fn reversed(&self) -> Self {
        Self {
            dir: -self.dir,
            len: self.len,
        }
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.len <= 0.0 || self.dir == Vec3::zeros()
    }
}

/// Scaling by a negative factor flips the direction and keeps the length non-negative.
impl Mul<f32> for Delta {
    type Output = Delta;

    fn mul(self, rhs: f32) -> Delta {
        if rhs < 0.0 {
            Delta {
                dir: -self.dir,
                len: self.len * -rhs,
            }
        } else {
            Delta {
                dir: self.dir,
                len: self.len * rhs,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn normalize_safe_returns_zero_for_tiny_vectors() {
        assert_eq!(normalize_safe(Vec3::zeros()), Vec3::zeros());
        assert_eq!(normalize_safe(Vec3::new(1.0e-7, 0.0, 0.0)), Vec3::zeros());
        assert_eq!(
            normalize_safe(Vec3::new(f32::NAN, 0.0, 0.0)),
            Vec3::zeros()
        );

        let n = normalize_safe(Vec3::new(3.0, 0.0, 4.0));
        assert_relative_eq!(n.norm(), 1.0, epsilon = 1.0e-6);
    }

    #[test]
    fn delta_from_vector_splits_direction_and_length() {
        let d = Delta::from_vector(Vec3::new(0.0, 0.0, -2.5));
        assert_relative_eq!(d.len, 2.5);
        assert_relative_eq!(d.dir.z, -1.0);
        assert_relative_eq!(d.as_vector().z, -2.5);

        let z = Delta::from_vector(Vec3::zeros());
        assert!(z.is_zero());
        assert_eq!(z.len, 0.0);
    }

    #[test]
    fn negative_scale_flips_direction_and_keeps_length_positive() {
        let d = Delta::new(Vec3::new(1.0, 0.0, 0.0), 2.0) * -0.5;
        assert_relative_eq!(d.len, 1.0);
        assert_relative_eq!(d.dir.x, -1.0);
        assert_relative_eq!(d.as_vector().x, -1.0);
    }
}
