/*!
Convex shape value types and their support functions.

Every shape exposes `support(center, orientation, dir)`, the world point of the posed
shape farthest along `dir`. The GJK engine only ever talks to shapes through this
function, so adding a shape means adding a match arm here.

A zero (or near-zero) `dir` never produces NaN: directions go through `normalize_safe`
and each shape falls back to a deterministic point.
*/

use nalgebra as na;
use rapier3d::parry::bounding_volume::Aabb;

use crate::types::{Quat, Vec3, normalize_safe, up};

/// Capsule posed around its center.
///
/// `half_length` is half of the total height, caps included, so the medial segment spans
/// `±(half_length - radius)` along `up`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Capsule {
    pub radius: f32,
    pub half_length: f32,
    /// Local up axis (unit). Agents use world +Y.
    pub up: Vec3,
}

impl Capsule {
    /// Upright capsule with the given radius and total height.
    #[inline]
    pub fn upright(radius: f32, height: f32) -> Self {
        Self {
            radius,
            half_length: (height * 0.5).max(radius),
            up: up(),
        }
    }

    /// Half-length of the medial segment (zero for a sphere-like capsule).
    #[inline]
    pub fn segment_half(&self) -> f32 {
        (self.half_length - self.radius).max(0.0)
    }

    /// Medial-segment axis scaled to the segment half-length, in world space.
    #[inline]
    pub fn axis(&self, orientation: &Quat) -> Vec3 {
        (orientation * self.up) * self.segment_half()
    }

    #[inline]
    pub fn top_sphere_center(&self, center: Vec3) -> Vec3 {
        center + self.up * self.segment_half()
    }

    #[inline]
    pub fn bottom_sphere_center(&self, center: Vec3) -> Vec3 {
        center - self.up * self.segment_half()
    }

    /// Center of a capsule whose lowest point sits at `base`.
    #[inline]
    pub fn center_from_base(&self, base: Vec3) -> Vec3 {
        base + self.up * self.half_length
    }

    #[inline]
    pub fn base_from_center(&self, center: Vec3) -> Vec3 {
        center - self.up * self.half_length
    }

    /// A copy with the total half-length and radius reduced by the given amounts.
    #[inline]
    pub fn shrunk(&self, half_length_amt: f32, radius_amt: f32) -> Self {
        let radius = (self.radius - radius_amt).max(0.0);
        Self {
            radius,
            half_length: (self.half_length - half_length_amt).max(radius),
            up: self.up,
        }
    }

    /// Distance from `point` to the medial segment of the capsule posed at `center`.
    pub fn distance_to_segment(&self, center: Vec3, orientation: &Quat, point: Vec3) -> f32 {
        let axis = self.axis(orientation);
        let len_sq = axis.norm_squared();
        let rel = point - center;
        if len_sq <= 0.0 {
            return rel.norm();
        }
        let t = (rel.dot(&axis) / len_sq).clamp(-1.0, 1.0);
        (rel - axis * t).norm()
    }

    pub fn support(&self, center: Vec3, orientation: &Quat, dir: Vec3) -> Vec3 {
        let n = normalize_safe(dir);
        let axis = self.axis(orientation);
        // Pick the segment end on the side `dir` points to, then push out by the radius.
        let end = if dir.dot(&axis) >= 0.0 { axis } else { -axis };
        center + end + n * self.radius
    }
}

/// Convex shapes understood by the GJK engine.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Shape {
    Capsule(Capsule),
    Sphere {
        /// Radius in meters.
        radius: f32,
    },
    Box {
        /// Local-space half-extents (hx, hy, hz).
        half_extents: Vec3,
    },
}

impl Shape {
    #[inline]
    pub fn capsule(radius: f32, height: f32) -> Self {
        Shape::Capsule(Capsule::upright(radius, height))
    }

    #[inline]
    pub fn as_capsule(&self) -> Option<&Capsule> {
        match self {
            Shape::Capsule(c) => Some(c),
            _ => None,
        }
    }

    /// Farthest point of the shape (posed at `center`/`orientation`) along `dir`.
    pub fn support(&self, center: Vec3, orientation: &Quat, dir: Vec3) -> Vec3 {
        match self {
            Shape::Capsule(capsule) => capsule.support(center, orientation, dir),
            Shape::Sphere { radius } => center + normalize_safe(dir) * *radius,
            Shape::Box { half_extents } => box_support(*half_extents, center, orientation, dir),
        }
    }

    /// Radius of a sphere around the center that encloses the shape.
    pub fn bounding_radius(&self) -> f32 {
        match self {
            Shape::Capsule(capsule) => capsule.half_length.max(capsule.radius),
            Shape::Sphere { radius } => *radius,
            Shape::Box { half_extents } => half_extents.norm(),
        }
    }

    /// Horizontal radius used by broad-phase culling.
    pub fn radius(&self) -> f32 {
        match self {
            Shape::Capsule(capsule) => capsule.radius,
            Shape::Sphere { radius } => *radius,
            Shape::Box { half_extents } => half_extents.x.max(half_extents.z),
        }
    }

    /// World-space AABB of the posed shape, built from axis-aligned support queries.
    pub fn aabb(&self, center: Vec3, orientation: &Quat) -> Aabb {
        let mut mins = na::Point3::origin();
        let mut maxs = na::Point3::origin();
        for axis in 0..3 {
            let mut dir = Vec3::zeros();
            dir[axis] = 1.0;
            maxs[axis] = self.support(center, orientation, dir)[axis];
            mins[axis] = self.support(center, orientation, -dir)[axis];
        }
        Aabb { mins, maxs }
    }
}

/// Exhaustive corner scan. Eight corners is cheap and boxes are not the hot path.
fn box_support(half_extents: Vec3, center: Vec3, orientation: &Quat, dir: Vec3) -> Vec3 {
    let mut best = center;
    let mut best_dot = f32::MIN;
    for corner in 0..8u8 {
        let local = Vec3::new(
            if corner & 1 == 0 { -half_extents.x } else { half_extents.x },
            if corner & 2 == 0 { -half_extents.y } else { half_extents.y },
            if corner & 4 == 0 { -half_extents.z } else { half_extents.z },
        );
        let world = center + orientation * local;
        let d = world.dot(&dir);
        if d > best_dot {
            best_dot = d;
            best = world;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample_dirs() -> Vec<Vec3> {
        let mut dirs = Vec::new();
        for i in 0..12 {
            let theta = i as f32 * std::f32::consts::TAU / 12.0;
            for j in 1..6 {
                let phi = j as f32 * std::f32::consts::PI / 6.0;
                dirs.push(Vec3::new(
                    phi.sin() * theta.cos(),
                    phi.cos(),
                    phi.sin() * theta.sin(),
                ));
            }
        }
        dirs.push(Vec3::y());
        dirs.push(-Vec3::y());
        dirs
    }

    #[test]
    fn capsule_support_lies_on_surface() {
        let capsule = Capsule::upright(0.5, 2.0);
        let center = Vec3::new(1.0, 2.0, -3.0);
        let rot = Quat::identity();

        for d in sample_dirs() {
            let p = capsule.support(center, &rot, d);
            let dist = capsule.distance_to_segment(center, &rot, p);
            assert_relative_eq!(dist, capsule.radius, epsilon = 1.0e-4);
        }
    }

    #[test]
    fn rotated_capsule_support_follows_orientation() {
        let capsule = Capsule::upright(0.25, 2.0);
        let rot = Quat::from_axis_angle(&Vec3::z_axis(), std::f32::consts::FRAC_PI_2);
        let p = capsule.support(Vec3::zeros(), &rot, Vec3::new(-1.0, 0.0, 0.0));
        // Rotated +Y maps onto -X, so the far end along -X is the top cap.
        assert_relative_eq!(p.x, -1.0, epsilon = 1.0e-5);
        assert_relative_eq!(p.y, 0.0, epsilon = 1.0e-5);
    }

    #[test]
    fn support_is_maximal_along_direction() {
        let shapes = [
            Shape::capsule(0.4, 1.8),
            Shape::Sphere { radius: 0.7 },
            Shape::Box {
                half_extents: Vec3::new(0.5, 1.0, 0.25),
            },
        ];
        let rot = Quat::from_axis_angle(&Vec3::y_axis(), 0.3);
        for shape in shapes {
            for d in sample_dirs() {
                let best = shape.support(Vec3::zeros(), &rot, d).dot(&d);
                for other in sample_dirs() {
                    let p = shape.support(Vec3::zeros(), &rot, other);
                    assert!(p.dot(&d) <= best + 1.0e-4);
                }
            }
        }
    }

    #[test]
    fn zero_direction_returns_finite_points() {
        let rot = Quat::identity();
        let center = Vec3::new(0.0, 1.0, 0.0);
        for shape in [
            Shape::capsule(0.5, 2.0),
            Shape::Sphere { radius: 1.0 },
            Shape::Box {
                half_extents: Vec3::new(1.0, 1.0, 1.0),
            },
        ] {
            let p = shape.support(center, &rot, Vec3::zeros());
            assert!(p.iter().all(|c| c.is_finite()));
            // Deterministic: same answer twice.
            assert_eq!(p, shape.support(center, &rot, Vec3::zeros()));
        }
    }

    #[test]
    fn base_and_center_round_trip() {
        let capsule = Capsule::upright(0.5, 2.0);
        let base = Vec3::new(3.0, 0.0, 1.0);
        let center = capsule.center_from_base(base);
        assert_relative_eq!(center.y, 1.0);
        assert_relative_eq!(capsule.base_from_center(center), base);
        assert_relative_eq!(capsule.bottom_sphere_center(center).y, 0.5);
        assert_relative_eq!(capsule.top_sphere_center(center).y, 1.5);
    }

    #[test]
    fn aabb_encloses_capsule() {
        let shape = Shape::capsule(0.5, 2.0);
        let aabb = shape.aabb(Vec3::new(0.0, 1.0, 0.0), &Quat::identity());
        assert_relative_eq!(aabb.mins.y, 0.0, epsilon = 1.0e-6);
        assert_relative_eq!(aabb.maxs.y, 2.0, epsilon = 1.0e-6);
        assert_relative_eq!(aabb.mins.x, -0.5, epsilon = 1.0e-6);
        assert_relative_eq!(aabb.maxs.z, 0.5, epsilon = 1.0e-6);
    }
}
