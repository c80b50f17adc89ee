//! Pure vector helpers for moving along surfaces.
//!
//! None of these touch the world. They turn a desired displacement plus one or two surface
//! normals into the displacement that hugs those surfaces.

use crate::constants::{ALMOST_ONE, KINDA_SMALL_NUMBER, STEP_BACK_DIST};
use crate::types::{Delta, Vec3, normalize_safe};

/// Tilt a horizontal displacement onto a walkable ramp, keeping its horizontal part.
///
/// Flat and near-vertical normals leave `delta` unchanged.
pub fn ramp_vector(delta: Vec3, normal: Vec3) -> Vec3 {
    if normal.y > KINDA_SMALL_NUMBER && normal.y < ALMOST_ONE {
        let y = -delta.dot(&normal) / normal.y;
        Vec3::new(delta.x, y, delta.z)
    } else {
        delta
    }
}

/// Project a displacement onto a sloped floor so it runs down the slope.
pub fn slide_down_vector(delta: Vec3, normal: Vec3) -> Vec3 {
    if normal.y > KINDA_SMALL_NUMBER && normal.y < ALMOST_ONE {
        delta - normal * delta.dot(&normal)
    } else {
        delta
    }
}

/// Remove the part of `delta` that goes into the surface.
///
/// On the ground a slide may not climb a surface that is too steep to walk on. Such slides
/// are flattened to the horizontal plane and keep the horizontal tangent of the move.
pub fn slide_vector(delta: Vec3, normal: Vec3, min_walkable_y: f32, on_ground: bool) -> Vec3 {
    let slide = delta - normal * delta.dot(&normal);
    if !on_ground || normal.y >= min_walkable_y {
        return slide;
    }

    let planar_normal = normalize_safe(Vec3::new(normal.x, 0.0, normal.z));
    let planar = Vec3::new(delta.x, 0.0, delta.z);
    let planar_len = planar.norm();
    if planar_normal == Vec3::zeros() || planar_len <= KINDA_SMALL_NUMBER {
        return Vec3::new(slide.x, slide.y.min(0.0), slide.z);
    }
    let planar_dir = planar / planar_len;
    (planar_dir - planar_normal * planar_dir.dot(&planar_normal)) * planar_len
}

/// Redirect a move that touches two surfaces at once.
///
/// `first` is the surface just hit, `second` the one already being slid along. When the
/// surfaces form a corner (normals facing each other or perpendicular) the move follows
/// their crease. Otherwise it slides along `first`, nudging off it when both normals are
/// nearly the same. On the floor the result never points down.
pub fn two_surface_slide_vector(
    delta: Delta,
    first: Vec3,
    second: Vec3,
    on_floor: bool,
    min_walkable_y: f32,
) -> Vec3 {
    let d = delta.as_vector();
    let dot = first.dot(&second);

    let mut out = if dot <= 0.0 {
        let crease = normalize_safe(first.cross(&second));
        let along = crease * d.dot(&crease);
        if along.dot(&d) < 0.0 { -along } else { along }
    } else {
        let slide = slide_vector(d, first, min_walkable_y, on_floor);
        if slide.dot(&d) <= 0.0 {
            Vec3::zeros()
        } else if (dot - 1.0).abs() < STEP_BACK_DIST {
            slide + first * STEP_BACK_DIST
        } else {
            slide
        }
    };

    if on_floor && out.y < 0.0 {
        out.y = 0.0;
    }
    out
}

/// Clamp the length of `v` into `[min, max]`, keeping its direction.
pub fn clamp_input_length(v: Vec3, min: f32, max: f32) -> Vec3 {
    let len = v.norm();
    if len <= KINDA_SMALL_NUMBER || !len.is_finite() {
        return Vec3::zeros();
    }
    v * (len.clamp(min, max) / len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::up;
    use approx::assert_abs_diff_eq;

    fn slope(deg: f32) -> Vec3 {
        let r = deg.to_radians();
        Vec3::new(-r.sin(), r.cos(), 0.0)
    }

    #[test]
    fn ramp_follows_slope_surface() {
        let n = slope(30.0);
        let delta = Vec3::new(1.0, 0.0, 0.0);
        let out = ramp_vector(delta, n);
        assert_abs_diff_eq!(out.dot(&n), 0.0, epsilon = 1e-5);
        assert_abs_diff_eq!(out.x, 1.0);
        assert!(out.y > 0.0);
    }

    #[test]
    fn ramp_ignores_flat_floor() {
        let delta = Vec3::new(0.3, 0.0, -0.2);
        assert_eq!(ramp_vector(delta, up()), delta);
        assert_eq!(ramp_vector(delta, Vec3::x()), delta);
    }

    #[test]
    fn slide_down_removes_normal_component() {
        let n = slope(60.0);
        let out = slide_down_vector(Vec3::new(0.0, -1.0, 0.0), n);
        assert_abs_diff_eq!(out.dot(&n), 0.0, epsilon = 1e-5);
        assert!(out.x < 0.0 && out.y < 0.0, "runs downhill, got {out:?}");
    }

    #[test]
    fn wall_slide_keeps_tangent_only() {
        let wall = -Vec3::z();
        let delta = Vec3::new(0.5, 0.0, 0.5);
        let out = slide_vector(delta, wall, 0.7, true);
        assert_abs_diff_eq!(out.dot(&wall), 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(out, Vec3::new(0.5, 0.0, 0.0), epsilon = 1e-6);
    }

    #[test]
    fn grounded_slide_never_climbs_steep_surfaces() {
        let steep = normalize_safe(Vec3::new(0.0, 0.5, -1.0));
        let out = slide_vector(Vec3::new(0.0, 0.0, 1.0), steep, 0.7, true);
        assert!(out.y <= 0.0);
        let air = slide_vector(Vec3::new(0.0, 0.0, 1.0), steep, 0.7, false);
        assert!(air.y > 0.0);
    }

    #[test]
    fn corner_follows_crease() {
        let a = -Vec3::z();
        let b = -Vec3::x();
        let delta = Delta::from_vector(Vec3::new(1.0, 0.0, 1.0));
        let out = two_surface_slide_vector(delta, a, b, true, 0.7);
        assert_abs_diff_eq!(out, Vec3::zeros(), epsilon = 1e-6);

        let slanted = Delta::from_vector(Vec3::new(1.0, -0.5, 1.0));
        let out = two_surface_slide_vector(slanted, a, b, false, 0.7);
        assert_abs_diff_eq!(out, Vec3::new(0.0, -0.5, 0.0), epsilon = 1e-5);
    }

    #[test]
    fn nearly_parallel_surfaces_push_off() {
        let a = -Vec3::z();
        let b = normalize_safe(Vec3::new(0.01, 0.0, -1.0));
        let delta = Delta::from_vector(Vec3::new(1.0, 0.0, 1.0));
        let out = two_surface_slide_vector(delta, a, b, true, 0.7);
        assert_abs_diff_eq!(out.x, 1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(out.z, -STEP_BACK_DIST, epsilon = 1e-5);
    }

    #[test]
    fn clamp_input_keeps_direction() {
        let v = Vec3::new(3.0, 0.0, 4.0);
        assert_abs_diff_eq!(clamp_input_length(v, 0.0, 1.0), Vec3::new(0.6, 0.0, 0.8));
        assert_abs_diff_eq!(
            clamp_input_length(Vec3::new(0.1, 0.0, 0.0), 0.5, 1.0),
            Vec3::new(0.5, 0.0, 0.0)
        );
        assert_eq!(clamp_input_length(Vec3::zeros(), 0.0, 1.0), Vec3::zeros());
    }
}
