/*!
GJK engine: static overlap and conservative-advancement sweep between convex shapes.

Both queries run on the Minkowski difference `A - B` through the shapes' support
functions, sharing one `Simplex` and its closest-point routines.

The sweep keeps the simplex in the frame of the *currently advanced* poses: whenever the
time of impact moves forward, every stored vertex is translated by the distance each
shape travelled, so old and new support points always describe the same configuration.

Numerical trouble is never fatal. Hitting the iteration cap is logged and reported as
`Diverged`, which callers treat as "no collision this test".
*/

use log::{trace, warn};

use crate::constants::{MAX_GJK_ITERS, SWEEP_EPSILON, VERY_SMALL_NUMBER};
use crate::shape::Shape;
use crate::simplex::{ClosestPoint, Simplex, SupportPoint};
use crate::types::{Iso, Quat, Vec3, normalize_safe};

/// Squared-distance tolerance under which the static test declares contact.
const OVERLAP_EPSILON: f32 = SWEEP_EPSILON * SWEEP_EPSILON;

/// Result of a sweep. `time_of_impact == 1` with a zero normal means no hit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConvexCastHit {
    /// Contact point on the second shape at the time of impact.
    pub point: Vec3,
    /// Fraction of the motion, in `[0, 1]`.
    pub time_of_impact: f32,
    /// Unit normal pointing out of the second shape toward the first.
    pub normal: Vec3,
    /// Epsilon-bounded correction, not a true penetration depth.
    pub penetration: f32,
}

impl ConvexCastHit {
    pub fn none() -> Self {
        Self {
            point: Vec3::zeros(),
            time_of_impact: 1.0,
            normal: Vec3::zeros(),
            penetration: 0.0,
        }
    }

    #[inline]
    pub fn is_hit(&self) -> bool {
        self.time_of_impact < 1.0 || self.normal != Vec3::zeros()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SweepOutcome {
    Hit(ConvexCastHit),
    Miss,
    /// Iteration cap reached before convergence.
    Diverged,
}

impl SweepOutcome {
    pub fn hit(self) -> Option<ConvexCastHit> {
        match self {
            SweepOutcome::Hit(h) => Some(h),
            _ => None,
        }
    }

    /// The hit, or the full-motion "no hit" value.
    pub fn hit_or_none(self) -> ConvexCastHit {
        self.hit().unwrap_or_else(ConvexCastHit::none)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverlapOutcome {
    Intersecting,
    Separated,
    /// Iteration cap reached; treated as separated.
    Diverged,
}

/// Reusable GJK working state. One instance per worker; no allocation per query.
#[derive(Clone, Debug, Default)]
pub struct Gjk {
    simplex: Simplex,
    /// Witness point on the first shape from the last closest-point query.
    pub witness_a: Vec3,
    /// Witness point on the second shape from the last closest-point query.
    pub witness_b: Vec3,
}

impl Gjk {
    pub fn new() -> Self {
        Self::default()
    }

    fn closest(&mut self) -> Option<ClosestPoint> {
        let cp = self.simplex.closest_to_origin()?;
        if !cp.valid {
            trace!("gjk: degenerate simplex of {} points", self.simplex.len());
        }
        self.witness_a = cp.witness_a;
        self.witness_b = cp.witness_b;
        Some(cp)
    }

    /// True if the posed shapes intersect. Non-convergence counts as separated.
    pub fn overlap(&mut self, a: &Shape, pose_a: &Iso, b: &Shape, pose_b: &Iso) -> bool {
        self.overlap_test(a, pose_a, b, pose_b) == OverlapOutcome::Intersecting
    }

    pub fn overlap_test(
        &mut self,
        a: &Shape,
        pose_a: &Iso,
        b: &Shape,
        pose_b: &Iso,
    ) -> OverlapOutcome {
        self.simplex.clear();

        let (pa, ra) = split(pose_a);
        let (pb, rb) = split(pose_b);
        let support = |d: Vec3| SupportPoint::new(a.support(pa, &ra, d), b.support(pb, &rb, -d));

        let mut dir = Vec3::x();
        let mut p = support(dir);
        // A first point nearly parallel to the search axis leads to a zero direction later.
        if dir.dot(&p.w).abs() >= p.w.norm() * 0.8 {
            dir = Vec3::y();
            p = support(dir);
        }
        self.simplex.push_unique(p);
        self.witness_a = p.a;
        self.witness_b = p.b;
        let mut v = p.w;

        for _ in 0..MAX_GJK_ITERS {
            if v.norm_squared() <= OVERLAP_EPSILON {
                return OverlapOutcome::Intersecting;
            }
            let d = -v;
            let p = support(d);
            // New support point does not pass the origin: separating axis found.
            if p.w.dot(&d) < 0.0 {
                return OverlapOutcome::Separated;
            }
            if !self.simplex.push_unique(p) {
                // No progress: the origin was not proven outside and `v` is within tolerance.
                return if v.norm_squared() <= SWEEP_EPSILON {
                    OverlapOutcome::Intersecting
                } else {
                    OverlapOutcome::Separated
                };
            }
            let Some(cp) = self.closest() else {
                return OverlapOutcome::Separated;
            };
            if cp.contains_origin {
                return OverlapOutcome::Intersecting;
            }
            v = cp.point;
        }

        warn!("gjk overlap did not converge in {MAX_GJK_ITERS} iterations");
        OverlapOutcome::Diverged
    }

    /// Conservative-advancement sweep of `a` from `a_start` to `a_end` against `b` moving
    /// from `b_start` to `b_end`. Orientation is held at the start pose.
    ///
    /// Shapes already in contact at `t = 0` report a hit at time zero only if the
    /// relative motion closes along the contact normal; otherwise the motion is free.
    pub fn sweep(
        &mut self,
        a: &Shape,
        a_start: &Iso,
        a_end: &Iso,
        b: &Shape,
        b_start: &Iso,
        b_end: &Iso,
    ) -> SweepOutcome {
        self.simplex.clear();

        let (start_a, rot_a) = split(a_start);
        let (start_b, rot_b) = split(b_start);
        let vel_a = a_end.translation.vector - start_a;
        let vel_b = b_end.translation.vector - start_b;
        let rel = vel_a - vel_b;

        let mut pos_a = start_a;
        let mut pos_b = start_b;
        let support = |pa: Vec3, pb: Vec3, c: Vec3| {
            SupportPoint::new(a.support(pa, &rot_a, -c), b.support(pb, &rot_b, c))
        };

        let init_dir = if rel.norm_squared() > VERY_SMALL_NUMBER {
            rel
        } else {
            Vec3::x()
        };
        self.simplex.push_unique(support(pos_a, pos_b, init_dir));
        let Some(cp) = self.closest() else {
            return SweepOutcome::Miss;
        };
        let mut c = cp.point;
        let mut sqrdist = c.norm_squared();

        let mut toi = 0.0f32;
        let mut separation = Vec3::zeros();
        let mut advanced = false;
        let mut iters = 0;

        while sqrdist > SWEEP_EPSILON {
            if iters >= MAX_GJK_ITERS {
                warn!(
                    "gjk sweep diverged after {MAX_GJK_ITERS} iters (t = {toi}, d² = {sqrdist})"
                );
                return SweepOutcome::Diverged;
            }
            iters += 1;

            let mut p = support(pos_a, pos_b, c);
            let cdotw = c.dot(&p.w);

            // Only advance while the nearest feature still lies ahead of the origin.
            if cdotw > 0.0 {
                let cdotr = c.dot(&rel);
                if cdotr >= -SWEEP_EPSILON {
                    return SweepOutcome::Miss;
                }
                let next = toi - cdotw / cdotr;
                if !(0.0..=1.0).contains(&next) {
                    return SweepOutcome::Miss;
                }
                let dt = next - toi;
                toi = next;
                pos_a = start_a + vel_a * toi;
                pos_b = start_b + vel_b * toi;

                let (da, db) = (vel_a * dt, vel_b * dt);
                self.simplex.translate(da, db);
                p.a += da;
                p.b += db;
                p.w = p.a - p.b;

                separation = c;
                advanced = true;
            }

            if !self.simplex.push_unique(p) {
                break;
            }
            let Some(cp) = self.closest() else {
                break;
            };
            c = cp.point;
            sqrdist = c.norm_squared();
        }

        let point = self.witness_b;
        let normal = match b.as_capsule() {
            Some(capsule) => {
                let axis = capsule.axis(&rot_b);
                let rel_hit = point - pos_b;
                let axis_len_sq = axis.norm_squared();
                let along = if axis_len_sq > VERY_SMALL_NUMBER {
                    axis * (axis.dot(&rel_hit) / axis_len_sq).clamp(-1.0, 1.0)
                } else {
                    Vec3::zeros()
                };
                normalize_safe(rel_hit - along)
            }
            None if advanced => normalize_safe(separation),
            None => normalize_safe(self.witness_a - self.witness_b),
        };
        let normal = if normal == Vec3::zeros() {
            normalize_safe(-rel)
        } else {
            normal
        };

        if !advanced && normal.dot(&rel) >= 0.0 {
            return SweepOutcome::Miss;
        }

        SweepOutcome::Hit(ConvexCastHit {
            point,
            time_of_impact: toi,
            normal,
            penetration: (SWEEP_EPSILON - sqrdist).max(0.0).sqrt(),
        })
    }
}

#[inline]
fn split(iso: &Iso) -> (Vec3, Quat) {
    (iso.translation.vector, iso.rotation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::Capsule;
    use approx::assert_relative_eq;

    fn at(x: f32, y: f32, z: f32) -> Iso {
        Iso::translation(x, y, z)
    }

    fn capsule() -> Shape {
        Shape::capsule(0.5, 2.0)
    }

    /// Distance between the medial segments of two upright capsules, brute-forced.
    fn segment_distance(c0: &Capsule, p0: Vec3, c1: &Capsule, p1: Vec3) -> f32 {
        let mut best = f32::MAX;
        for i in 0..=100 {
            let s = -1.0 + 2.0 * i as f32 / 100.0;
            let q = p0 + c0.up * c0.segment_half() * s;
            best = best.min(c1.distance_to_segment(p1, &Quat::identity(), q));
        }
        best
    }

    #[test]
    fn overlap_matches_segment_distance() {
        let shape = capsule();
        let cap = *shape.as_capsule().unwrap();
        let mut gjk = Gjk::new();

        let cases = [
            (Vec3::new(0.95, 0.0, 0.0), true),
            (Vec3::new(1.05, 0.0, 0.0), false),
            (Vec3::new(0.6, 0.5, 0.6), true),
            (Vec3::new(0.0, 2.05, 0.0), false),
            (Vec3::new(0.0, 1.9, 0.3), true),
            (Vec3::new(0.8, 1.5, 0.8), false),
        ];
        for (offset, expected) in cases {
            let dist = segment_distance(&cap, Vec3::zeros(), &cap, offset);
            assert_eq!(dist < 1.0, expected, "bad case {offset:?}");
            let other = Iso::translation(offset.x, offset.y, offset.z);
            assert_eq!(
                gjk.overlap(&shape, &at(0.0, 0.0, 0.0), &shape, &other),
                expected,
                "offset {offset:?}, segment distance {dist}"
            );
        }
    }

    #[test]
    fn overlap_sphere_and_box() {
        let mut gjk = Gjk::new();
        let sphere = Shape::Sphere { radius: 0.5 };
        let cube = Shape::Box {
            half_extents: Vec3::new(0.5, 0.5, 0.5),
        };
        assert!(gjk.overlap(&sphere, &at(0.9, 0.0, 0.0), &cube, &at(0.0, 0.0, 0.0)));
        assert!(!gjk.overlap(&sphere, &at(1.1, 0.0, 0.0), &cube, &at(0.0, 0.0, 0.0)));
    }

    #[test]
    fn head_on_sweep_matches_closed_form() {
        let shape = capsule();
        let mut gjk = Gjk::new();
        // Gap of 2 m closing at 4 m per unit time.
        let hit = gjk
            .sweep(
                &shape,
                &at(0.0, 0.0, 0.0),
                &at(2.0, 0.0, 0.0),
                &shape,
                &at(3.0, 0.0, 0.0),
                &at(1.0, 0.0, 0.0),
            )
            .hit()
            .expect("capsules should collide");
        assert_relative_eq!(hit.time_of_impact, 0.5, epsilon = 1.0e-3);
        assert_relative_eq!(hit.normal, Vec3::new(-1.0, 0.0, 0.0), epsilon = 1.0e-3);
        assert!(hit.penetration >= 0.0);
    }

    #[test]
    fn one_sided_sweep_stops_at_contact() {
        let shape = capsule();
        let mut gjk = Gjk::new();
        // Moving capsule closes a 1 m gap out of a 4 m motion.
        let hit = gjk
            .sweep(
                &shape,
                &at(0.0, 1.0, 0.0),
                &at(0.0, 1.0, 4.0),
                &shape,
                &at(0.0, 1.0, 2.0),
                &at(0.0, 1.0, 2.0),
            )
            .hit()
            .expect("should hit");
        assert_relative_eq!(hit.time_of_impact, 0.25, epsilon = 0.01);
        assert!(hit.normal.z < -0.99);
        assert_relative_eq!(hit.normal.y, 0.0, epsilon = 1.0e-3);
    }

    #[test]
    fn parallel_paths_miss() {
        let shape = capsule();
        let mut gjk = Gjk::new();
        let out = gjk.sweep(
            &shape,
            &at(0.0, 0.0, 0.0),
            &at(5.0, 0.0, 0.0),
            &shape,
            &at(0.0, 0.0, 3.0),
            &at(0.0, 0.0, 3.0),
        );
        assert_eq!(out, SweepOutcome::Miss);
        assert!(!out.hit_or_none().is_hit());
    }

    #[test]
    fn sweep_that_stops_short_misses() {
        let shape = capsule();
        let mut gjk = Gjk::new();
        let out = gjk.sweep(
            &shape,
            &at(0.0, 0.0, 0.0),
            &at(1.0, 0.0, 0.0),
            &shape,
            &at(3.0, 0.0, 0.0),
            &at(3.0, 0.0, 0.0),
        );
        assert_eq!(out, SweepOutcome::Miss);
    }

    #[test]
    fn touching_capsules_report_immediate_impact() {
        let shape = capsule();
        let mut gjk = Gjk::new();
        let hit = gjk
            .sweep(
                &shape,
                &at(0.0, 1.0, 0.0),
                &at(1.0, 1.0, 0.0),
                &shape,
                &at(1.0, 1.0, 0.0),
                &at(1.0, 1.0, 0.0),
            )
            .hit()
            .expect("touching capsules moving together must hit");
        assert!(hit.time_of_impact < 1.0e-3);
        assert!(hit.normal.x < -0.99);
    }

    #[test]
    fn touching_capsules_moving_apart_are_free() {
        let shape = capsule();
        let mut gjk = Gjk::new();
        let out = gjk.sweep(
            &shape,
            &at(0.0, 1.0, 0.0),
            &at(-1.0, 1.0, 0.0),
            &shape,
            &at(1.0, 1.0, 0.0),
            &at(1.0, 1.0, 0.0),
        );
        assert_eq!(out, SweepOutcome::Miss);
    }

    #[test]
    fn sphere_sweep_against_box() {
        let mut gjk = Gjk::new();
        let sphere = Shape::Sphere { radius: 0.5 };
        let cube = Shape::Box {
            half_extents: Vec3::new(0.5, 0.5, 0.5),
        };
        let hit = gjk
            .sweep(
                &sphere,
                &at(0.0, 0.0, 0.0),
                &at(3.0, 0.0, 0.0),
                &cube,
                &at(2.0, 0.0, 0.0),
                &at(2.0, 0.0, 0.0),
            )
            .hit()
            .expect("sphere should reach the box");
        assert_relative_eq!(hit.time_of_impact, 1.0 / 3.0, epsilon = 0.01);
        assert!(hit.normal.x < -0.9);
    }
}
