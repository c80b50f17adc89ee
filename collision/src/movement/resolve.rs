//! World-facing movement primitives: sweeps, guarded placement, floor probes, corner
//! slides and step-ups.
//!
//! All positions here are capsule bases. Every function is generic over the query
//! provider so the same code runs against static geometry, other agents, or both.

use log::{debug, error, trace};

use crate::constants::{FLOOR_CHECK_DIST, FLOOR_PROBE_SHRINK, KINDA_SMALL_NUMBER, STEP_BACK_DIST};
use crate::layers::CollisionMask;
use crate::movement::ramp::two_surface_slide_vector;
use crate::movement::state::{FloorHit, MoveEvents};
use crate::query::{ShapeQuery, SweepHit};
use crate::shape::Capsule;
use crate::types::{Delta, Vec3, is_non_finite, normalize_safe, up};

/// How a placement ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placement {
    /// The requested position (stepped back from the hit surface) was free.
    Placed,
    /// The requested position overlapped; a shortened move was used instead.
    Shortened,
    /// Nothing nearby was free; the agent stayed at its start position.
    Stuck,
    /// The requested position was not finite; the agent stayed at its start position.
    NanRejected,
}

impl Placement {
    pub fn record(self, events: &mut MoveEvents) {
        match self {
            Placement::Stuck => events.stuck += 1,
            Placement::NanRejected => events.nan_rejected += 1,
            Placement::Placed | Placement::Shortened => {}
        }
    }
}

/// Outcome of `move_capsule`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MoveResult {
    pub position: Vec3,
    pub hit: Option<SweepHit>,
    /// Fraction of the requested move travelled before the hit (1 when unobstructed).
    pub time: f32,
    pub placement: Placement,
}

/// Sweep the capsule standing at `base` along `delta`.
pub fn sweep_capsule<Q: ShapeQuery + ?Sized>(
    query: &Q,
    capsule: &Capsule,
    base: Vec3,
    delta: Delta,
    mask: CollisionMask,
) -> Option<SweepHit> {
    if delta.is_zero() {
        return None;
    }
    query.sweep_capsule(capsule, capsule.center_from_base(base), delta, mask)
}

/// Place the capsule at `desired`, pushed off `normal` by the step-back distance.
///
/// If that spot overlaps something, the move from `start` along `travel` is shortened by
/// the step-back distance and tried once more. Failing that, or if the result is not
/// finite, the capsule stays at `start`.
pub fn set_capsule_pos<Q: ShapeQuery + ?Sized>(
    query: &Q,
    capsule: &Capsule,
    start: Vec3,
    desired: Vec3,
    travel: Delta,
    normal: Vec3,
    mask: CollisionMask,
) -> (Vec3, Placement) {
    let adjusted = desired + normal * STEP_BACK_DIST;
    if is_non_finite(&adjusted) {
        error!("rejected non-finite capsule position {adjusted:?} (start {start:?})");
        return (start, Placement::NanRejected);
    }

    if !query.overlaps_capsule(capsule, capsule.center_from_base(adjusted), mask) {
        return (adjusted, Placement::Placed);
    }

    let len = travel.len - STEP_BACK_DIST;
    if len <= STEP_BACK_DIST {
        debug!("stuck: placement at {adjusted:?} overlaps and the move is too short to shorten");
        return (start, Placement::Stuck);
    }

    let shortened = start + travel.dir * len;
    if query.overlaps_capsule(capsule, capsule.center_from_base(shortened), mask) {
        debug!("stuck: shortened placement at {shortened:?} still overlaps");
        return (start, Placement::Stuck);
    }
    (shortened, Placement::Shortened)
}

/// Sweep along `delta` and advance to the hit (or the full move when nothing is in the way).
pub fn move_capsule<Q: ShapeQuery + ?Sized>(
    query: &Q,
    capsule: &Capsule,
    start: Vec3,
    delta: Delta,
    mask: CollisionMask,
) -> MoveResult {
    let hit = sweep_capsule(query, capsule, start, delta, mask);
    resolve_hit(query, capsule, start, delta, hit, mask)
}

/// Advance along `delta` given an already computed sweep result.
pub fn resolve_hit<Q: ShapeQuery + ?Sized>(
    query: &Q,
    capsule: &Capsule,
    start: Vec3,
    delta: Delta,
    hit: Option<SweepHit>,
    mask: CollisionMask,
) -> MoveResult {
    let Some(hit) = hit else {
        let position = start + delta.as_vector();
        if is_non_finite(&position) {
            error!("rejected non-finite capsule position {position:?} (start {start:?})");
            return MoveResult {
                position: start,
                hit: None,
                time: 1.0,
                placement: Placement::NanRejected,
            };
        }
        return MoveResult {
            position,
            hit: None,
            time: 1.0,
            placement: Placement::Placed,
        };
    };

    let distance = hit.distance.clamp(0.0, delta.len);
    let time = if delta.len > 0.0 { distance / delta.len } else { 0.0 };
    let travel = Delta::new(delta.dir, distance);
    let (position, placement) = set_capsule_pos(
        query,
        capsule,
        start,
        start + travel.as_vector(),
        travel,
        hit.normal,
        mask,
    );
    MoveResult {
        position,
        hit: Some(hit),
        time,
        placement,
    }
}

/// Probe for the floor under the capsule standing at `base`, up to `probe_dist` below it.
///
/// The probe capsule is slightly thinner and shorter than the agent so a base resting on,
/// or barely sunk into, the floor still reports a hit. The sweep normal is refined with a
/// downward ray at the contact point, which gives the true face normal on edges.
pub fn find_floor<Q: ShapeQuery + ?Sized>(
    query: &Q,
    capsule: &Capsule,
    base: Vec3,
    probe_dist: f32,
    mask: CollisionMask,
) -> Option<FloorHit> {
    let shrink = capsule.half_length * FLOOR_PROBE_SHRINK;
    let probe = capsule.shrunk(shrink, STEP_BACK_DIST);
    let query_dist = probe_dist + shrink;
    if query_dist <= 0.0 || !query_dist.is_finite() {
        return None;
    }

    let center = capsule.center_from_base(base);
    let hit = query.sweep_capsule(&probe, center, Delta::new(-up(), query_dist), mask)?;

    let mut normal = hit.normal;
    let ray_origin = hit.point + up() * FLOOR_CHECK_DIST;
    if let Some(ray) = query.raycast(ray_origin, -up(), FLOOR_CHECK_DIST + STEP_BACK_DIST, mask) {
        normal = ray.normal;
    }
    let normal = normalize_safe(normal);
    if normal == Vec3::zeros() {
        return None;
    }

    Some(FloorHit {
        distance: hit.distance - shrink,
        point: hit.point,
        normal,
    })
}

/// The rest of a slide that ran into a second surface.
#[derive(Clone, Copy, Debug)]
pub struct CornerSlide {
    pub remaining: Delta,
    /// Surface just struck.
    pub struck: Vec3,
    /// Surface the move was already sliding along.
    pub sliding: Vec3,
    /// Direction of the original move; the redirected move may not turn back from it.
    pub forward: Vec3,
    pub on_floor: bool,
    pub min_walkable_y: f32,
}

impl CornerSlide {
    /// Redirect the remainder along both surfaces and move once more. `None` when the
    /// redirected move would be empty or point backwards.
    pub fn apply<Q: ShapeQuery + ?Sized>(
        &self,
        query: &Q,
        capsule: &Capsule,
        start: Vec3,
        mask: CollisionMask,
        events: &mut MoveEvents,
    ) -> Option<MoveResult> {
        let corrected = Delta::from_vector(two_surface_slide_vector(
            self.remaining,
            self.struck,
            self.sliding,
            self.on_floor,
            self.min_walkable_y,
        ));
        let forward = corrected.dir.dot(&self.forward);
        if corrected.len <= f32::MIN_POSITIVE || forward <= f32::MIN_POSITIVE {
            return None;
        }
        let result = move_capsule(query, capsule, start, corrected, mask);
        result.placement.record(events);
        events.corner_slides += 1;
        debug!(
            "corner slide between {:?} and {:?} to {:?}",
            self.struck, self.sliding, result.position
        );
        Some(result)
    }
}

/// Try to climb a ledge in front of a blocked, grounded agent.
///
/// A sphere probe drops onto the area just past the obstacle. If it lands on a walkable
/// surface no higher than `step_height` above the base, and the capsule fits there, the
/// new base position is returned.
pub fn step_up<Q: ShapeQuery + ?Sized>(
    query: &Q,
    capsule: &Capsule,
    base: Vec3,
    move_dir: Vec3,
    step_height: f32,
    min_walkable_y: f32,
    mask: CollisionMask,
) -> Option<Vec3> {
    let forward = normalize_safe(Vec3::new(move_dir.x, 0.0, move_dir.z));
    if forward == Vec3::zeros() || step_height <= 0.0 {
        return None;
    }

    let scan = 2.0 * STEP_BACK_DIST;
    let probe = Capsule {
        radius: capsule.radius,
        half_length: capsule.radius,
        up: capsule.up,
    };
    let lift = step_height + capsule.radius + STEP_BACK_DIST;
    let probe_center = base + forward * (capsule.radius + scan) + up() * lift;
    let drop = Delta::new(-up(), step_height + STEP_BACK_DIST);
    let hit = query.sweep_capsule(&probe, probe_center, drop, mask)?;

    let mut normal = hit.normal;
    if let Some(ray) = query.raycast(
        hit.point + up() * STEP_BACK_DIST,
        -up(),
        2.0 * STEP_BACK_DIST,
        mask,
    ) {
        normal = ray.normal;
    }
    if normal.y < min_walkable_y {
        trace!("step-up rejected: ledge normal {normal:?} is not walkable");
        return None;
    }

    let rise = hit.point.y - base.y;
    if rise > step_height || rise <= KINDA_SMALL_NUMBER {
        return None;
    }

    let target = base + forward * (4.0 * scan) + up() * (rise + STEP_BACK_DIST);
    if is_non_finite(&target)
        || query.overlaps_capsule(capsule, capsule.center_from_base(target), mask)
    {
        trace!("step-up rejected: no room at {target:?}");
        return None;
    }
    Some(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{EmptyWorld, RayHit};
    use approx::assert_abs_diff_eq;

    /// Infinite floor at `y = height` plus an optional wall plane `z = wall_z` facing -Z.
    struct Planes {
        floor: f32,
        wall_z: Option<f32>,
    }

    impl Planes {
        fn bottom(capsule: &Capsule, center: Vec3) -> f32 {
            center.y - capsule.half_length
        }
    }

    impl ShapeQuery for Planes {
        fn sweep_capsule(
            &self,
            capsule: &Capsule,
            center: Vec3,
            delta: Delta,
            _: CollisionMask,
        ) -> Option<SweepHit> {
            let mut best: Option<SweepHit> = None;
            let v = delta.as_vector();
            let gap = Self::bottom(capsule, center) - self.floor;
            if v.y < 0.0 && gap >= -KINDA_SMALL_NUMBER {
                let t = (gap.max(0.0) / -v.y).min(f32::INFINITY);
                if t <= 1.0 {
                    best = Some(SweepHit {
                        distance: t * delta.len,
                        point: Vec3::new(center.x + v.x * t, self.floor, center.z + v.z * t),
                        normal: up(),
                    });
                }
            }
            if let Some(wz) = self.wall_z {
                let gap = wz - (center.z + capsule.radius);
                if v.z > 0.0 && gap >= -KINDA_SMALL_NUMBER {
                    let t = gap.max(0.0) / v.z;
                    if t <= 1.0 && best.is_none_or(|b| t * delta.len < b.distance) {
                        best = Some(SweepHit {
                            distance: t * delta.len,
                            point: Vec3::new(center.x + v.x * t, center.y + v.y * t, wz),
                            normal: -Vec3::z(),
                        });
                    }
                }
            }
            best
        }

        fn raycast(&self, origin: Vec3, dir: Vec3, max: f32, _: CollisionMask) -> Option<RayHit> {
            if dir.y >= 0.0 {
                return None;
            }
            let t = (origin.y - self.floor) / -dir.y;
            (t >= 0.0 && t <= max).then(|| RayHit {
                distance: t,
                point: origin + dir * t,
                normal: up(),
            })
        }

        fn overlaps_capsule(&self, capsule: &Capsule, center: Vec3, _: CollisionMask) -> bool {
            Self::bottom(capsule, center) < self.floor - KINDA_SMALL_NUMBER
                || self
                    .wall_z
                    .is_some_and(|wz| center.z + capsule.radius > wz + KINDA_SMALL_NUMBER)
        }
    }

    fn capsule() -> Capsule {
        Capsule::upright(0.5, 2.0)
    }

    #[test]
    fn free_move_travels_full_delta() {
        let r = move_capsule(
            &EmptyWorld,
            &capsule(),
            Vec3::zeros(),
            Delta::new(Vec3::x(), 2.0),
            CollisionMask::all(),
        );
        assert_eq!(r.position, Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(r.time, 1.0);
        assert!(r.hit.is_none());
    }

    #[test]
    fn blocked_move_stops_short_of_wall() {
        let world = Planes {
            floor: -10.0,
            wall_z: Some(3.0),
        };
        let r = move_capsule(
            &world,
            &capsule(),
            Vec3::zeros(),
            Delta::new(Vec3::z(), 5.0),
            CollisionMask::all(),
        );
        assert_eq!(r.placement, Placement::Placed);
        assert_abs_diff_eq!(r.position.z, 2.5 - STEP_BACK_DIST, epsilon = 1e-4);
        assert_abs_diff_eq!(r.time, 0.5, epsilon = 1e-4);
    }

    #[test]
    fn nan_placement_is_rejected() {
        let (pos, placement) = set_capsule_pos(
            &EmptyWorld,
            &capsule(),
            Vec3::zeros(),
            Vec3::new(f32::NAN, 0.0, 0.0),
            Delta::new(Vec3::x(), 1.0),
            Vec3::zeros(),
            CollisionMask::all(),
        );
        assert_eq!(pos, Vec3::zeros());
        assert_eq!(placement, Placement::NanRejected);
    }

    #[test]
    fn overlapping_placement_falls_back_to_start() {
        let world = Planes {
            floor: -10.0,
            wall_z: Some(1.0),
        };
        let start = Vec3::new(0.0, 0.0, 0.4);
        let (pos, placement) = set_capsule_pos(
            &world,
            &capsule(),
            start,
            Vec3::new(0.0, 0.0, 2.0),
            Delta::new(Vec3::z(), 0.015),
            Vec3::zeros(),
            CollisionMask::all(),
        );
        assert_eq!(pos, start);
        assert_eq!(placement, Placement::Stuck);
    }

    #[test]
    fn floor_probe_reports_gap() {
        let world = Planes {
            floor: 0.0,
            wall_z: None,
        };
        let hit = find_floor(
            &world,
            &capsule(),
            Vec3::new(0.0, 0.05, 0.0),
            FLOOR_CHECK_DIST,
            CollisionMask::all(),
        )
        .expect("floor within range");
        assert_abs_diff_eq!(hit.distance, 0.05, epsilon = 1e-4);
        assert_abs_diff_eq!(hit.normal, up());

        let miss = find_floor(
            &world,
            &capsule(),
            Vec3::new(0.0, 1.0, 0.0),
            FLOOR_CHECK_DIST,
            CollisionMask::all(),
        );
        assert!(miss.is_none());
    }
}
