/*!
Shape-query provider interface.

Movement resolution never talks to a concrete scene. It asks a `ShapeQuery` for capsule
sweeps, downward raycasts and overlap tests against whatever geometry the caller exposes:
static colliders (`RapierQueryWorld`), other agents, or both.
*/

use crate::layers::CollisionMask;
use crate::shape::Capsule;
use crate::types::{Delta, Vec3};

/// Nearest hit of a capsule sweep.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SweepHit {
    /// Distance travelled along the sweep direction before contact, in `[0, delta.len]`.
    pub distance: f32,
    /// Contact point on the obstacle.
    pub point: Vec3,
    /// Unit obstacle normal at the contact, facing the swept capsule.
    pub normal: Vec3,
}

/// Nearest hit of a raycast.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayHit {
    pub distance: f32,
    pub point: Vec3,
    pub normal: Vec3,
}

pub trait ShapeQuery: Sync {
    /// Sweep `capsule` (centered at `center`) along `delta`. Returns the nearest hit.
    fn sweep_capsule(
        &self,
        capsule: &Capsule,
        center: Vec3,
        delta: Delta,
        mask: CollisionMask,
    ) -> Option<SweepHit>;

    /// Cast a ray from `origin` along the unit vector `dir`, up to `max_dist`.
    fn raycast(&self, origin: Vec3, dir: Vec3, max_dist: f32, mask: CollisionMask)
    -> Option<RayHit>;

    /// True if `capsule` centered at `center` intersects anything.
    fn overlaps_capsule(&self, capsule: &Capsule, center: Vec3, mask: CollisionMask) -> bool;
}

/// A world with nothing in it.
#[derive(Clone, Copy, Debug, Default)]
pub struct EmptyWorld;

impl ShapeQuery for EmptyWorld {
    fn sweep_capsule(&self, _: &Capsule, _: Vec3, _: Delta, _: CollisionMask) -> Option<SweepHit> {
        None
    }

    fn raycast(&self, _: Vec3, _: Vec3, _: f32, _: CollisionMask) -> Option<RayHit> {
        None
    }

    fn overlaps_capsule(&self, _: &Capsule, _: Vec3, _: CollisionMask) -> bool {
        false
    }
}

impl<T: ShapeQuery + ?Sized> ShapeQuery for &T {
    fn sweep_capsule(
        &self,
        capsule: &Capsule,
        center: Vec3,
        delta: Delta,
        mask: CollisionMask,
    ) -> Option<SweepHit> {
        (**self).sweep_capsule(capsule, center, delta, mask)
    }

    fn raycast(
        &self,
        origin: Vec3,
        dir: Vec3,
        max_dist: f32,
        mask: CollisionMask,
    ) -> Option<RayHit> {
        (**self).raycast(origin, dir, max_dist, mask)
    }

    fn overlaps_capsule(&self, capsule: &Capsule, center: Vec3, mask: CollisionMask) -> bool {
        (**self).overlaps_capsule(capsule, center, mask)
    }
}

/// The closer of two optional hits.
pub fn nearest(a: Option<SweepHit>, b: Option<SweepHit>) -> Option<SweepHit> {
    match (a, b) {
        (Some(x), Some(y)) => Some(if y.distance < x.distance { y } else { x }),
        (x, None) => x,
        (None, y) => y,
    }
}
