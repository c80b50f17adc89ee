//! The world as seen by one agent during a pass: static geometry plus the agents the
//! broad phase paired it with.

use std::sync::atomic::{AtomicU32, Ordering};

use capsweep_collision::gjk::{Gjk, OverlapOutcome, SweepOutcome};
use capsweep_collision::layers::{CollisionMask, Layer};
use capsweep_collision::query::{RayHit, ShapeQuery, SweepHit, nearest};
use capsweep_collision::types::{Delta, Iso, Vec3};
use capsweep_collision::{Capsule, Shape};

/// Another agent's shape and planned motion for the current pass.
#[derive(Clone, Copy, Debug)]
pub struct AgentPose {
    pub shape: Shape,
    /// Shape center at the start of the pass.
    pub center: Vec3,
    /// Planned translation for the pass.
    pub sweep: Vec3,
}

/// `ShapeQuery` over the static world and a candidate set of agents.
///
/// Sweeps see candidates moving along their own planned motion. Overlap tests see them
/// where they started the pass. Rays only see static geometry.
pub struct AgentScene<'a, P: ?Sized> {
    world: &'a P,
    poses: &'a [AgentPose],
    candidates: &'a [usize],
    diverged: &'a AtomicU32,
}

impl<'a, P: ShapeQuery + ?Sized> AgentScene<'a, P> {
    pub fn new(
        world: &'a P,
        poses: &'a [AgentPose],
        candidates: &'a [usize],
        diverged: &'a AtomicU32,
    ) -> Self {
        Self {
            world,
            poses,
            candidates,
            diverged,
        }
    }

    fn sees_agents(mask: CollisionMask) -> bool {
        mask.has(Layer::Agents)
    }

    fn others(&self) -> impl Iterator<Item = &AgentPose> {
        self.candidates.iter().filter_map(|&i| self.poses.get(i))
    }

    fn sweep_agents(&self, capsule: &Capsule, center: Vec3, delta: Delta) -> Option<SweepHit> {
        let shape = Shape::Capsule(*capsule);
        let start = Iso::translation(center.x, center.y, center.z);
        let end_c = center + delta.as_vector();
        let end = Iso::translation(end_c.x, end_c.y, end_c.z);
        let mut gjk = Gjk::new();

        let mut best: Option<SweepHit> = None;
        for other in self.others() {
            let b_end_c = other.center + other.sweep;
            let outcome = gjk.sweep(
                &shape,
                &start,
                &end,
                &other.shape,
                &Iso::translation(other.center.x, other.center.y, other.center.z),
                &Iso::translation(b_end_c.x, b_end_c.y, b_end_c.z),
            );
            match outcome {
                SweepOutcome::Hit(h) => {
                    let hit = SweepHit {
                        distance: h.time_of_impact * delta.len,
                        point: h.point,
                        normal: h.normal,
                    };
                    best = nearest(best, Some(hit));
                }
                SweepOutcome::Miss => {}
                SweepOutcome::Diverged => {
                    self.diverged.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
        best
    }
}

impl<P: ShapeQuery + ?Sized> ShapeQuery for AgentScene<'_, P> {
    fn sweep_capsule(
        &self,
        capsule: &Capsule,
        center: Vec3,
        delta: Delta,
        mask: CollisionMask,
    ) -> Option<SweepHit> {
        let statics = self.world.sweep_capsule(capsule, center, delta, mask);
        if !Self::sees_agents(mask) || delta.is_zero() {
            return statics;
        }
        nearest(statics, self.sweep_agents(capsule, center, delta))
    }

    fn raycast(
        &self,
        origin: Vec3,
        dir: Vec3,
        max_dist: f32,
        mask: CollisionMask,
    ) -> Option<RayHit> {
        self.world.raycast(origin, dir, max_dist, mask)
    }

    fn overlaps_capsule(&self, capsule: &Capsule, center: Vec3, mask: CollisionMask) -> bool {
        if self.world.overlaps_capsule(capsule, center, mask) {
            return true;
        }
        if !Self::sees_agents(mask) {
            return false;
        }
        let shape = Shape::Capsule(*capsule);
        let pose = Iso::translation(center.x, center.y, center.z);
        let mut gjk = Gjk::new();
        self.others().any(|other| {
            let other_pose = Iso::translation(other.center.x, other.center.y, other.center.z);
            match gjk.overlap_test(&shape, &pose, &other.shape, &other_pose) {
                OverlapOutcome::Intersecting => true,
                OverlapOutcome::Separated => false,
                OverlapOutcome::Diverged => {
                    self.diverged.fetch_add(1, Ordering::Relaxed);
                    false
                }
            }
        })
    }
}
