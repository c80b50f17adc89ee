//! Two-pass tick pipeline.
//!
//! Per pass, every phase is one rayon parallel call over agents; the end of the call is
//! the phase barrier:
//!
//! 1. floor: re-acquire ground against the static world
//! 2. velocity: plan this pass's displacement
//! 3. insert: bucket each agent's swept bounds into the grid
//! 4. pairs: collect directed candidate pairs per agent
//! 5. sweep: nearest hit per agent (statics + candidate agents)
//! 6. move: consume the displacement, slide, step up
//!
//! The second pass spends whatever time the first pass left after a hit, which is what
//! turns a blocked move into a wall slide.

use std::sync::atomic::AtomicU32;

use log::{trace, warn};
use rayon::prelude::*;

use capsweep_collision::broad::{BroadBody, SpatialGrid};
use capsweep_collision::error::ConfigError;
use capsweep_collision::movement::{
    AgentMoveData, MoveEvents, apply_move, compute_velocity, snap_to_floor_or_fall,
    sweep_capsule,
};
use capsweep_collision::query::{ShapeQuery, SweepHit};
use capsweep_collision::Shape;

use crate::agent::{AgentStore, TickInput};
use crate::scene::{AgentPose, AgentScene};
use crate::settings::{MAX_TICK_DT, WorldSettings};

/// Intra-tick passes.
pub const PASSES: usize = 2;

/// What happened during one tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub agents: usize,
    /// Agents whose position changed.
    pub moved: usize,
    /// Grid buckets whose candidate scan was cut short.
    pub truncated_buckets: usize,
    /// GJK queries that hit the iteration cap.
    pub gjk_diverged: u32,
    pub events: MoveEvents,
}

/// Owns every transient buffer of the tick. Buffers are cleared, not freed, between ticks.
pub struct TickPipeline {
    settings: WorldSettings,
    grid: SpatialGrid,
    moves: Vec<AgentMoveData>,
    bodies: Vec<BroadBody>,
    poses: Vec<AgentPose>,
    candidates: Vec<Vec<usize>>,
    hits: Vec<Option<SweepHit>>,
}

impl TickPipeline {
    pub fn new(settings: WorldSettings) -> Result<Self, ConfigError> {
        let grid = settings.build_grid()?;
        Ok(Self {
            settings,
            grid,
            moves: Vec::new(),
            bodies: Vec::new(),
            poses: Vec::new(),
            candidates: Vec::new(),
            hits: Vec::new(),
        })
    }

    pub fn settings(&self) -> &WorldSettings {
        &self.settings
    }

    /// Advance every agent in `store` by `input.dt` seconds.
    pub fn step<P: ShapeQuery + ?Sized>(
        &mut self,
        store: &mut AgentStore,
        world: &P,
        input: &TickInput,
    ) -> TickReport {
        let mut report = TickReport {
            agents: store.len(),
            ..Default::default()
        };
        if !(input.dt.is_finite() && input.dt > 0.0) {
            warn!("skipping tick with invalid dt {}", input.dt);
            return report;
        }
        let dt = input.dt.min(MAX_TICK_DT);

        store
            .records()
            .par_iter()
            .map(|r| r.move_data(&input.input(r.id), dt))
            .collect_into_vec(&mut self.moves);

        let n = self.moves.len();
        self.candidates.resize_with(n, Vec::new);
        let diverged = AtomicU32::new(0);

        for pass in 0..PASSES {
            self.moves
                .par_iter_mut()
                .for_each(|md| snap_to_floor_or_fall(md, world));

            let first_pass = pass == 0;
            self.moves
                .par_iter_mut()
                .for_each(|md| compute_velocity(md, first_pass));

            report.truncated_buckets += self.broad_phase();
            self.sweep_phase(world, &diverged);
            self.move_phase(world, &diverged);

            trace!(
                "pass {pass}: {} agents, {} with hits",
                n,
                self.hits.iter().filter(|h| h.is_some()).count()
            );
        }

        for (record, md) in store.records_mut().iter_mut().zip(self.moves.iter()) {
            if record.absorb(md) {
                report.moved += 1;
            }
            report.events.merge(&md.events);
        }
        report.gjk_diverged = diverged.into_inner();
        if report.gjk_diverged > 0 {
            warn!("{} GJK queries did not converge this tick", report.gjk_diverged);
        }
        report
    }

    /// Rebuild the grid from this pass's swept bounds and collect candidates. Returns the
    /// number of truncated bucket scans.
    fn broad_phase(&mut self) -> usize {
        self.moves
            .par_iter()
            .map(|md| {
                let shape = Shape::Capsule(md.capsule);
                BroadBody::new(&shape, md.center(), md.pending.as_vector())
            })
            .collect_into_vec(&mut self.bodies);
        self.moves
            .par_iter()
            .map(|md| AgentPose {
                shape: Shape::Capsule(md.capsule),
                center: md.center(),
                sweep: md.pending.as_vector(),
            })
            .collect_into_vec(&mut self.poses);

        self.grid.clear();
        let grid = &self.grid;
        self.bodies
            .par_iter()
            .enumerate()
            .for_each(|(i, body)| {
                grid.insert(i, &body.bounds);
            });

        let bodies = &self.bodies;
        self.candidates
            .par_iter_mut()
            .enumerate()
            .map(|(i, out)| grid.candidates(i, bodies, out))
            .sum()
    }

    fn sweep_phase<P: ShapeQuery + ?Sized>(&mut self, world: &P, diverged: &AtomicU32) {
        let poses = &self.poses;
        let candidates = &self.candidates;
        self.moves
            .par_iter()
            .enumerate()
            .map(|(i, md)| {
                let scene = AgentScene::new(world, poses, &candidates[i], diverged);
                sweep_capsule(
                    &scene,
                    &md.capsule,
                    md.position,
                    md.pending,
                    md.config.collision_mask,
                )
            })
            .collect_into_vec(&mut self.hits);
    }

    fn move_phase<P: ShapeQuery + ?Sized>(&mut self, world: &P, diverged: &AtomicU32) {
        let poses = &self.poses;
        let candidates = &self.candidates;
        self.moves
            .par_iter_mut()
            .zip(self.hits.par_iter())
            .enumerate()
            .for_each(|(i, (md, hit))| {
                let scene = AgentScene::new(world, poses, &candidates[i], diverged);
                apply_move(md, *hit, &scene);
            });
    }
}
