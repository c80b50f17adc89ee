/*!
Uniform spatial hash ("bucket grid") used as the broad-phase between agents.

The grid covers a fixed world box split into cubic cells. Every tick each agent is
inserted into every cell overlapped by the AABB spanning its current pose and its swept
end pose. Cells outside the grid are skipped rather than clamped, so an agent that
leaves the world simply gets no candidates.

Insertion takes `&self`: buckets sit behind their own mutex so agents can be inserted
from parallel tasks. Locks are held only for a single `Vec::push`.

Candidate generation is a read-only pass over the filled buckets and may also run in
parallel. Each bucket contributes at most `MAX_PAIR_TESTS_PER_BUCKET` entries; anything
beyond that is silently truncated and counted.
*/

use std::sync::{Mutex, PoisonError};

use nalgebra as na;
use rapier3d::parry::bounding_volume::Aabb;

use crate::constants::MAX_PAIR_TESTS_PER_BUCKET;
use crate::error::ConfigError;
use crate::shape::Shape;
use crate::types::{Quat, Vec3};

/// Broad-phase view of one agent for a single pass.
#[derive(Clone, Copy, Debug)]
pub struct BroadBody {
    /// Shape center at the start of the pass.
    pub center: Vec3,
    /// Intended translation for the pass.
    pub sweep: Vec3,
    /// Radius of a sphere around `center` enclosing the shape.
    pub bounding_radius: f32,
    /// Horizontal radius of the shape.
    pub radius: f32,
    /// Swept bounds (start and end poses).
    pub bounds: Aabb,
}

impl BroadBody {
    pub fn new(shape: &Shape, center: Vec3, sweep: Vec3) -> Self {
        Self {
            center,
            sweep,
            bounding_radius: shape.bounding_radius(),
            radius: shape.radius(),
            bounds: swept_aabb(shape, center, sweep),
        }
    }

    /// Already interpenetrating: the sweep is undefined, leave it to depenetration.
    #[inline]
    pub fn is_inside(&self, other: &BroadBody) -> bool {
        (other.center - self.center).norm_squared() < self.radius * self.radius
    }

    /// Cheap reachability test: bounding spheres expanded by both sweep lengths.
    #[inline]
    pub fn may_touch(&self, other: &BroadBody) -> bool {
        let reach =
            self.bounding_radius + other.bounding_radius + self.sweep.norm() + other.sweep.norm();
        (other.center - self.center).norm_squared() <= reach * reach
    }
}

/// AABB covering `shape` at `center` and at `center + sweep`.
pub fn swept_aabb(shape: &Shape, center: Vec3, sweep: Vec3) -> Aabb {
    let rot = Quat::identity();
    let start = shape.aabb(center, &rot);
    let end = shape.aabb(center + sweep, &rot);
    aabb_union(&start, &end)
}

/// Compute the union of two AABBs.
pub fn aabb_union(a: &Aabb, b: &Aabb) -> Aabb {
    let min = na::Point3::new(
        a.mins.x.min(b.mins.x),
        a.mins.y.min(b.mins.y),
        a.mins.z.min(b.mins.z),
    );
    let max = na::Point3::new(
        a.maxs.x.max(b.maxs.x),
        a.maxs.y.max(b.maxs.y),
        a.maxs.z.max(b.maxs.z),
    );
    Aabb {
        mins: min,
        maxs: max,
    }
}

/// Inclusive cell range, already clipped to the grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellRange {
    pub min: [usize; 3],
    pub max: [usize; 3],
}

impl CellRange {
    /// Visit cells in bucket order (x fastest, then z, then y).
    pub fn for_each(&self, mut f: impl FnMut([usize; 3])) {
        for y in self.min[1]..=self.max[1] {
            for z in self.min[2]..=self.max[2] {
                for x in self.min[0]..=self.max[0] {
                    f([x, y, z]);
                }
            }
        }
    }
}

pub struct SpatialGrid {
    min: Vec3,
    max: Vec3,
    cell_size: f32,
    dims: [usize; 3],
    buckets: Vec<Mutex<Vec<usize>>>,
}

impl SpatialGrid {
    pub fn new(min: Vec3, max: Vec3, cell_size: f32) -> Result<Self, ConfigError> {
        if !cell_size.is_finite() || cell_size <= 0.0 {
            return Err(ConfigError::CellSize(cell_size));
        }
        for (axis, lo, hi) in [('x', min.x, max.x), ('y', min.y, max.y), ('z', min.z, max.z)] {
            if !lo.is_finite() {
                return Err(ConfigError::NonFinite {
                    field: "world min",
                    value: lo,
                });
            }
            if !hi.is_finite() {
                return Err(ConfigError::NonFinite {
                    field: "world max",
                    value: hi,
                });
            }
            if lo > hi {
                return Err(ConfigError::InvertedBounds {
                    axis,
                    min: lo,
                    max: hi,
                });
            }
        }

        let extent = (max - min) / cell_size;
        let dims = [
            (extent.x.ceil() as usize).max(1),
            (extent.y.ceil() as usize).max(1),
            (extent.z.ceil() as usize).max(1),
        ];
        let count = dims[0] * dims[1] * dims[2];
        let buckets = (0..count).map(|_| Mutex::new(Vec::new())).collect();

        Ok(Self {
            min,
            max,
            cell_size,
            dims,
            buckets,
        })
    }

    #[inline]
    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    #[inline]
    pub fn bounds(&self) -> (Vec3, Vec3) {
        (self.min, self.max)
    }

    #[inline]
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    #[inline]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Unclamped integer cell coordinate of `p`.
    #[inline]
    pub fn cell_coord(&self, p: Vec3) -> [i64; 3] {
        let rel = (p - self.min) / self.cell_size;
        [
            rel.x.floor() as i64,
            rel.y.floor() as i64,
            rel.z.floor() as i64,
        ]
    }

    /// Flat bucket index, or `None` when the cell lies outside the grid.
    #[inline]
    pub fn bucket_index(&self, cell: [i64; 3]) -> Option<usize> {
        let [dx, dy, dz] = self.dims;
        let in_range = |c: i64, d: usize| c >= 0 && (c as usize) < d;
        if !(in_range(cell[0], dx) && in_range(cell[1], dy) && in_range(cell[2], dz)) {
            return None;
        }
        let (x, y, z) = (cell[0] as usize, cell[1] as usize, cell[2] as usize);
        Some(x + dx * z + y * dx * dz)
    }

    /// Cells overlapped by `aabb`, clipped to the grid. `None` if it misses the grid.
    pub fn cell_range(&self, aabb: &Aabb) -> Option<CellRange> {
        let lo = self.cell_coord(aabb.mins.coords);
        let hi = self.cell_coord(aabb.maxs.coords);
        let mut min = [0usize; 3];
        let mut max = [0usize; 3];
        for axis in 0..3 {
            let (a, b) = (lo[axis].min(hi[axis]), lo[axis].max(hi[axis]));
            let top = self.dims[axis] as i64 - 1;
            if b < 0 || a > top {
                return None;
            }
            min[axis] = a.max(0) as usize;
            max[axis] = b.min(top) as usize;
        }
        Some(CellRange { min, max })
    }

    #[inline]
    fn flat(&self, cell: [usize; 3]) -> usize {
        cell[0] + self.dims[0] * cell[2] + cell[1] * self.dims[0] * self.dims[2]
    }

    /// Insert `id` into every bucket overlapped by `aabb`. Returns the number of cells.
    pub fn insert(&self, id: usize, aabb: &Aabb) -> usize {
        let Some(range) = self.cell_range(aabb) else {
            return 0;
        };
        let mut cells = 0;
        range.for_each(|cell| {
            let bucket = &self.buckets[self.flat(cell)];
            bucket
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(id);
            cells += 1;
        });
        cells
    }

    /// Empty every bucket, keeping allocations for the next tick.
    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            bucket
                .get_mut()
                .unwrap_or_else(PoisonError::into_inner)
                .clear();
        }
    }

    /// Number of ids currently stored in the bucket containing `cell`.
    pub fn bucket_len(&self, cell: [i64; 3]) -> usize {
        self.bucket_index(cell)
            .map(|i| {
                self.buckets[i]
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .len()
            })
            .unwrap_or(0)
    }

    /// Directed candidates (`id` → other) for body `id`. `out` is cleared first, then
    /// filled sorted and deduplicated. Returns how many buckets were truncated.
    pub fn candidates(&self, id: usize, bodies: &[BroadBody], out: &mut Vec<usize>) -> usize {
        out.clear();
        let Some(me) = bodies.get(id) else {
            return 0;
        };
        let Some(range) = self.cell_range(&me.bounds) else {
            return 0;
        };

        let mut truncated = 0;
        range.for_each(|cell| {
            let bucket = self.buckets[self.flat(cell)]
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if bucket.len() > MAX_PAIR_TESTS_PER_BUCKET {
                truncated += 1;
            }
            for &other in bucket.iter().take(MAX_PAIR_TESTS_PER_BUCKET) {
                if other == id {
                    continue;
                }
                let Some(body) = bodies.get(other) else {
                    continue;
                };
                if me.is_inside(body) || !me.may_touch(body) {
                    continue;
                }
                out.push(other);
            }
        });

        out.sort_unstable();
        out.dedup();
        truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> SpatialGrid {
        SpatialGrid::new(Vec3::new(-80.0, 0.0, -80.0), Vec3::new(80.0, 10.0, 80.0), 4.0).unwrap()
    }

    fn body(x: f32, z: f32, sweep: Vec3) -> BroadBody {
        let shape = Shape::capsule(0.5, 2.0);
        BroadBody::new(&shape, Vec3::new(x, 1.0, z), sweep)
    }

    #[test]
    fn default_world_dimensions() {
        let g = grid();
        assert_eq!(g.dims(), [40, 3, 40]);
        assert_eq!(g.bucket_count(), 40 * 3 * 40);
    }

    #[test]
    fn invalid_settings_are_rejected() {
        assert!(matches!(
            SpatialGrid::new(Vec3::zeros(), Vec3::repeat(1.0), 0.0),
            Err(ConfigError::CellSize(_))
        ));
        assert!(matches!(
            SpatialGrid::new(Vec3::repeat(1.0), Vec3::zeros(), 1.0),
            Err(ConfigError::InvertedBounds { axis: 'x', .. })
        ));
    }

    #[test]
    fn bucket_index_layout_and_bounds() {
        let g = grid();
        assert_eq!(g.bucket_index([0, 0, 0]), Some(0));
        assert_eq!(g.bucket_index([1, 0, 0]), Some(1));
        assert_eq!(g.bucket_index([0, 0, 1]), Some(40));
        assert_eq!(g.bucket_index([0, 1, 0]), Some(40 * 40));
        assert_eq!(g.bucket_index([40, 0, 0]), None);
        assert_eq!(g.bucket_index([-1, 0, 0]), None);
    }

    #[test]
    fn insert_covers_swept_bounds() {
        let g = grid();
        // Crosses the x = 0 boundary between cells 19 and 20.
        let b = body(-0.2, 1.0, Vec3::new(0.5, 0.0, 0.0));
        let cells = g.insert(0, &b.bounds);
        assert_eq!(cells, 2);
        assert_eq!(g.bucket_len(g.cell_coord(Vec3::new(-1.0, 1.0, 1.0))), 1);
        assert_eq!(g.bucket_len(g.cell_coord(Vec3::new(1.0, 1.0, 1.0))), 1);
    }

    #[test]
    fn out_of_world_bodies_are_skipped() {
        let g = grid();
        let b = body(500.0, 0.0, Vec3::zeros());
        assert_eq!(g.insert(0, &b.bounds), 0);
        let mut out = Vec::new();
        assert_eq!(g.candidates(0, &[b], &mut out), 0);
        assert!(out.is_empty());
    }

    #[test]
    fn nearby_bodies_become_candidates() {
        let g = grid();
        let bodies = vec![
            body(0.0, 0.0, Vec3::new(0.1, 0.0, 0.0)),
            body(1.5, 0.0, Vec3::zeros()),
            body(3.5, 3.5, Vec3::zeros()),
            body(0.2, 0.0, Vec3::zeros()),
        ];
        for (i, b) in bodies.iter().enumerate() {
            g.insert(i, &b.bounds);
        }
        let mut out = Vec::new();
        g.candidates(0, &bodies, &mut out);
        // 1 is close, 2 is too far for the expanded radius, 3 is already inside body 0.
        assert_eq!(out, vec![1]);
    }

    #[test]
    fn clear_empties_buckets() {
        let mut g = grid();
        let b = body(0.0, 0.0, Vec3::zeros());
        g.insert(0, &b.bounds);
        g.clear();
        assert_eq!(g.bucket_len(g.cell_coord(b.center)), 0);
    }

    #[test]
    fn crowded_bucket_truncates() {
        let g = grid();
        let bodies: Vec<BroadBody> = (0..MAX_PAIR_TESTS_PER_BUCKET + 10)
            .map(|i| body(0.5 + (i % 3) as f32, 0.5 + (i / 3 % 3) as f32, Vec3::zeros()))
            .collect();
        for (i, b) in bodies.iter().enumerate() {
            g.insert(i, &b.bounds);
        }
        let mut out = Vec::new();
        assert!(g.candidates(0, &bodies, &mut out) > 0);
    }
}
