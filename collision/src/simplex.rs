/*!
Minkowski-difference simplex and closest-point-to-origin routines.

The simplex holds up to four support points. Each point remembers the two world points
(one per shape) that generated it, so a closest point on the simplex can be mapped back
to witness points on both shapes with the same barycentric weights.

`Simplex::closest_to_origin` resolves the point, segment, triangle and tetrahedron cases.
Every case computes the closest point, prunes the simplex down to the vertices spanning
the resolved feature, and reports whether the computation was numerically sound.
Re-running it on an already reduced simplex returns the same point and keeps the size.
*/

use crate::constants::{SWEEP_EPSILON, VERY_SMALL_NUMBER};
use crate::types::Vec3;

/// One vertex of the Minkowski-difference simplex.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SupportPoint {
    /// `a - b`, the point in Minkowski-difference space.
    pub w: Vec3,
    /// Generating point on the first shape.
    pub a: Vec3,
    /// Generating point on the second shape.
    pub b: Vec3,
}

impl SupportPoint {
    #[inline]
    pub fn new(a: Vec3, b: Vec3) -> Self {
        Self { w: a - b, a, b }
    }
}

/// Result of a closest-point query against the current simplex.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClosestPoint {
    /// Closest point of the simplex to the origin.
    pub point: Vec3,
    /// Interpolated point on the first shape.
    pub witness_a: Vec3,
    /// Interpolated point on the second shape.
    pub witness_b: Vec3,
    /// False when a divide-by-near-zero fallback was taken.
    pub valid: bool,
    /// True when the simplex is a tetrahedron enclosing the origin.
    pub contains_origin: bool,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Simplex {
    pts: [SupportPoint; 4],
    len: usize,
}

impl Simplex {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn clear(&mut self) {
        self.len = 0;
    }

    #[inline]
    pub fn points(&self) -> &[SupportPoint] {
        &self.pts[..self.len]
    }

    /// True if a vertex lies within `SWEEP_EPSILON` (squared) of `w`.
    pub fn contains(&self, w: &Vec3) -> bool {
        self.points()
            .iter()
            .any(|p| (p.w - w).norm_squared() <= SWEEP_EPSILON)
    }

    /// Insert at the front. With four points already present the oldest one is evicted.
    /// No duplicate check; outside callers go through `push_unique`.
    fn push(&mut self, p: SupportPoint) {
        self.len = (self.len + 1).min(4);
        for i in (1..self.len).rev() {
            self.pts[i] = self.pts[i - 1];
        }
        self.pts[0] = p;
    }

    /// Push `p` unless an equivalent vertex is already present. Returns whether it was added.
    pub fn push_unique(&mut self, p: SupportPoint) -> bool {
        if self.contains(&p.w) {
            return false;
        }
        self.push(p);
        true
    }

    /// Shift every vertex after the shapes advanced by `da` and `db`.
    pub fn translate(&mut self, da: Vec3, db: Vec3) {
        for p in &mut self.pts[..self.len] {
            p.a += da;
            p.b += db;
            p.w = p.a - p.b;
        }
    }

    /// Keep only the listed vertices, in the given order.
    fn retain(&mut self, idx: &[usize]) {
        let mut kept = [SupportPoint::default(); 4];
        for (slot, &i) in idx.iter().enumerate() {
            kept[slot] = self.pts[i];
        }
        self.pts = kept;
        self.len = idx.len();
    }

    fn interpolate(&self, idx: &[usize], weights: &[f32]) -> (Vec3, Vec3, Vec3) {
        let mut w = Vec3::zeros();
        let mut a = Vec3::zeros();
        let mut b = Vec3::zeros();
        for (&i, &t) in idx.iter().zip(weights) {
            w += self.pts[i].w * t;
            a += self.pts[i].a * t;
            b += self.pts[i].b * t;
        }
        (w, a, b)
    }

    /// Closest point of the simplex to the origin. Prunes the simplex to the active
    /// vertices. Returns `None` for an empty simplex.
    pub fn closest_to_origin(&mut self) -> Option<ClosestPoint> {
        let feature = match self.len {
            0 => return None,
            1 => Feature {
                idx: [0, 0, 0, 0],
                weights: [1.0, 0.0, 0.0, 0.0],
                len: 1,
                valid: true,
                contains_origin: false,
            },
            2 => closest_on_segment(self.pts[0].w, self.pts[1].w, [0, 1]),
            3 => closest_on_triangle(self.pts[0].w, self.pts[1].w, self.pts[2].w, [0, 1, 2]),
            _ => self.closest_on_tetrahedron(),
        };

        let idx = &feature.idx[..feature.len];
        let weights = &feature.weights[..feature.len];
        let (point, witness_a, witness_b) = self.interpolate(idx, weights);
        self.retain(idx);

        Some(ClosestPoint {
            point: if feature.contains_origin { Vec3::zeros() } else { point },
            witness_a,
            witness_b,
            valid: feature.valid,
            contains_origin: feature.contains_origin,
        })
    }

    fn closest_on_tetrahedron(&self) -> Feature {
        let [p0, p1, p2, p3] = self.pts.map(|p| p.w);
        // Each face paired with the vertex opposite to it.
        let faces: [([usize; 3], usize); 4] = [
            ([0, 1, 2], 3),
            ([0, 2, 3], 1),
            ([0, 3, 1], 2),
            ([1, 3, 2], 0),
        ];
        let ws = [p0, p1, p2, p3];

        let mut best: Option<(f32, Feature)> = None;
        for (face, opposite) in faces {
            let [i, j, k] = face;
            if !origin_outside_face(ws[i], ws[j], ws[k], ws[opposite]) {
                continue;
            }
            let f = closest_on_triangle(ws[i], ws[j], ws[k], face);
            let (pt, _, _) = self.interpolate(&f.idx[..f.len], &f.weights[..f.len]);
            let d = pt.norm_squared();
            if best.as_ref().is_none_or(|(bd, _)| d < *bd) {
                best = Some((d, f));
            }
        }
        if let Some((_, f)) = best {
            return f;
        }

        // Origin is inside: barycentric weights from signed sub-volumes.
        let vol = signed_volume(p0, p1, p2, p3);
        if vol.abs() <= VERY_SMALL_NUMBER {
            return Feature {
                idx: [0, 1, 2, 3],
                weights: [0.25; 4],
                len: 4,
                valid: false,
                contains_origin: true,
            };
        }
        let o = Vec3::zeros();
        let w0 = signed_volume(o, p1, p2, p3) / vol;
        let w1 = signed_volume(p0, o, p2, p3) / vol;
        let w2 = signed_volume(p0, p1, o, p3) / vol;
        let w3 = 1.0 - w0 - w1 - w2;
        Feature {
            idx: [0, 1, 2, 3],
            weights: [w0, w1, w2, w3],
            len: 4,
            valid: true,
            contains_origin: true,
        }
    }
}

/// Active vertices of a resolved feature and their barycentric weights.
#[derive(Clone, Copy, Debug)]
struct Feature {
    idx: [usize; 4],
    weights: [f32; 4],
    len: usize,
    valid: bool,
    contains_origin: bool,
}

impl Feature {
    fn vertex(i: usize) -> Self {
        Self {
            idx: [i, 0, 0, 0],
            weights: [1.0, 0.0, 0.0, 0.0],
            len: 1,
            valid: true,
            contains_origin: false,
        }
    }

    fn edge(i: usize, j: usize, t: f32, valid: bool) -> Self {
        Self {
            idx: [i, j, 0, 0],
            weights: [1.0 - t, t, 0.0, 0.0],
            len: 2,
            valid,
            contains_origin: false,
        }
    }
}

fn signed_volume(a: Vec3, b: Vec3, c: Vec3, d: Vec3) -> f32 {
    (b - a).cross(&(c - a)).dot(&(d - a))
}

/// True if the origin and `opposite` lie on different sides of plane `abc`. A flat
/// tetrahedron counts every face as a candidate.
fn origin_outside_face(a: Vec3, b: Vec3, c: Vec3, opposite: Vec3) -> bool {
    let n = (b - a).cross(&(c - a));
    let sign_o = (-a).dot(&n);
    let sign_d = (opposite - a).dot(&n);
    if sign_d.abs() <= VERY_SMALL_NUMBER {
        return true;
    }
    sign_o * sign_d < 0.0
}

fn closest_on_segment(a: Vec3, b: Vec3, idx: [usize; 2]) -> Feature {
    let ab = b - a;
    let t = (-a).dot(&ab);
    if t <= 0.0 {
        return Feature::vertex(idx[0]);
    }
    let denom = ab.norm_squared();
    if t >= denom {
        return Feature::vertex(idx[1]);
    }
    if denom <= VERY_SMALL_NUMBER {
        return Feature {
            valid: false,
            ..Feature::vertex(idx[0])
        };
    }
    Feature::edge(idx[0], idx[1], t / denom, true)
}

/// Closest point on triangle `abc` to the origin by Voronoi-region classification.
fn closest_on_triangle(a: Vec3, b: Vec3, c: Vec3, idx: [usize; 3]) -> Feature {
    let ab = b - a;
    let ac = c - a;
    let ap = -a;

    let d1 = ab.dot(&ap);
    let d2 = ac.dot(&ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return Feature::vertex(idx[0]);
    }

    let bp = -b;
    let d3 = ab.dot(&bp);
    let d4 = ac.dot(&bp);
    if d3 >= 0.0 && d4 <= d3 {
        return Feature::vertex(idx[1]);
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        let denom = d1 - d3;
        if denom <= VERY_SMALL_NUMBER {
            return Feature {
                valid: false,
                ..Feature::vertex(idx[0])
            };
        }
        return Feature::edge(idx[0], idx[1], d1 / denom, true);
    }

    let cp = -c;
    let d5 = ab.dot(&cp);
    let d6 = ac.dot(&cp);
    if d6 >= 0.0 && d5 <= d6 {
        return Feature::vertex(idx[2]);
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let denom = d2 - d6;
        if denom <= VERY_SMALL_NUMBER {
            return Feature {
                valid: false,
                ..Feature::vertex(idx[0])
            };
        }
        return Feature::edge(idx[0], idx[2], d2 / denom, true);
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let denom = (d4 - d3) + (d5 - d6);
        if denom <= VERY_SMALL_NUMBER {
            return Feature {
                valid: false,
                ..Feature::vertex(idx[1])
            };
        }
        return Feature::edge(idx[1], idx[2], (d4 - d3) / denom, true);
    }

    let sum = va + vb + vc;
    if sum.abs() <= VERY_SMALL_NUMBER {
        // Collinear triangle: fall back to the nearest edge.
        let edges = [
            closest_on_segment(a, b, [idx[0], idx[1]]),
            closest_on_segment(a, c, [idx[0], idx[2]]),
            closest_on_segment(b, c, [idx[1], idx[2]]),
        ];
        let pts = [(a, b), (a, c), (b, c)];
        let mut best = edges[0];
        let mut best_d = f32::MAX;
        for (f, (p, q)) in edges.into_iter().zip(pts) {
            let t = if f.len == 2 { f.weights[1] } else { 0.0 };
            let pt = if f.len == 2 {
                p + (q - p) * t
            } else if f.idx[0] == idx[0] {
                a
            } else if f.idx[0] == idx[1] {
                b
            } else {
                c
            };
            let d = pt.norm_squared();
            if d < best_d {
                best_d = d;
                best = f;
            }
        }
        best.valid = false;
        return best;
    }

    let v = vb / sum;
    let w = vc / sum;
    Feature {
        idx: [idx[0], idx[1], idx[2], 0],
        weights: [1.0 - v - w, v, w, 0.0],
        len: 3,
        valid: true,
        contains_origin: false,
    }
}
