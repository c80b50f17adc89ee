//! Rapier-based query world for immutable static geometry.
//!
//! Builds an in-memory Rapier scene from a list of static collider definitions and serves
//! the `ShapeQuery` calls made by the movement resolver: capsule sweeps, downward rays and
//! capsule overlap tests.
//!
//! Design goals
//! - Deterministic: given the same inputs (sorted by `id`), build identical in-memory sets.
//! - Query-only: nothing here steps dynamics. Statics never move after construction.
//! - Layer-aware: each collider carries a membership mask, and queries skip colliders whose
//!   mask does not intersect the query mask.

// Re-export Rapier so downstream crates can name Rapier types without depending on it.
pub use rapier3d;

use log::debug;
use rapier3d::na::{Point3, Translation3, UnitQuaternion};
use rapier3d::parry::bounding_volume::BoundingVolume;
use rapier3d::parry::query::{self as pquery, ShapeCastOptions};
use rapier3d::parry::shape::Capsule as ParryCapsule;
use rapier3d::prelude::*;

use crate::constants::STEP_BACK_DIST;
use crate::error::ConfigError;
use crate::layers::{CollisionMask, MaskStorage};
use crate::query::{RayHit, ShapeQuery, SweepHit};
use crate::shape::Capsule;
use crate::types::{Delta, Vec3, is_non_finite, normalize_safe};

/// Definition of an immutable world collider.
///
/// Conventions
/// - Units are meters.
/// - Rotation is a unit quaternion.
/// - For planes, the normal is `rotation * +Y` and the plane passes through
///   `translation + normal * offset_along_normal`.
#[derive(Clone, Debug)]
pub struct WorldStaticDef {
    /// Stable unique identifier used to ensure deterministic insertion order.
    pub id: u32,
    pub translation: Vector<f32>,
    pub rotation: UnitQuaternion<f32>,
    pub shape: ColliderShapeDef,
    /// Layers this collider belongs to.
    pub layers: CollisionMask,
}

impl WorldStaticDef {
    /// Axis-aligned static on every layer.
    pub fn new(id: u32, translation: Vec3, shape: ColliderShapeDef) -> Self {
        Self {
            id,
            translation,
            rotation: UnitQuaternion::identity(),
            shape,
            layers: CollisionMask::all(),
        }
    }

    pub fn with_rotation(mut self, rotation: UnitQuaternion<f32>) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_layers(mut self, layers: CollisionMask) -> Self {
        self.layers = layers;
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if is_non_finite(&self.translation) {
            return Err(ConfigError::NonFinite {
                field: "static translation",
                value: self.translation.norm(),
            });
        }
        match self.shape {
            ColliderShapeDef::Plane {
                offset_along_normal,
            } => {
                if !offset_along_normal.is_finite() {
                    return Err(ConfigError::NonFinite {
                        field: "plane offset",
                        value: offset_along_normal,
                    });
                }
            }
            ColliderShapeDef::Cuboid { half_extents } => {
                for v in half_extents.iter() {
                    positive("cuboid half extent", *v)?;
                }
            }
            ColliderShapeDef::Sphere { radius } => positive("sphere radius", radius)?,
            ColliderShapeDef::CapsuleY {
                radius,
                half_height,
            }
            | ColliderShapeDef::CylinderY {
                radius,
                half_height,
            } => {
                positive("radius", radius)?;
                positive("half height", half_height)?;
            }
        }
        Ok(())
    }
}

fn positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    crate::error::check_non_negative(field, value, false)?;
    if value == 0.0 {
        return Err(ConfigError::Negative { field, value });
    }
    Ok(())
}

/// Supported static collider shapes.
#[derive(Clone, Debug)]
pub enum ColliderShapeDef {
    /// Infinite plane (half-space), offset along its pose-derived normal.
    Plane { offset_along_normal: f32 },

    /// Oriented cuboid with given half-extents (meters).
    Cuboid { half_extents: Vector<f32> },

    Sphere { radius: f32 },

    /// Y-aligned capsule; `half_height` is the half-length of the medial segment.
    CapsuleY { radius: f32, half_height: f32 },

    CylinderY { radius: f32, half_height: f32 },
}

/// In-memory Rapier structures needed for scene queries against a static world.
///
/// For immutable statics these are built once at startup and shared read-only by every
/// movement worker.
pub struct RapierQueryWorld {
    pub bodies: RigidBodySet,
    pub colliders: ColliderSet,
    pub broad_phase: BroadPhaseBvh,
    pub narrow_phase: NarrowPhase,
}

impl RapierQueryWorld {
    /// Build a query world from a list of static collider definitions.
    ///
    /// The input is sorted by `id` before insertion. Non-finite or non-positive dimensions
    /// are rejected.
    pub fn build(mut defs: Vec<WorldStaticDef>) -> Result<Self, ConfigError> {
        for def in &defs {
            def.validate()?;
        }
        defs.sort_by_key(|d| d.id);

        let mut bodies = RigidBodySet::new();
        let mut colliders = ColliderSet::new();

        for def in defs.iter() {
            let iso = Isometry::from_parts(Translation3::from(def.translation), def.rotation);

            let rb = RigidBodyBuilder::fixed().pose(iso).build();
            let rb_handle = bodies.insert(rb);

            let collider = collider_from_def(def);
            colliders.insert_with_parent(collider, rb_handle, &mut bodies);
        }

        // Collision detection only: updates the broad-phase BVH so queries can run.
        let mut broad_phase = BroadPhaseBvh::new();
        let mut narrow_phase = NarrowPhase::new();
        let mut collision_pipeline = CollisionPipeline::new();
        collision_pipeline.step(
            0.0,
            &mut broad_phase,
            &mut narrow_phase,
            &mut bodies,
            &mut colliders,
            &(),
            &(),
        );

        debug!("query world built with {} static colliders", colliders.len());

        Ok(Self {
            bodies,
            colliders,
            broad_phase,
            narrow_phase,
        })
    }

    /// Borrowed `QueryPipeline` view over the statics.
    pub fn query_pipeline<'a>(&'a self, filter: QueryFilter<'a>) -> QueryPipeline<'a> {
        self.broad_phase.as_query_pipeline(
            self.narrow_phase.query_dispatcher(),
            &self.bodies,
            &self.colliders,
            filter,
        )
    }

    pub fn collider_count(&self) -> usize {
        self.colliders.len()
    }
}

fn collider_layers(collider: &Collider) -> CollisionMask {
    CollisionMask::new(collider.user_data as MaskStorage)
}

fn parry_capsule(capsule: &Capsule) -> ParryCapsule {
    let half = capsule.up * capsule.segment_half();
    ParryCapsule::new(Point3::from(-half), Point3::from(half), capsule.radius)
}

fn translation(p: Vec3) -> Isometry<f32> {
    Isometry::translation(p.x, p.y, p.z)
}

impl ShapeQuery for RapierQueryWorld {
    fn sweep_capsule(
        &self,
        capsule: &Capsule,
        center: Vec3,
        delta: Delta,
        mask: CollisionMask,
    ) -> Option<SweepHit> {
        if delta.is_zero() || !delta.len.is_finite() || is_non_finite(&center) {
            return None;
        }
        let shape = parry_capsule(capsule);
        let pos = translation(center);
        let vel = delta.as_vector();

        let predicate = |_: ColliderHandle, c: &Collider| collider_layers(c).intersects(mask);
        let pipeline = self.query_pipeline(QueryFilter::default().predicate(&predicate));

        // Shapes already touching and separating along the motion do not block it.
        let mut opts = ShapeCastOptions::with_max_time_of_impact(1.0);
        opts.stop_at_penetration = false;
        let (handle, hit) = pipeline.cast_shape(&pos, &vel, &shape, opts)?;

        let toi = hit.time_of_impact.clamp(0.0, 1.0);
        let at_impact = translation(center + vel * toi);

        // Cast results are local to the capsule frame. Re-derive world-space contact
        // geometry at the impact pose.
        let contact = self.colliders.get(handle).and_then(|c| {
            pquery::contact(
                &at_impact,
                &shape,
                c.position(),
                c.shape(),
                STEP_BACK_DIST * 2.0,
            )
            .ok()
            .flatten()
        });

        let (mut normal, point) = match contact {
            Some(c) => (-c.normal1.into_inner(), c.point2.coords),
            None => (
                -(at_impact.rotation * hit.normal1.into_inner()),
                (at_impact * hit.witness1).coords,
            ),
        };
        normal = normalize_safe(normal);
        if normal == Vec3::zeros() {
            normal = -delta.dir;
        }
        if normal.dot(&delta.dir) > 0.0 {
            normal = -normal;
        }

        Some(SweepHit {
            distance: toi * delta.len,
            point,
            normal,
        })
    }

    fn raycast(
        &self,
        origin: Vec3,
        dir: Vec3,
        max_dist: f32,
        mask: CollisionMask,
    ) -> Option<RayHit> {
        let dir = normalize_safe(dir);
        if dir == Vec3::zeros() || is_non_finite(&origin) || !max_dist.is_finite() {
            return None;
        }
        let predicate = |_: ColliderHandle, c: &Collider| collider_layers(c).intersects(mask);
        let pipeline = self.query_pipeline(QueryFilter::default().predicate(&predicate));

        let ray = Ray::new(Point3::from(origin), dir);
        let (_handle, hit) = pipeline.cast_ray_and_get_normal(&ray, max_dist.max(0.0), true)?;
        Some(RayHit {
            distance: hit.time_of_impact,
            point: origin + dir * hit.time_of_impact,
            normal: normalize_safe(hit.normal),
        })
    }

    fn overlaps_capsule(&self, capsule: &Capsule, center: Vec3, mask: CollisionMask) -> bool {
        if is_non_finite(&center) {
            return false;
        }
        let shape = parry_capsule(capsule);
        let pos = translation(center);
        let aabb = shape.aabb(&pos);

        self.colliders.iter().any(|(_, c)| {
            collider_layers(c).intersects(mask)
                && c.compute_aabb().intersects(&aabb)
                && pquery::intersection_test(&pos, &shape, c.position(), c.shape())
                    .unwrap_or(false)
        })
    }
}

/// Build a Rapier collider from a `WorldStaticDef`.
///
/// The pose lives on the parent rigid body, so colliders use an identity local transform
/// (planes excepted, see below).
fn collider_from_def(def: &WorldStaticDef) -> Collider {
    let builder = match &def.shape {
        ColliderShapeDef::Plane {
            offset_along_normal,
        } => {
            // The half-space sits in the body frame, whose +Y is the plane normal.
            let halfspace = HalfSpace::new(Vector::y_axis());
            ColliderBuilder::new(SharedShape::new(halfspace))
                .translation(Vector::y() * *offset_along_normal)
        }

        ColliderShapeDef::Cuboid { half_extents } => {
            ColliderBuilder::cuboid(half_extents.x, half_extents.y, half_extents.z)
        }

        ColliderShapeDef::Sphere { radius } => ColliderBuilder::ball(*radius),

        ColliderShapeDef::CapsuleY {
            radius,
            half_height,
        } => ColliderBuilder::capsule_y(*half_height, *radius),

        ColliderShapeDef::CylinderY {
            radius,
            half_height,
        } => ColliderBuilder::cylinder(*half_height, *radius),
    };
    builder.user_data(u128::from(def.layers.bits)).build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::Layer;
    use crate::types::up;
    use approx::assert_abs_diff_eq;

    fn floor_and_wall() -> RapierQueryWorld {
        RapierQueryWorld::build(vec![
            WorldStaticDef::new(
                2,
                Vec3::new(0.0, 1.0, 5.0),
                ColliderShapeDef::Cuboid {
                    half_extents: Vec3::new(5.0, 1.0, 0.5),
                },
            )
            .with_layers(CollisionMask::from_layers(&[Layer::Props])),
            WorldStaticDef::new(
                1,
                Vec3::zeros(),
                ColliderShapeDef::Plane {
                    offset_along_normal: 0.0,
                },
            )
            .with_layers(CollisionMask::from_layers(&[Layer::Terrain])),
        ])
        .expect("valid statics")
    }

    #[test]
    fn ray_hits_floor_plane() {
        let world = floor_and_wall();
        let hit = world
            .raycast(Vec3::new(0.0, 2.0, 0.0), -up(), 5.0, CollisionMask::all())
            .expect("floor below");
        assert_abs_diff_eq!(hit.distance, 2.0, epsilon = 1e-4);
        assert_abs_diff_eq!(hit.normal, up(), epsilon = 1e-4);
        assert_abs_diff_eq!(hit.point.y, 0.0, epsilon = 1e-4);
    }

    #[test]
    fn capsule_sweep_stops_at_wall() {
        let world = floor_and_wall();
        let capsule = Capsule::upright(0.5, 2.0);
        let center = Vec3::new(0.0, 1.1, 0.0);
        let hit = world
            .sweep_capsule(
                &capsule,
                center,
                Delta::new(Vec3::z(), 10.0),
                CollisionMask::all(),
            )
            .expect("wall ahead");
        // Wall face at z = 4.5, capsule radius 0.5.
        assert_abs_diff_eq!(hit.distance, 4.0, epsilon = 1e-3);
        assert_abs_diff_eq!(hit.normal, -Vec3::z(), epsilon = 1e-3);
        assert_abs_diff_eq!(hit.point.z, 4.5, epsilon = 1e-3);
    }

    #[test]
    fn capsule_sweep_down_lands_on_plane() {
        let world = floor_and_wall();
        let capsule = Capsule::upright(0.5, 2.0);
        let hit = world
            .sweep_capsule(
                &capsule,
                Vec3::new(0.0, 1.5, 0.0),
                Delta::new(-up(), 1.0),
                CollisionMask::all(),
            )
            .expect("floor below");
        assert_abs_diff_eq!(hit.distance, 0.5, epsilon = 1e-3);
        assert_abs_diff_eq!(hit.normal, up(), epsilon = 1e-3);
    }

    #[test]
    fn masks_filter_colliders() {
        let world = floor_and_wall();
        let capsule = Capsule::upright(0.5, 2.0);
        let terrain_only = CollisionMask::from_layers(&[Layer::Terrain]);
        let hit = world.sweep_capsule(
            &capsule,
            Vec3::new(0.0, 1.1, 0.0),
            Delta::new(Vec3::z(), 10.0),
            terrain_only,
        );
        assert!(hit.is_none());
        assert!(
            world
                .raycast(Vec3::new(0.0, 2.0, 0.0), -up(), 5.0, CollisionMask::none())
                .is_none()
        );
    }

    #[test]
    fn overlap_detects_embedded_capsule() {
        let world = floor_and_wall();
        let capsule = Capsule::upright(0.5, 2.0);
        assert!(world.overlaps_capsule(&capsule, Vec3::new(0.0, 1.0, 4.8), CollisionMask::all()));
        assert!(!world.overlaps_capsule(&capsule, Vec3::new(0.0, 1.1, 0.0), CollisionMask::all()));
        assert!(world.overlaps_capsule(&capsule, Vec3::new(0.0, 0.9, 0.0), CollisionMask::all()));
    }

    #[test]
    fn rejects_bad_dimensions() {
        let bad = WorldStaticDef::new(
            1,
            Vec3::zeros(),
            ColliderShapeDef::Sphere { radius: -1.0 },
        );
        assert!(RapierQueryWorld::build(vec![bad]).is_err());
        let nan = WorldStaticDef::new(
            1,
            Vec3::new(f32::NAN, 0.0, 0.0),
            ColliderShapeDef::Sphere { radius: 1.0 },
        );
        assert!(RapierQueryWorld::build(vec![nan]).is_err());
    }
}
