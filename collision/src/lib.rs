/*!
Capsule collision and kinematic movement.

Layers, from the bottom up:
- `types`, `constants`, `layers`, `error`: shared vocabulary.
- `shape`, `simplex`, `gjk`: convex support functions and the GJK overlap / sweep engine.
- `broad`: uniform spatial grid for agent-vs-agent candidate pairs.
- `query`, `rapier_world`: the shape-query provider interface and its static-world backend.
- `movement`: the per-agent movement state machine built on the above.
*/

pub mod broad;
pub mod constants;
pub mod error;
pub mod gjk;
pub mod layers;
pub mod movement;
pub mod query;
pub mod rapier_world;
pub mod shape;
pub mod simplex;
pub mod types;

pub use broad::{BroadBody, SpatialGrid};
pub use error::ConfigError;
pub use gjk::{ConvexCastHit, Gjk, OverlapOutcome, SweepOutcome};
pub use layers::{CollisionMask, Layer, LayerMask};
pub use query::{EmptyWorld, RayHit, ShapeQuery, SweepHit};
pub use rapier_world::{ColliderShapeDef, RapierQueryWorld, WorldStaticDef};
pub use shape::{Capsule, Shape};
pub use types::{Delta, Iso, Quat, Vec2, Vec3};
