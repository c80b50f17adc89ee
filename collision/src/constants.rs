/*!
Kinematic agent tolerances and tuning constants.

Parameters shared by the GJK engine, the spatial grid and the movement resolution
state machine. Both intra-tick passes read the same values.

Notes
- Distances are in meters, time in seconds.
- Favor practical world-space tolerances over machine epsilon for robust behavior.
- Per-agent values (speeds, walkable slope, step height) live on `MovementConfig`;
  the values here are engine-wide.
*/

/// Distance an agent is pushed back along a hit normal after a blocked move (meters).
/// Keeps the capsule from starting the next sweep in contact with the surface.
pub const STEP_BACK_DIST: f32 = 0.01;

/// Downward probe distance used to re-acquire the floor (meters).
pub const FLOOR_CHECK_DIST: f32 = STEP_BACK_DIST * 16.0;

/// Lower edge of the hover window kept between the capsule base and the floor (meters).
pub const MIN_FLOOR_DIST: f32 = 0.019;

/// Upper edge of the hover window kept between the capsule base and the floor (meters).
pub const MAX_FLOOR_DIST: f32 = 0.024;

/// Fraction of the capsule half-length removed before the floor probe sweep.
/// The probe starts shrunk so a slight initial overlap with the floor still reports a hit.
pub const FLOOR_PROBE_SHRINK: f32 = 0.1;

/// Squared-distance tolerance for GJK convergence and duplicate simplex vertices.
pub const SWEEP_EPSILON: f32 = 1.0e-4;

/// Iteration cap for both the overlap test and the conservative-advancement sweep.
pub const MAX_GJK_ITERS: u32 = 32;

/// Candidates examined per grid bucket before the pair scan truncates.
pub const MAX_PAIR_TESTS_PER_BUCKET: usize = 256;

/// Practical small number for length and dot-product guards.
pub const KINDA_SMALL_NUMBER: f32 = 1.0e-4;

/// Squared length below which a vector is treated as zero by `normalize_safe`.
pub const VERY_SMALL_NUMBER: f32 = 1.0e-10;

/// Largest `f32` strictly below one; normals with `y >= ALMOST_ONE` are flat floors.
pub const ALMOST_ONE: f32 = 1.0 - f32::EPSILON;

/// Default walking speed in meters per second.
pub const DEFAULT_GROUND_SPEED: f32 = 5.0;

/// Default horizontal speed cap while airborne (meters per second).
pub const DEFAULT_AIR_SPEED: f32 = 3.0;

/// Default horizontal acceleration while airborne (meters per second squared).
pub const DEFAULT_AIR_ACCELERATION: f32 = 8.0;

/// Default minimum `normal.y` of a walkable surface (about 45 degrees).
pub const DEFAULT_MIN_WALKABLE_Y: f32 = 0.7;

/// Default maximum ledge height an agent can step onto (meters).
pub const DEFAULT_STEP_HEIGHT: f32 = 0.3;

/// Gravity magnitude in meters per second squared (positive value).
/// Integrated as a downward acceleration.
pub const GRAVITY_MPS2: f32 = 9.81;

/// Terminal fall speed magnitude (meters per second).
pub const TERMINAL_FALL_SPEED_MPS: f32 = 54.0;

/// Default vertical launch speed of a jump (meters per second).
pub const DEFAULT_JUMP_SPEED: f32 = 5.0;
