/*!
Kinematic movement resolution for capsule agents.

- `state`: per-agent working data, tuning and ground classification.
- `ramp`: pure vector helpers for ramps, slides and creases.
- `resolve`: world-facing primitives (sweep, guarded placement, floor probe, step-up).
- `machine`: the floor / velocity / move steps run once per intra-tick pass.
*/

pub mod machine;
pub mod ramp;
pub mod resolve;
pub mod state;

pub use machine::{apply_move, compute_velocity, snap_to_floor_or_fall};
pub use ramp::{
    clamp_input_length, ramp_vector, slide_down_vector, slide_vector, two_surface_slide_vector,
};
pub use resolve::{
    CornerSlide, MoveResult, Placement, find_floor, move_capsule, set_capsule_pos, step_up,
    sweep_capsule,
};
pub use state::{AgentMoveData, FloorHit, GroundState, MoveEvents, MovementConfig};
