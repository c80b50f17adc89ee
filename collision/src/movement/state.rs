//! Per-agent movement state carried through one tick.

use crate::constants::{
    DEFAULT_AIR_ACCELERATION, DEFAULT_AIR_SPEED, DEFAULT_GROUND_SPEED, DEFAULT_JUMP_SPEED,
    DEFAULT_MIN_WALKABLE_Y, DEFAULT_STEP_HEIGHT, GRAVITY_MPS2, TERMINAL_FALL_SPEED_MPS,
};
use crate::error::{ConfigError, check_non_negative};
use crate::layers::CollisionMask;
use crate::shape::Capsule;
use crate::types::{Delta, Vec3};

/// Ground contact classification of an agent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum GroundState {
    /// No floor within probe range.
    #[default]
    Airborne,
    /// Standing on a walkable surface.
    Grounded,
    /// Touching a floor too steep to stand on.
    SlidingDown,
}

impl GroundState {
    pub fn is_grounded(self) -> bool {
        self == GroundState::Grounded
    }
}

/// Tuning for one agent's movement.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MovementConfig {
    /// Walking speed in meters per second.
    pub max_ground_speed: f32,
    /// Meters per second squared; `INFINITY` reaches the target velocity instantly.
    pub ground_acceleration: f32,
    pub max_air_speed: f32,
    pub air_acceleration: f32,
    /// Minimum `normal.y` of a surface the agent can stand on.
    pub min_walkable_y: f32,
    /// Tallest ledge the agent climbs without jumping. Zero disables stepping.
    pub step_height: f32,
    pub gravity: f32,
    pub terminal_fall_speed: f32,
    pub jump_speed: f32,
    /// Jumps allowed before touching the ground again.
    pub max_jumps: u8,
    /// Layers the agent collides with.
    pub collision_mask: CollisionMask,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            max_ground_speed: DEFAULT_GROUND_SPEED,
            ground_acceleration: f32::INFINITY,
            max_air_speed: DEFAULT_AIR_SPEED,
            air_acceleration: DEFAULT_AIR_ACCELERATION,
            min_walkable_y: DEFAULT_MIN_WALKABLE_Y,
            step_height: DEFAULT_STEP_HEIGHT,
            gravity: GRAVITY_MPS2,
            terminal_fall_speed: TERMINAL_FALL_SPEED_MPS,
            jump_speed: DEFAULT_JUMP_SPEED,
            max_jumps: 1,
            collision_mask: CollisionMask::all(),
        }
    }
}

impl MovementConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_non_negative("max_ground_speed", self.max_ground_speed, false)?;
        check_non_negative("ground_acceleration", self.ground_acceleration, true)?;
        check_non_negative("max_air_speed", self.max_air_speed, false)?;
        check_non_negative("air_acceleration", self.air_acceleration, true)?;
        check_non_negative("step_height", self.step_height, false)?;
        check_non_negative("gravity", self.gravity, false)?;
        check_non_negative("terminal_fall_speed", self.terminal_fall_speed, false)?;
        check_non_negative("jump_speed", self.jump_speed, false)?;
        if !(self.min_walkable_y > 0.0 && self.min_walkable_y <= 1.0) {
            return Err(ConfigError::WalkableThreshold(self.min_walkable_y));
        }
        Ok(())
    }
}

/// Floor found under an agent by the downward probe.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FloorHit {
    /// Gap between the capsule base and the floor. Negative when sunk in.
    pub distance: f32,
    pub point: Vec3,
    /// Surface normal, corrected by a raycast where possible.
    pub normal: Vec3,
}

/// Counters for the unusual things that happened to one agent during a tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MoveEvents {
    /// Placements that fell back to the start position.
    pub stuck: u32,
    /// Placements rejected because they produced NaN.
    pub nan_rejected: u32,
    pub step_ups: u32,
    /// Second-surface slides into a corner or crease.
    pub corner_slides: u32,
}

impl MoveEvents {
    pub fn merge(&mut self, other: &MoveEvents) {
        self.stuck += other.stuck;
        self.nan_rejected += other.nan_rejected;
        self.step_ups += other.step_ups;
        self.corner_slides += other.corner_slides;
    }
}

/// Working state for one agent during a tick.
///
/// Rebuilt from the persistent agent record at the start of every tick. Wall contact
/// starts cleared; everything else carries over.
#[derive(Clone, Debug, PartialEq)]
pub struct AgentMoveData {
    /// Capsule base (bottom of the lower cap).
    pub position: Vec3,
    /// Meters per second.
    pub velocity: Vec3,
    pub ground_state: GroundState,
    /// Normal of the last surface the agent ran into this tick, or zero.
    pub wall_normal: Vec3,
    /// Normal of the floor under the agent, or zero.
    pub floor_normal: Vec3,
    /// Displacement planned for the current pass.
    pub pending: Delta,
    /// Surface the pending displacement already slides along.
    pub slide_normal: Option<Vec3>,
    pub was_grounded_last_tick: bool,
    /// Horizontal input direction, length in `[0, 1]`.
    pub move_direction: Vec3,
    pub jump_requested: bool,
    pub jump_count: u8,
    pub capsule: Capsule,
    pub config: MovementConfig,
    /// Seconds of the tick not yet consumed by motion.
    pub dt: f32,
    pub events: MoveEvents,
}

impl AgentMoveData {
    pub fn new(position: Vec3, capsule: Capsule, config: MovementConfig, dt: f32) -> Self {
        Self {
            position,
            velocity: Vec3::zeros(),
            ground_state: GroundState::Airborne,
            wall_normal: Vec3::zeros(),
            floor_normal: Vec3::zeros(),
            pending: Delta::zero(),
            slide_normal: None,
            was_grounded_last_tick: false,
            move_direction: Vec3::zeros(),
            jump_requested: false,
            jump_count: 0,
            capsule,
            config,
            dt,
            events: MoveEvents::default(),
        }
    }

    /// World-space center of the capsule.
    pub fn center(&self) -> Vec3 {
        self.capsule.center_from_base(self.position)
    }

    pub fn is_walkable(&self, normal: &Vec3) -> bool {
        normal.y >= self.config.min_walkable_y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(MovementConfig::default().validate(), Ok(()));
    }

    #[test]
    fn rejects_bad_config() {
        let cfg = MovementConfig {
            max_ground_speed: -1.0,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::Negative { .. })));

        let cfg = MovementConfig {
            min_walkable_y: 1.5,
            ..Default::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::WalkableThreshold(1.5)));

        let cfg = MovementConfig {
            gravity: f32::NAN,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::NonFinite { .. })));
    }

    #[test]
    fn events_merge() {
        let mut a = MoveEvents {
            stuck: 1,
            ..Default::default()
        };
        a.merge(&MoveEvents {
            stuck: 2,
            step_ups: 1,
            ..Default::default()
        });
        assert_eq!(a.stuck, 3);
        assert_eq!(a.step_ups, 1);
    }
}
