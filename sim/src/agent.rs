//! Persistent agent records and per-tick input.

use std::collections::HashMap;

use capsweep_collision::error::ConfigError;
use capsweep_collision::movement::{
    AgentMoveData, GroundState, MovementConfig, clamp_input_length,
};
use capsweep_collision::types::{Vec2, Vec3, is_non_finite, xz_to_vec3};
use capsweep_collision::Capsule;

/// Stable index of an agent in its `AgentStore`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AgentId(pub u32);

impl AgentId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "agent#{}", self.0)
    }
}

/// State that survives between ticks.
#[derive(Clone, Debug, PartialEq)]
pub struct AgentRecord {
    pub id: AgentId,
    /// Capsule base.
    pub position: Vec3,
    pub velocity: Vec3,
    pub ground_state: GroundState,
    pub floor_normal: Vec3,
    /// Last surface run into, kept for inspection. Each tick starts without wall contact.
    pub wall_normal: Vec3,
    pub jump_count: u8,
    pub shape: Capsule,
    pub config: MovementConfig,
}

impl AgentRecord {
    /// Working state for one tick.
    pub fn move_data(&self, input: &AgentInput, dt: f32) -> AgentMoveData {
        let mut md = AgentMoveData::new(self.position, self.shape, self.config, dt);
        md.velocity = self.velocity;
        md.ground_state = self.ground_state;
        md.floor_normal = self.floor_normal;
        md.jump_count = self.jump_count;
        md.was_grounded_last_tick = self.ground_state.is_grounded();
        md.move_direction = clamp_input_length(xz_to_vec3(input.direction), 0.0, 1.0);
        md.jump_requested = input.jump;
        md
    }

    /// Persist the outcome of a tick. Returns true if the agent changed position.
    pub fn absorb(&mut self, md: &AgentMoveData) -> bool {
        let moved = self.position != md.position;
        self.position = md.position;
        self.velocity = md.velocity;
        self.ground_state = md.ground_state;
        self.floor_normal = md.floor_normal;
        self.wall_normal = md.wall_normal;
        self.jump_count = md.jump_count;
        moved
    }
}

/// Index-addressed agent storage. Ids are never reused.
#[derive(Clone, Debug, Default)]
pub struct AgentStore {
    records: Vec<AgentRecord>,
}

impl AgentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an agent standing (or falling) at `position`.
    pub fn spawn(
        &mut self,
        position: Vec3,
        shape: Capsule,
        config: MovementConfig,
    ) -> Result<AgentId, ConfigError> {
        if is_non_finite(&position) {
            return Err(ConfigError::NonFinite {
                field: "spawn position",
                value: position.norm(),
            });
        }
        let dims_ok = shape.radius.is_finite()
            && shape.half_length.is_finite()
            && shape.radius > 0.0
            && shape.half_length >= shape.radius;
        if !dims_ok {
            return Err(ConfigError::CapsuleDims {
                radius: shape.radius,
                half_length: shape.half_length,
            });
        }
        config.validate()?;

        let id = AgentId(self.records.len() as u32);
        self.records.push(AgentRecord {
            id,
            position,
            velocity: Vec3::zeros(),
            ground_state: GroundState::Airborne,
            floor_normal: Vec3::zeros(),
            wall_normal: Vec3::zeros(),
            jump_count: 0,
            shape,
            config,
        });
        Ok(id)
    }

    pub fn get(&self, id: AgentId) -> Option<&AgentRecord> {
        self.records.get(id.index())
    }

    pub fn get_mut(&mut self, id: AgentId) -> Option<&mut AgentRecord> {
        self.records.get_mut(id.index())
    }

    pub fn iter(&self) -> impl Iterator<Item = &AgentRecord> {
        self.records.iter()
    }

    pub fn records(&self) -> &[AgentRecord] {
        &self.records
    }

    pub fn records_mut(&mut self) -> &mut [AgentRecord] {
        &mut self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// One agent's input for a tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AgentInput {
    /// Desired planar direction (x, z). Longer than one is clamped.
    pub direction: Vec2,
    pub jump: bool,
}

impl AgentInput {
    pub fn walk(x: f32, z: f32) -> Self {
        Self {
            direction: Vec2::new(x, z),
            jump: false,
        }
    }
}

/// Everything the pipeline needs from the outside for one tick.
#[derive(Clone, Debug, Default)]
pub struct TickInput {
    pub dt: f32,
    pub inputs: HashMap<AgentId, AgentInput>,
}

impl TickInput {
    pub fn new(dt: f32) -> Self {
        Self {
            dt,
            inputs: HashMap::new(),
        }
    }

    pub fn with(mut self, id: AgentId, input: AgentInput) -> Self {
        self.inputs.insert(id, input);
        self
    }

    /// Input for `id`; agents without input stand still.
    pub fn input(&self, id: AgentId) -> AgentInput {
        self.inputs.get(&id).copied().unwrap_or_default()
    }
}
