/*!
Tick orchestration for capsule agents.

`AgentStore` holds the persistent agent records, `TickInput` carries one tick's input,
and `TickPipeline::step` runs the two-pass floor / velocity / broad-phase / sweep / move
sequence across all agents on the rayon pool.
*/

pub mod agent;
pub mod scene;
pub mod settings;
pub mod tick;

pub use agent::{AgentId, AgentInput, AgentRecord, AgentStore, TickInput};
pub use scene::{AgentPose, AgentScene};
pub use settings::{MAX_TICK_DT, WorldSettings};
pub use tick::{PASSES, TickPipeline, TickReport};
