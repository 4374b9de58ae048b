//! Receiving pipeline
//!
//! Three stages, each in its own task, connected by bounded handoff queues
//! and fed from fixed-size frame pools:
//!
//! ```text
//! socket → Receive ─NetFrame→ Decode ─PaintFrame→ Pacing → RenderSink
//! ```
//!
//! Frames never leave their pool for good: a [`Pooled`] handle goes back to
//! the free set when dropped, whether it was consumed, rejected by a closed
//! queue or discarded during shutdown.

pub mod frame_pool;
pub mod health;
pub mod queue;
pub mod receiver;
pub mod stage;
pub mod state;
pub mod types;

pub use frame_pool::{FramePool, Pooled};
pub use health::{SessionStats, StatsSummary};
pub use queue::{HandoffQueue, PopError, PushError};
pub use stage::{PipelineStage, spawn_stage};
pub use state::ConnectionState;
pub use types::{CONFIG_PTS, NetFrame, PaintFrame};

/// Queue between the frame reader and the decode stage.
pub type NetFrameQueue = HandoffQueue<Pooled<NetFrame>>;

/// Queue between the decode stage and the pacing stage.
pub type PaintFrameQueue<I> = HandoffQueue<Pooled<PaintFrame<I>>>;
