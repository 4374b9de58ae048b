//! Receiver pipeline components
//!
//! - ReceiveStage: discovery, connect, keepalive and packet framing
//! - DecodeStage: config merging and decoding
//! - PacingStage: paints frames on their PTS schedule
//!
//! ```text
//! Network → Receive → Decode → Pacing → RenderSink
//!                        └──(immediately paint)──→ RenderSink
//! ```

pub mod coordinator;
pub mod decode_stage;
pub mod frame_reader;
pub mod pacing_stage;
pub mod receive_stage;

pub use coordinator::{ReceiverCoordinator, SessionCloser};
pub use decode_stage::{DecodeStage, PaintTarget};
pub use frame_reader::{FrameHeader, FrameReader, HEADER_LEN};
pub use pacing_stage::{PacingStage, PtsAnchor};
pub use receive_stage::ReceiveStage;

use crate::display::RenderSink;
use crate::error::{Result, SessionError};
use crate::pipeline::{PaintFrame, Pooled, SessionStats};

/// Paint one frame, then let it go back to the paint pool without its image.
fn present<I>(
    sink: &mut dyn RenderSink<I>,
    mut frame: Pooled<PaintFrame<I>>,
    stats: &SessionStats,
) -> Result<()> {
    sink.paint(frame.image.as_ref(), frame.pts)
        .map_err(|e| SessionError::Sink(format!("{e:#}")))?;
    stats.record_painted();
    // release the codec's picture before the frame is reused
    frame.image = None;
    Ok(())
}
