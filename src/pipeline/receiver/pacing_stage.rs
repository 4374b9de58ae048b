//! Pacing stage for the receiver pipeline
//!
//! Releases decoded frames to the render sink on the sender's timeline.
//! The first frame fixes the anchor `(pts0, t0)`; a later frame with
//! timestamp `pts` is painted no earlier than `t0 + (pts - pts0)` µs.
//! Frames already late are painted at once, never dropped.

use async_trait::async_trait;
use log::info;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::present;
use crate::display::RenderSink;
use crate::error::Result;
use crate::pipeline::{PaintFrameQueue, PipelineStage, PopError, SessionStats};

/// Mapping from stream time to local time, fixed by the first frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PtsAnchor {
    pub pts: i64,
    pub at: Instant,
}

impl PtsAnchor {
    /// Earliest local time a frame stamped `pts` may be painted.
    pub fn release_at(&self, pts: i64) -> Instant {
        match u64::try_from(pts.saturating_sub(self.pts)) {
            Ok(delta) => self.at + Duration::from_micros(delta),
            // before the anchor, already due
            Err(_) => self.at,
        }
    }
}

pub struct PacingStage<I> {
    input: Arc<PaintFrameQueue<I>>,
    sink: Box<dyn RenderSink<I>>,
    stats: Arc<SessionStats>,
    queue_timeout: Duration,
    debug: bool,
    anchor: Option<PtsAnchor>,
}

impl<I: Send + 'static> PacingStage<I> {
    pub fn new(
        input: Arc<PaintFrameQueue<I>>,
        sink: Box<dyn RenderSink<I>>,
        stats: Arc<SessionStats>,
        queue_timeout: Duration,
        debug: bool,
    ) -> Self {
        Self {
            input,
            sink,
            stats,
            queue_timeout,
            debug,
            anchor: None,
        }
    }

    pub fn anchor(&self) -> Option<PtsAnchor> {
        self.anchor
    }

    /// Wait until `pts` is due and return how long that actually took.
    /// `None` if the input closed meanwhile.
    async fn wait_for(&mut self, pts: i64) -> Option<Duration> {
        let now = Instant::now();
        let anchor = *self.anchor.get_or_insert(PtsAnchor { pts, at: now });
        let due = anchor.release_at(pts);

        if self.debug {
            info!(
                "pts: {}, due in {}ms",
                pts,
                due.saturating_duration_since(now).as_millis()
            );
        }
        if due <= now {
            return Some(Duration::ZERO);
        }

        tokio::select! {
            _ = tokio::time::sleep_until(due) => {}
            _ = self.input.closed() => return None,
        }
        let waited = now.elapsed();
        if self.debug {
            info!(
                "pts: {}, waited {}ms of {}ms",
                pts,
                waited.as_millis(),
                due.saturating_duration_since(now).as_millis()
            );
        }
        Some(waited)
    }
}

#[async_trait]
impl<I: Send + 'static> PipelineStage for PacingStage<I> {
    async fn run(&mut self) -> Result<()> {
        info!("PacingStage: started");
        loop {
            let frame = match self.input.pop(self.queue_timeout).await {
                Ok(frame) => frame,
                Err(PopError::Timeout) => continue,
                Err(PopError::Closed) => {
                    info!("PacingStage: input closed");
                    return Ok(());
                }
            };

            // on close the held frame drops back into its pool
            if self.wait_for(frame.pts).await.is_none() {
                return Ok(());
            }
            present(self.sink.as_mut(), frame, &self.stats)?;
        }
    }

    fn name(&self) -> &'static str {
        "PacingStage"
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.input.close();
        info!(
            "PacingStage: finished ({} painted)",
            self.stats.frames_painted()
        );
        Ok(())
    }
}

impl<I> Drop for PacingStage<I> {
    fn drop(&mut self) {
        self.input.close();
    }
}
