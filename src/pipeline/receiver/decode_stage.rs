//! Decode stage for the receiver pipeline
//!
//! Feeds packets to the codec and forwards decoded images either to the
//! pacing stage or, when painting immediately, straight to the render sink.

use async_trait::async_trait;
use bytes::BytesMut;
use log::info;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::present;
use crate::decoder::{Codec, Decoded};
use crate::display::RenderSink;
use crate::error::Result;
use crate::pipeline::{
    FramePool, NetFrame, NetFrameQueue, PaintFrame, PaintFrameQueue, PipelineStage, PopError,
    Pooled, SessionStats,
};

/// Where decoded images go.
pub enum PaintTarget<I> {
    /// Through the pacing stage, released on PTS.
    Pacing(Arc<PaintFrameQueue<I>>),
    /// Painted from the decode task as soon as decoded.
    Immediate(Box<dyn RenderSink<I>>),
}

/// Decode stage: merges config-only packets into the next frame packet and
/// decodes one packet per input frame.
pub struct DecodeStage<C: Codec> {
    codec: C,
    input: Arc<NetFrameQueue>,
    paint_pool: FramePool<PaintFrame<C::Image>>,
    output: PaintTarget<C::Image>,
    stats: Arc<SessionStats>,
    queue_timeout: Duration,
    debug: bool,
    /// Config bytes waiting to be prefixed to the next frame packet
    merge: BytesMut,
}

impl<C: Codec> DecodeStage<C> {
    pub fn new(
        codec: C,
        input: Arc<NetFrameQueue>,
        paint_pool: FramePool<PaintFrame<C::Image>>,
        output: PaintTarget<C::Image>,
        stats: Arc<SessionStats>,
        queue_timeout: Duration,
        debug: bool,
    ) -> Self {
        Self {
            codec,
            input,
            paint_pool,
            output,
            stats,
            queue_timeout,
            debug,
            merge: BytesMut::new(),
        }
    }

    /// Bytes held back from config-only packets.
    pub fn pending_config(&self) -> &[u8] {
        &self.merge
    }

    /// Borrow an output frame, giving up once the input closes.
    async fn borrow_paint_frame(&mut self) -> Option<Pooled<PaintFrame<C::Image>>> {
        loop {
            let borrowed = tokio::select! {
                biased;
                borrowed = self.paint_pool.borrow(self.queue_timeout) => borrowed,
                _ = self.input.closed() => return None,
            };
            match borrowed {
                Ok(frame) => return Some(frame),
                Err(PopError::Closed) => return None,
                Err(PopError::Timeout) => {
                    if self.debug {
                        info!("DecodeStage: no free paint frame, decode paused");
                    }
                }
            }
        }
    }

    /// Decode one packet into `paint`.
    ///
    /// Returns the filled frame, or `None` when the packet was held for
    /// merging or the codec produced nothing yet; `paint` then drops back
    /// into its pool.
    fn decode(
        &mut self,
        frame: &NetFrame,
        mut paint: Pooled<PaintFrame<C::Image>>,
    ) -> Result<Option<Pooled<PaintFrame<C::Image>>>> {
        if frame.is_config_only() {
            self.merge.extend_from_slice(&frame.payload);
            self.stats.record_config_merged();
            if self.debug {
                info!("DecodeStage: holding {} config bytes", self.merge.len());
            }
            return Ok(None);
        }

        let started = Instant::now();
        let packet: &[u8] = if self.merge.is_empty() {
            &frame.payload
        } else {
            self.merge.extend_from_slice(&frame.payload);
            &self.merge
        };
        let sent = self.codec.send_packet(packet, frame.pts);
        self.merge.clear();
        sent?;

        match self.codec.receive_frame()? {
            Some(Decoded { pts, image }) => {
                // the codec may lag, so the image keeps its own pts
                paint.pts = pts;
                paint.image = Some(image);
                self.stats.record_decoded();
                if self.debug {
                    info!(
                        "decode time: {}ms, pts: {} (packet pts: {})",
                        started.elapsed().as_millis(),
                        pts,
                        frame.pts
                    );
                }
                Ok(Some(paint))
            }
            None => {
                self.stats.record_decoder_pending();
                if self.debug {
                    info!("DecodeStage: no image yet for pts {}", frame.pts);
                }
                Ok(None)
            }
        }
    }

    /// Hand a decoded frame on. Returns false once the pacing queue is closed.
    fn forward(&mut self, paint: Pooled<PaintFrame<C::Image>>) -> Result<bool> {
        match &mut self.output {
            PaintTarget::Pacing(queue) => {
                if queue.push(paint).is_err() {
                    info!("DecodeStage: pacing queue closed");
                    return Ok(false);
                }
                Ok(true)
            }
            PaintTarget::Immediate(sink) => {
                present(sink.as_mut(), paint, &self.stats)?;
                Ok(true)
            }
        }
    }
}

#[async_trait]
impl<C: Codec> PipelineStage for DecodeStage<C> {
    async fn run(&mut self) -> Result<()> {
        info!("DecodeStage: started");
        loop {
            let frame = match self.input.pop(self.queue_timeout).await {
                Ok(frame) => frame,
                Err(PopError::Timeout) => continue,
                Err(PopError::Closed) => {
                    info!("DecodeStage: input closed");
                    return Ok(());
                }
            };

            let Some(paint) = self.borrow_paint_frame().await else {
                return Ok(());
            };
            if self.input.is_closed() {
                info!("DecodeStage: input closed");
                return Ok(());
            }

            let decoded = self.decode(&frame, paint)?;
            // the packet goes back to the net pool before the image moves on
            drop(frame);

            if let Some(paint) = decoded
                && !self.forward(paint)?
            {
                return Ok(());
            }
        }
    }

    fn name(&self) -> &'static str {
        "DecodeStage"
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.input.close();
        if let PaintTarget::Pacing(queue) = &self.output {
            queue.close();
        }
        info!(
            "DecodeStage: finished ({} decoded, {} config packets merged)",
            self.stats.frames_decoded(),
            self.stats.config_packets_merged.load(std::sync::atomic::Ordering::Relaxed)
        );
        Ok(())
    }
}

impl<C: Codec> Drop for DecodeStage<C> {
    // reached without shutdown when the task panics
    fn drop(&mut self) {
        self.input.close();
        if let PaintTarget::Pacing(queue) = &self.output {
            queue.close();
        }
    }
}
