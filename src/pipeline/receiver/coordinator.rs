//! Receiver pipeline coordinator
//!
//! Wires receive → decode → pacing, spawns each stage in its own task and
//! tears the session down in order.

use log::{error, info};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::decode_stage::{DecodeStage, PaintTarget};
use super::frame_reader::FrameReader;
use super::pacing_stage::PacingStage;
use super::receive_stage::ReceiveStage;
use crate::config::Config;
use crate::decoder::Codec;
use crate::display::RenderSink;
use crate::error::{Result, SessionError};
use crate::net::Connector;
use crate::pipeline::{
    ConnectionState, FramePool, HandoffQueue, NetFrame, PaintFrame, SessionStats, spawn_stage,
};

/// Requests an orderly end of the session. Cheap to clone and safe to call
/// from any thread, any number of times.
#[derive(Clone)]
pub struct SessionCloser {
    session: CancellationToken,
    net_pool: FramePool<NetFrame>,
}

impl SessionCloser {
    pub fn close(&self) {
        if !self.session.is_cancelled() {
            info!("ReceiverCoordinator: close requested");
        }
        self.net_pool.close();
        self.session.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.session.is_cancelled()
    }
}

struct StageTask {
    name: &'static str,
    handle: JoinHandle<Result<()>>,
}

/// Coordinates the receiver pipeline: Receive → Decode → Pacing → Sink
pub struct ReceiverCoordinator {
    closer: SessionCloser,
    state: watch::Receiver<ConnectionState>,
    stats: Arc<SessionStats>,
    /// Downstream first, the order they are joined in
    tasks: Vec<StageTask>,
}

impl ReceiverCoordinator {
    /// Start a session. Must be called from within a tokio runtime.
    ///
    /// Frames are paced on PTS unless `config.immediately_paint` is set, in
    /// which case the decode task paints them itself.
    pub fn launch<C, S>(config: &Config, codec: C, sink: S) -> Self
    where
        C: Codec,
        S: RenderSink<C::Image> + 'static,
    {
        info!("{}", config.describe());

        let session = CancellationToken::new();
        let stats = Arc::new(SessionStats::new());

        let net_pool = FramePool::new(config.net_pool_capacity, NetFrame::new);
        let paint_pool = FramePool::new(config.paint_pool_capacity, PaintFrame::new);
        let decode_input = Arc::new(HandoffQueue::new());

        let connector = Connector::new(config.clone(), session.clone());
        let state = connector.subscribe();
        let reader = FrameReader::new(
            net_pool.clone(),
            decode_input.clone(),
            stats.clone(),
            config.queue_timeout,
            config.debug_net,
        );
        let receive = ReceiveStage::new(
            connector,
            reader,
            stats.clone(),
            session.clone(),
            config.keepalive_interval,
            config.debug_net,
        );

        let sink: Box<dyn RenderSink<C::Image>> = Box::new(sink);
        let mut tasks = Vec::with_capacity(3);

        let target = if config.immediately_paint {
            PaintTarget::Immediate(sink)
        } else {
            let pacing_input = Arc::new(HandoffQueue::new());
            let pacing = PacingStage::new(
                pacing_input.clone(),
                sink,
                stats.clone(),
                config.queue_timeout,
                config.debug_pts,
            );
            tasks.push(StageTask {
                name: "PacingStage",
                handle: spawn_stage(pacing, session.clone()),
            });
            PaintTarget::Pacing(pacing_input)
        };

        let decode = DecodeStage::new(
            codec,
            decode_input,
            paint_pool,
            target,
            stats.clone(),
            config.queue_timeout,
            config.debug_decode,
        );
        tasks.push(StageTask {
            name: "DecodeStage",
            handle: spawn_stage(decode, session.clone()),
        });
        tasks.push(StageTask {
            name: "ReceiveStage",
            handle: spawn_stage(receive, session.clone()),
        });

        Self {
            closer: SessionCloser { session, net_pool },
            state,
            stats,
            tasks,
        }
    }

    pub fn closer(&self) -> SessionCloser {
        self.closer.clone()
    }

    pub fn close(&self) {
        self.closer.close();
    }

    /// Watch the connection state; the last value seen is always `Closed`.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    pub fn stats(&self) -> Arc<SessionStats> {
        self.stats.clone()
    }

    /// Wait for every stage to finish.
    ///
    /// Returns the upstream-most stage error, or `Ok` when the session ended
    /// through [`close`](Self::close).
    pub async fn join(self) -> Result<()> {
        let mut cause = None;

        for task in self.tasks {
            let result = match task.handle.await {
                Ok(result) => result,
                Err(e) => {
                    error!("{} task failed: {}", task.name, e);
                    Err(SessionError::StageAborted(task.name))
                }
            };
            // later tasks sit further upstream, closer to the cause
            if let Err(e) = result {
                cause = Some(e);
            }
        }

        self.closer.close();
        info!("ReceiverCoordinator: session over, {}", self.stats.summary());

        match cause {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
