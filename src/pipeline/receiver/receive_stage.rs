//! Receive stage for the receiver pipeline
//!
//! Establishes the session, then reads framed packets into the decode queue
//! while a keepalive byte goes out on the same socket.

use async_trait::async_trait;
use log::info;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::frame_reader::FrameReader;
use crate::error::Result;
use crate::net::{Connector, keepalive};
use crate::pipeline::{PipelineStage, SessionStats};

pub struct ReceiveStage {
    connector: Connector,
    reader: FrameReader,
    stats: Arc<SessionStats>,
    cancel: CancellationToken,
    keepalive_interval: Duration,
    debug_net: bool,
}

impl ReceiveStage {
    pub fn new(
        connector: Connector,
        reader: FrameReader,
        stats: Arc<SessionStats>,
        cancel: CancellationToken,
        keepalive_interval: Duration,
        debug_net: bool,
    ) -> Self {
        Self {
            connector,
            reader,
            stats,
            cancel,
            keepalive_interval,
            debug_net,
        }
    }
}

#[async_trait]
impl PipelineStage for ReceiveStage {
    async fn run(&mut self) -> Result<()> {
        info!("ReceiveStage: started");
        let Some(stream) = self.connector.establish().await? else {
            info!("ReceiveStage: cancelled before streaming");
            return Ok(());
        };

        let (mut read_half, write_half) = stream.into_split();
        let cancel = self.cancel.clone();

        tokio::select! {
            _ = cancel.cancelled() => {
                info!("ReceiveStage: close requested");
                Ok(())
            }
            read = self.reader.run(&mut read_half) => read,
            written = keepalive(write_half, self.keepalive_interval, self.debug_net) => written,
        }
    }

    fn name(&self) -> &'static str {
        "ReceiveStage"
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.reader.release();
        self.reader.close_output();
        self.connector.close();
        info!(
            "ReceiveStage: finished ({} total packets)",
            self.stats.frames_received()
        );
        Ok(())
    }
}

impl Drop for ReceiveStage {
    fn drop(&mut self) {
        self.reader.close_output();
    }
}
