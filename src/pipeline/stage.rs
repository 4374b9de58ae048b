//! Pipeline stage trait
//!
//! Every stage runs in its own task. When `run` returns, for whatever reason,
//! `shutdown` closes the stage's queues so the neighbours notice and wind down.

use async_trait::async_trait;
use log::{error, info};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// Trait for pipeline stages that move frames between queues
#[async_trait]
pub trait PipelineStage: Send {
    /// Run the stage, processing data until its input closes or it fails
    async fn run(&mut self) -> Result<()>;

    /// Get the name of this stage for logging
    fn name(&self) -> &'static str;

    /// Close inputs and outputs and return held frames to their pools
    async fn shutdown(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Spawn `stage` on the runtime.
///
/// A failing stage cancels `session` so stages blocked on sockets or timers
/// stop too.
pub fn spawn_stage<S>(mut stage: S, session: CancellationToken) -> JoinHandle<Result<()>>
where
    S: PipelineStage + 'static,
{
    tokio::spawn(async move {
        let name = stage.name();
        let result = stage.run().await;
        if let Err(e) = &result {
            error!("{} error: {}", name, e);
            session.cancel();
        }
        if let Err(e) = stage.shutdown().await {
            error!("{} shutdown error: {}", name, e);
        }
        info!("{}: stopped", name);
        result
    })
}
