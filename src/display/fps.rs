use log::info;
use std::time::{Duration, Instant};

use super::RenderSink;

const REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Wraps a sink and logs the paint rate once per second.
pub struct FpsCounter<S> {
    inner: S,
    window_start: Instant,
    frames: u32,
    last_fps: Option<u32>,
}

impl<S> FpsCounter<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            window_start: Instant::now(),
            frames: 0,
            last_fps: None,
        }
    }

    /// Frames painted during the last completed window
    pub fn last_fps(&self) -> Option<u32> {
        self.last_fps
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    fn tick(&mut self, now: Instant) {
        self.frames += 1;
        if now.duration_since(self.window_start) > REPORT_INTERVAL {
            info!("connected, fps: {}", self.frames);
            self.last_fps = Some(self.frames);
            self.window_start = now;
            self.frames = 0;
        }
    }
}

impl<I, S: RenderSink<I>> RenderSink<I> for FpsCounter<S> {
    fn paint(&mut self, image: Option<&I>, pts: i64) -> anyhow::Result<()> {
        self.inner.paint(image, pts)?;
        // redraws are not new frames
        if image.is_some() {
            self.tick(Instant::now());
        }
        Ok(())
    }
}
