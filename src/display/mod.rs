//! Render sinks
//!
//! The last pipeline stage hands every decoded image to a [`RenderSink`],
//! synchronously, and the image's paint frame returns to its pool as soon as
//! `paint` comes back.

mod fps;
pub mod yuv;

#[cfg(feature = "ffmpeg")]
mod dump;

#[cfg(feature = "ffmpeg")]
pub use dump::YuvDumpSink;
pub use fps::FpsCounter;

/// Consumer of decoded images.
pub trait RenderSink<I>: Send {
    /// Present `image` with its timestamp. `None` asks the sink to redraw
    /// whatever it showed last (e.g. after a resize).
    fn paint(&mut self, image: Option<&I>, pts: i64) -> anyhow::Result<()>;
}

impl<I, S: RenderSink<I> + ?Sized> RenderSink<I> for Box<S> {
    fn paint(&mut self, image: Option<&I>, pts: i64) -> anyhow::Result<()> {
        (**self).paint(image, pts)
    }
}

/// Sink that drops every image.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl<I> RenderSink<I> for NullSink {
    fn paint(&mut self, _image: Option<&I>, _pts: i64) -> anyhow::Result<()> {
        Ok(())
    }
}
