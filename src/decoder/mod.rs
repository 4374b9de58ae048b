//! Video decoding
//!
//! The pipeline talks to the codec only through [`Codec`]; the FFmpeg backed
//! H.264 implementation is compiled with the `ffmpeg` feature.

#[cfg(feature = "ffmpeg")]
mod ffmpeg;

pub use crate::error::CodecError;
#[cfg(feature = "ffmpeg")]
pub use ffmpeg::FfmpegCodec;

/// Image produced by a [`Codec`] with the timestamp of the packet it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded<I> {
    pub pts: i64,
    pub image: I,
}

/// Packet in, image out.
///
/// A codec may hold packets back before producing images, so each image
/// carries the pts it was submitted with rather than that of the last packet.
///
/// Opening happens in the implementor's constructor and closing in its `Drop`.
pub trait Codec: Send + 'static {
    /// Decoded image handle handed to the render sink.
    type Image: Send + 'static;

    /// Submit one unit of encoded bitstream stamped with `pts` (µs).
    fn send_packet(&mut self, packet: &[u8], pts: i64) -> Result<(), CodecError>;

    /// Fetch the next decoded image; `Ok(None)` means the codec needs more input.
    fn receive_frame(&mut self) -> Result<Option<Decoded<Self::Image>>, CodecError>;
}
