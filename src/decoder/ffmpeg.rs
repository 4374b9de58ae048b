use ac_ffmpeg::codec::Decoder;
use ac_ffmpeg::codec::video::{VideoDecoder, VideoFrame};
use ac_ffmpeg::packet::PacketMut;
use ac_ffmpeg::time::{TimeBase, Timestamp};

use super::{Codec, CodecError, Decoded};

/// Stream timestamps are microseconds.
#[inline]
fn micros() -> TimeBase {
    TimeBase::new(1, 1_000_000)
}

/// H.264 video decoder using FFmpeg.
///
/// Packets arrive as Annex B access units. Config-only packets (SPS/PPS) are
/// merged with the following picture upstream. Each packet is stamped with
/// its stream pts so pictures keep their own timestamp even when the decoder
/// holds some back.
pub struct FfmpegCodec {
    decoder: VideoDecoder,
    last_pts: i64,
}

// The decoder context is only ever driven from the decode stage task.
unsafe impl Send for FfmpegCodec {}

impl FfmpegCodec {
    /// Create a new H.264 decoder.
    pub fn open() -> Result<Self, CodecError> {
        let decoder = VideoDecoder::builder("h264")
            .and_then(|builder| builder.time_base(micros()).build())
            .map_err(|e| CodecError::Open(e.to_string()))?;

        Ok(Self {
            decoder,
            last_pts: 0,
        })
    }
}

impl Codec for FfmpegCodec {
    type Image = VideoFrame;

    fn send_packet(&mut self, packet: &[u8], pts: i64) -> Result<(), CodecError> {
        self.last_pts = pts;
        let packet = PacketMut::from(packet)
            .with_pts(Timestamp::new(pts, micros()))
            .freeze();

        self.decoder
            .try_push(packet)
            .map_err(|e| CodecError::SendPacket(format!("packet pts {}: {}", pts, e)))
    }

    fn receive_frame(&mut self) -> Result<Option<Decoded<VideoFrame>>, CodecError> {
        let frame = self
            .decoder
            .take()
            .map_err(|e| CodecError::ReceiveFrame(e.to_string()))?;

        Ok(frame.map(|image| {
            let pts = image.pts();
            let pts = if pts.is_null() {
                // decoder lost the stamp, fall back to the newest packet
                self.last_pts
            } else {
                pts.with_time_base(micros()).timestamp()
            };
            Decoded { pts, image }
        }))
    }
}
