use ac_ffmpeg::codec::video::VideoFrame;
use anyhow::Context;
use log::info;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::RenderSink;
use super::yuv::{Plane, pack_yuv420, yuv420_size};

/// Appends every decoded picture to a file as raw YUV420p.
///
/// Play back with `ffplay -f rawvideo -pixel_format yuv420p -video_size WxH`.
pub struct YuvDumpSink {
    out: BufWriter<File>,
    /// Reusable buffer for packed output to avoid per-frame allocation
    packed_buffer: Vec<u8>,
    /// Cached dimensions for buffer reuse
    cached_dims: Option<(usize, usize)>,
}

impl YuvDumpSink {
    pub fn create(path: &Path) -> anyhow::Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("failed to create dump file {}", path.display()))?;
        info!("YuvDumpSink: writing decoded frames to {}", path.display());
        Ok(Self {
            out: BufWriter::new(file),
            packed_buffer: Vec::new(),
            cached_dims: None,
        })
    }
}

impl RenderSink<VideoFrame> for YuvDumpSink {
    fn paint(&mut self, image: Option<&VideoFrame>, _pts: i64) -> anyhow::Result<()> {
        // nothing on screen to redraw
        let Some(frame) = image else {
            return Ok(());
        };

        let (w, h) = (frame.width(), frame.height());
        let planes = frame.planes();

        if self.cached_dims != Some((w, h)) {
            info!("YuvDumpSink: frame size {}x{}", w, h);
            self.packed_buffer.resize(yuv420_size(w, h), 0);
            self.cached_dims = Some((w, h));
        }

        let plane = |i: usize| Plane {
            data: planes[i].data(),
            stride: planes[i].line_size(),
        };
        pack_yuv420(&mut self.packed_buffer, w, h, [plane(0), plane(1), plane(2)]);

        self.out
            .write_all(&self.packed_buffer)
            .context("failed to write dump file")
    }
}

impl Drop for YuvDumpSink {
    fn drop(&mut self) {
        let _ = self.out.flush();
    }
}
