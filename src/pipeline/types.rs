//! Core types for the pipeline system

use bytes::BytesMut;

/// PTS carried by packets that hold codec configuration only (no image).
pub const CONFIG_PTS: i64 = -1;

/// Encoded packet as read from the wire.
///
/// Lives in the net frame pool and is filled in place by the frame reader,
/// so the payload allocation is reused from one packet to the next.
#[derive(Debug, Default)]
pub struct NetFrame {
    /// Presentation timestamp in microseconds, `CONFIG_PTS` for config-only packets
    pub pts: i64,
    /// Encoded bitstream bytes
    pub payload: BytesMut,
}

impl NetFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_config_only(&self) -> bool {
        self.pts == CONFIG_PTS
    }

    /// Size the payload to exactly `size` bytes for the next body read.
    ///
    /// Keeps the existing allocation when it is large enough.
    pub fn prepare_payload(&mut self, size: usize) {
        self.payload.clear();
        self.payload.resize(size, 0);
    }
}

/// Decoded image waiting to be presented.
///
/// `image` is `None` while the frame sits in the paint pool.
#[derive(Debug)]
pub struct PaintFrame<I> {
    pub pts: i64,
    pub image: Option<I>,
}

impl<I> Default for PaintFrame<I> {
    fn default() -> Self {
        Self {
            pts: 0,
            image: None,
        }
    }
}

impl<I> PaintFrame<I> {
    pub fn new() -> Self {
        Self::default()
    }
}
