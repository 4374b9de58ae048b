//! Stream framing
//!
//! Each packet on the wire is a 12 byte header followed by its payload:
//!
//! ```text
//! 0       4               12
//! +-------+---------------+----------------+
//! | size  | pts           | payload (size) |
//! | u32BE | i64BE         |                |
//! +-------+---------------+----------------+
//! ```
//!
//! A pts of `-1` marks a packet that only carries codec configuration.
//! Reads go straight into the header array or the pooled frame's payload,
//! however the transport chunks the bytes.

use log::info;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{Result, SessionError};
use crate::pipeline::{
    FramePool, NetFrame, NetFrameQueue, PopError, Pooled, SessionStats,
};

pub const HEADER_LEN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub size: u32,
    pub pts: i64,
}

impl FrameHeader {
    pub fn parse(bytes: &[u8; HEADER_LEN]) -> Self {
        let mut size = [0u8; 4];
        let mut pts = [0u8; 8];
        size.copy_from_slice(&bytes[..4]);
        pts.copy_from_slice(&bytes[4..]);
        Self {
            size: u32::from_be_bytes(size),
            pts: i64::from_be_bytes(pts),
        }
    }

    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[..4].copy_from_slice(&self.size.to_be_bytes());
        out[4..].copy_from_slice(&self.pts.to_be_bytes());
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadState {
    Head,
    Body,
}

/// Reassembles packets from a byte stream into pooled [`NetFrame`]s.
pub struct FrameReader {
    pool: FramePool<NetFrame>,
    output: Arc<NetFrameQueue>,
    stats: Arc<SessionStats>,
    queue_timeout: Duration,
    debug: bool,

    state: ReadState,
    header: [u8; HEADER_LEN],
    filled: usize,
    current: Option<Pooled<NetFrame>>,
}

impl FrameReader {
    pub fn new(
        pool: FramePool<NetFrame>,
        output: Arc<NetFrameQueue>,
        stats: Arc<SessionStats>,
        queue_timeout: Duration,
        debug: bool,
    ) -> Self {
        Self {
            pool,
            output,
            stats,
            queue_timeout,
            debug,
            state: ReadState::Head,
            header: [0u8; HEADER_LEN],
            filled: 0,
            current: None,
        }
    }

    /// Read packets until the stream ends or the pipeline shuts down.
    ///
    /// End of stream is `StreamClosed`. A closed pool or output queue ends
    /// the read with `Ok`.
    pub async fn run<R>(&mut self, reader: &mut R) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        loop {
            if self.current.is_none() {
                match self.acquire().await {
                    Some(frame) => self.current = Some(frame),
                    None => return Ok(()),
                }
            }

            let n = {
                let buf = self.read_buf();
                if buf.is_empty() {
                    0
                } else {
                    let n = reader.read(buf).await?;
                    if n == 0 {
                        info!("FrameReader: stream closed by sender");
                        return Err(SessionError::StreamClosed);
                    }
                    n
                }
            };

            if !self.advance(n) {
                return Ok(());
            }
        }
    }

    /// Give back the partially filled frame, if any.
    pub fn release(&mut self) {
        self.current = None;
        self.state = ReadState::Head;
        self.filled = 0;
    }

    pub fn close_output(&self) {
        self.output.close();
    }

    /// Borrow the next frame to fill, waiting while the pool is exhausted.
    async fn acquire(&self) -> Option<Pooled<NetFrame>> {
        loop {
            match self.pool.borrow(self.queue_timeout).await {
                Ok(frame) => return Some(frame),
                Err(PopError::Closed) => return None,
                Err(PopError::Timeout) => {
                    if self.output.is_closed() {
                        return None;
                    }
                    if self.debug {
                        info!("FrameReader: no free net frame, read paused");
                    }
                }
            }
        }
    }

    fn read_buf(&mut self) -> &mut [u8] {
        match self.state {
            ReadState::Head => &mut self.header[self.filled..],
            ReadState::Body => match self.current.as_mut() {
                Some(frame) => &mut frame.payload[self.filled..],
                None => &mut [],
            },
        }
    }

    /// Account for `n` freshly read bytes. Returns false once the output
    /// queue refuses frames.
    fn advance(&mut self, n: usize) -> bool {
        self.filled += n;
        match self.state {
            ReadState::Head => {
                if self.filled < HEADER_LEN {
                    return true;
                }
                let header = FrameHeader::parse(&self.header);
                if self.debug {
                    info!("read head, size: {}, pts: {}", header.size, header.pts);
                }
                if let Some(frame) = self.current.as_mut() {
                    frame.pts = header.pts;
                    frame.prepare_payload(header.size as usize);
                }
                self.state = ReadState::Body;
                self.filled = 0;
                if header.size == 0 {
                    return self.complete();
                }
                true
            }
            ReadState::Body => {
                let expected = self.current.as_ref().map_or(0, |f| f.payload.len());
                if self.filled < expected {
                    return true;
                }
                self.complete()
            }
        }
    }

    fn complete(&mut self) -> bool {
        self.state = ReadState::Head;
        self.filled = 0;
        let Some(frame) = self.current.take() else {
            return true;
        };

        self.stats.record_received(frame.payload.len());
        if self.debug {
            info!("read body, size: {}, pts: {}", frame.payload.len(), frame.pts);
        }
        // a rejected frame drops here and goes back to the pool
        if self.output.push(frame).is_err() {
            info!("FrameReader: decode queue closed");
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::HandoffQueue;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::ReadBuf;

    /// Hands out at most `chunk` bytes per read.
    struct Chunked {
        data: Vec<u8>,
        pos: usize,
        chunk: usize,
    }

    impl AsyncRead for Chunked {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            let end = (self.pos + self.chunk)
                .min(self.data.len())
                .min(self.pos + buf.remaining());
            let start = self.pos;
            buf.put_slice(&self.data[start..end]);
            self.pos = end;
            Poll::Ready(Ok(()))
        }
    }

    fn packet(pts: i64, payload: &[u8]) -> Vec<u8> {
        let header = FrameHeader {
            size: payload.len() as u32,
            pts,
        };
        let mut out = header.encode().to_vec();
        out.extend_from_slice(payload);
        out
    }

    fn reader(capacity: usize) -> (FrameReader, FramePool<NetFrame>, Arc<NetFrameQueue>) {
        let pool = FramePool::new(capacity, NetFrame::new);
        let queue = Arc::new(HandoffQueue::new());
        let reader = FrameReader::new(
            pool.clone(),
            queue.clone(),
            Arc::new(SessionStats::new()),
            Duration::from_millis(100),
            false,
        );
        (reader, pool, queue)
    }

    #[test]
    fn test_header_layout() {
        let bytes = [0, 0, 0, 6, 0, 0, 0, 0, 0, 0, 0, 100];
        let header = FrameHeader::parse(&bytes);
        assert_eq!(header, FrameHeader { size: 6, pts: 100 });
        assert_eq!(header.encode(), bytes);

        let config = FrameHeader::parse(&[0, 0, 0, 1, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]);
        assert_eq!(config.pts, -1);
    }

    #[tokio::test]
    async fn test_reassembles_any_chunking() {
        let mut stream = packet(-1, b"SPSPPS");
        stream.extend(packet(100, b"ABCDEF"));
        stream.extend(packet(200, b""));
        stream.extend(packet(300, &[7u8; 300]));

        for chunk in 1..=stream.len() {
            let (mut frame_reader, pool, queue) = reader(8);
            let mut input = Chunked {
                data: stream.clone(),
                pos: 0,
                chunk,
            };

            let result = frame_reader.run(&mut input).await;
            assert!(matches!(result, Err(SessionError::StreamClosed)), "chunk {chunk}");

            let timeout = Duration::from_millis(10);
            let frames = [
                queue.pop(timeout).await.unwrap(),
                queue.pop(timeout).await.unwrap(),
                queue.pop(timeout).await.unwrap(),
                queue.pop(timeout).await.unwrap(),
            ];
            assert!(queue.is_empty());
            assert_eq!((frames[0].pts, &frames[0].payload[..]), (-1, &b"SPSPPS"[..]));
            assert_eq!((frames[1].pts, &frames[1].payload[..]), (100, &b"ABCDEF"[..]));
            assert_eq!((frames[2].pts, frames[2].payload.len()), (200, 0));
            assert_eq!(frames[3].payload.len(), 300);

            drop(frames);
            frame_reader.release();
            assert_eq!(pool.free_count(), 8);
        }
    }

    #[tokio::test]
    async fn test_partial_body_stays_pending() {
        let mut stream = FrameHeader {
            size: 1_000_000,
            pts: 5,
        }
        .encode()
        .to_vec();
        stream.extend_from_slice(&[1u8; 10]);

        let (mut frame_reader, pool, queue) = reader(4);
        let mut input = Chunked {
            data: stream,
            pos: 0,
            chunk: 64,
        };
        let result = frame_reader.run(&mut input).await;
        assert!(matches!(result, Err(SessionError::StreamClosed)));
        assert!(queue.is_empty());
        assert_eq!(frame_reader.state, ReadState::Body);
        assert_eq!(frame_reader.filled, 10);
        assert_eq!(pool.in_flight(), 1);

        frame_reader.release();
        assert_eq!(pool.free_count(), 4);
    }

    #[tokio::test]
    async fn test_stops_when_queue_closed() {
        let (mut frame_reader, pool, queue) = reader(4);
        queue.close();
        let mut input = Chunked {
            data: packet(1, b"xyz"),
            pos: 0,
            chunk: 100,
        };
        frame_reader.run(&mut input).await.unwrap();
        assert_eq!(pool.free_count(), 4);
    }

    #[tokio::test]
    async fn test_closed_pool_ends_read() {
        let (mut frame_reader, pool, _queue) = reader(2);
        pool.close();
        let mut input = Chunked {
            data: packet(1, b"xyz"),
            pos: 0,
            chunk: 100,
        };
        frame_reader.run(&mut input).await.unwrap();
    }
}
