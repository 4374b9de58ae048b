//! Error taxonomy of a receiving session.
//!
//! Every fatal condition ends the session; nothing here is retried.

use std::time::Duration;
use thiserror::Error;

/// Failure reported by the external video codec.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to open decoder: {0}")]
    Open(String),

    #[error("failed to send packet: {0}")]
    SendPacket(String),

    #[error("failed to receive frame: {0}")]
    ReceiveFrame(String),
}

/// Which part of the handshake ran out of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakePhase {
    Discovery,
    Connect,
}

impl std::fmt::Display for HandshakePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandshakePhase::Discovery => write!(f, "discovery"),
            HandshakePhase::Connect => write!(f, "connect"),
        }
    }
}

/// Terminal error of a receiving session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Connect, read, write or socket bind failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The sender closed the stream.
    #[error("stream closed by sender")]
    StreamClosed,

    /// Discovery or connect attempt budget exhausted.
    #[error("{phase} timeout after {after:?}")]
    Timeout { phase: HandshakePhase, after: Duration },

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The render sink refused a frame.
    #[error("render sink error: {0}")]
    Sink(String),

    /// A stage task panicked or was aborted.
    #[error("stage {0} terminated abnormally")]
    StageAborted(&'static str),
}

pub type Result<T> = std::result::Result<T, SessionError>;
