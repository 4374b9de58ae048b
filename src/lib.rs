//! Receiving end of a screen stream.
//!
//! Finds the sender by its UDP broadcast (or dials a known address), reads
//! length-prefixed H.264 packets over TCP, decodes them and paints the
//! pictures on the sender's timeline. Start with
//! [`ReceiverCoordinator::launch`](pipeline::receiver::ReceiverCoordinator::launch).

pub mod assets;
pub mod config;
pub mod decoder;
pub mod display;
pub mod error;
pub mod net;
pub mod pipeline;

pub use config::Config;
pub use error::{CodecError, SessionError};
pub use pipeline::receiver::{ReceiverCoordinator, SessionCloser};
