//! Session establishment: sender discovery, stream connect and keepalive.

mod connector;
mod discovery;

pub use connector::{Connector, keepalive};
pub use discovery::{Discovery, is_advertisement};
