use std::time::Duration;

// connections
pub const CAST_SERVICE_PORT: u16 = 1314;
pub const CAST_BROADCAST_PORT: u16 = 1413;

/// Payload the sender broadcasts to advertise itself.
pub const DISCOVERY_MAGIC: &[u8; 4] = b"1314";
/// Liveness byte written to the sender for the whole session.
pub const KEEPALIVE_BYTE: u8 = b'a';

pub const DISCOVERY_TICKS: u32 = 25;
pub const CONNECT_TICKS: u32 = 10;
pub const TICK_INTERVAL: Duration = Duration::from_millis(2000);
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_millis(2000);

/// How long a stage blocks on a queue or pool before rechecking shutdown.
pub const QUEUE_TIMEOUT: Duration = Duration::from_millis(2000);

// pools
pub const NET_FRAME_POOL_CAPACITY: usize = 20;
pub const PAINT_FRAME_POOL_CAPACITY: usize = 20;
