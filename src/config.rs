use crate::assets::{
    CAST_BROADCAST_PORT, CAST_SERVICE_PORT, CONNECT_TICKS, DISCOVERY_TICKS, KEEPALIVE_INTERVAL,
    NET_FRAME_POOL_CAPACITY, PAINT_FRAME_POOL_CAPACITY, QUEUE_TIMEOUT, TICK_INTERVAL,
};
use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use std::ffi::OsString;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;

/// Session configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Direct sender address instead of waiting for its broadcast.
    pub ip: Option<Ipv4Addr>,
    /// Sender stream port.
    pub port: u16,
    /// Local port the stream socket binds to, 0 for an ephemeral one.
    pub local_port: u16,
    /// Port the sender broadcasts its presence on.
    pub broadcast_port: u16,
    /// Paint frames as soon as they are decoded instead of following PTS.
    pub immediately_paint: bool,
    pub debug_net: bool,
    pub debug_pts: bool,
    pub debug_decode: bool,
    /// Write decoded frames as raw YUV420p to this file.
    pub dump: Option<PathBuf>,

    pub discovery_ticks: u32,
    pub connect_ticks: u32,
    pub tick_interval: Duration,
    pub keepalive_interval: Duration,
    pub queue_timeout: Duration,
    pub net_pool_capacity: usize,
    pub paint_pool_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ip: None,
            port: CAST_SERVICE_PORT,
            local_port: CAST_SERVICE_PORT,
            broadcast_port: CAST_BROADCAST_PORT,
            immediately_paint: false,
            debug_net: false,
            debug_pts: false,
            debug_decode: false,
            dump: None,
            discovery_ticks: DISCOVERY_TICKS,
            connect_ticks: CONNECT_TICKS,
            tick_interval: TICK_INTERVAL,
            keepalive_interval: KEEPALIVE_INTERVAL,
            queue_timeout: QUEUE_TIMEOUT,
            net_pool_capacity: NET_FRAME_POOL_CAPACITY,
            paint_pool_capacity: PAINT_FRAME_POOL_CAPACITY,
        }
    }
}

impl Config {
    /// Parse the command line. `args` includes the program name.
    pub fn from_args<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = command().try_get_matches_from(args)?;
        Ok(Self::from_matches(&matches))
    }

    fn from_matches(matches: &ArgMatches) -> Self {
        let defaults = Config::default();
        let port = matches
            .get_one::<u16>("port")
            .copied()
            .unwrap_or(defaults.port);

        Self {
            ip: matches.get_one::<Ipv4Addr>("ip").copied(),
            port,
            // bind to the stream port unless told otherwise
            local_port: matches.get_one::<u16>("local-port").copied().unwrap_or(port),
            broadcast_port: matches
                .get_one::<u16>("broadcast-port")
                .copied()
                .unwrap_or(defaults.broadcast_port),
            immediately_paint: matches.get_flag("immediately-paint"),
            debug_net: matches.get_flag("debug-net"),
            debug_pts: matches.get_flag("debug-pts"),
            debug_decode: matches.get_flag("debug-decode"),
            dump: matches.get_one::<PathBuf>("dump").cloned(),
            ..defaults
        }
    }

    /// One line per setting, for the start-up log.
    pub fn describe(&self) -> String {
        format!(
            "current config:\n- ip: {}\n- port: {}\n- local port: {}\n- broadcast port: {}\n- immediately paint: {}\n- dump: {}",
            self.ip
                .map(|ip| ip.to_string())
                .unwrap_or_else(|| "empty".into()),
            self.port,
            self.local_port,
            self.broadcast_port,
            self.immediately_paint,
            self.dump
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "none".into()),
        )
    }
}

pub fn command() -> Command {
    Command::new(app_name())
        .version(version())
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .arg(
            Arg::new("ip")
                .long("ip")
                .value_name("ADDR")
                .help("Direct sender ip address, e.g. --ip 192.168.1.1 (skips broadcast discovery).")
                .value_parser(value_parser!(Ipv4Addr)),
        )
        .arg(
            Arg::new("port")
                .long("port")
                .value_name("PORT")
                .help("Connect port.")
                .value_parser(value_parser!(u16)),
        )
        .arg(
            Arg::new("local-port")
                .long("local-port")
                .value_name("PORT")
                .help("Local port the stream socket binds to (defaults to the connect port, 0 = any).")
                .value_parser(value_parser!(u16)),
        )
        .arg(
            Arg::new("broadcast-port")
                .long("broadcast-port")
                .value_name("PORT")
                .help("Broadcast discovery port.")
                .value_parser(value_parser!(u16)),
        )
        .arg(
            Arg::new("immediately-paint")
                .long("immediately-paint")
                .help("Paint frames as soon as they are decoded, ignoring pts.")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("debug-net")
                .long("debug-net")
                .help("Print net info to log.")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("debug-pts")
                .long("debug-pts")
                .help("Print pts info to log.")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("debug-decode")
                .long("debug-decode")
                .help("Print decode info to log.")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("dump")
                .long("dump")
                .value_name("FILE")
                .help("Write decoded frames to FILE as raw yuv420p.")
                .value_parser(value_parser!(PathBuf)),
        )
}

/// Returns a version as specified in Cargo.toml
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub fn app_name() -> &'static str {
    env!("CARGO_PKG_NAME")
}
