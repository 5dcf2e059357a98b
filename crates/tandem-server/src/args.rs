//! Command-line and environment configuration.
//!
//! Every flag falls back to a `TANDEM_*` environment variable, then to the
//! engine default. There is no configuration file.

use std::{net::SocketAddr, time::Duration};

use clap::{Parser, ValueEnum};
use tandem_core::{EngineConfig, rate_limiter::RateLimitConfig, reaper::ReaperConfig};

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human readable lines
    Plain,
    /// One JSON object per event
    Json,
}

/// Anonymous one-on-one chat server
#[derive(Parser, Debug, Clone)]
#[command(name = "tandem-server")]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Listen address for client connections
    #[arg(short, long, env = "TANDEM_LISTEN_ADDR", default_value = "0.0.0.0:4000")]
    pub listen_addr: SocketAddr,

    /// Seconds without activity before a conversation is ended
    #[arg(long, env = "TANDEM_IDLE_TIMEOUT", default_value_t = 60)]
    pub idle_timeout: u64,

    /// Seconds between idle conversation sweeps
    #[arg(long, env = "TANDEM_REAPER_INTERVAL", default_value_t = 10)]
    pub reaper_interval: u64,

    /// Messages a connection may send per window
    #[arg(long, env = "TANDEM_MESSAGE_LIMIT", default_value_t = 10)]
    pub message_limit: u32,

    /// Message rate window in seconds
    #[arg(long, env = "TANDEM_MESSAGE_WINDOW", default_value_t = 10)]
    pub message_window: u64,

    /// Connections an address may open per window
    #[arg(long, env = "TANDEM_CONNECT_LIMIT", default_value_t = 30)]
    pub connect_limit: u32,

    /// Connect rate window in seconds
    #[arg(long, env = "TANDEM_CONNECT_WINDOW", default_value_t = 60)]
    pub connect_window: u64,

    /// Seconds an address stays blocked after exceeding the connect limit
    #[arg(long, env = "TANDEM_CONNECT_BLOCK", default_value_t = 300)]
    pub connect_block: u64,

    /// Seconds between `user-stats` broadcasts
    #[arg(long, env = "TANDEM_STATS_INTERVAL", default_value_t = 10)]
    pub stats_interval: u64,

    /// Seconds between re-match sweeps over the waiting queue
    #[arg(long, env = "TANDEM_REMATCH_INTERVAL", default_value_t = 5)]
    pub rematch_interval: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "TANDEM_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log format
    #[arg(long, env = "TANDEM_LOG_FORMAT", value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,
}

impl Args {
    /// Engine timers and limits selected by the flags
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            reaper: ReaperConfig {
                idle_timeout: Duration::from_secs(self.idle_timeout),
                poll_interval: Duration::from_secs(self.reaper_interval),
            },
            message_rate: RateLimitConfig {
                max_requests: self.message_limit,
                window: Duration::from_secs(self.message_window),
                block_for: None,
            },
            stats_interval: Duration::from_secs(self.stats_interval),
            rematch_interval: Duration::from_secs(self.rematch_interval),
            ..EngineConfig::default()
        }
    }

    /// Per-address connect limit applied on accept
    #[must_use]
    pub fn connect_rate(&self) -> RateLimitConfig {
        RateLimitConfig {
            max_requests: self.connect_limit,
            window: Duration::from_secs(self.connect_window),
            block_for: Some(Duration::from_secs(self.connect_block)),
        }
    }
}
