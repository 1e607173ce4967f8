use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::cache::{DEFAULT_NEGATIVE_TTL, DEFAULT_POSITIVE_CAPACITY, DEFAULT_POSITIVE_TTL};
use crate::proxy::{CHUNK_SIZE, DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT};
use crate::resolver::DEFAULT_MAX_UPSTREAM;

/// Resolve media page URLs to playable streams and proxy them with Range support.
#[derive(Debug, Clone, Parser)]
#[command(name = "video_resolve_proxy", version, about)]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "VRP_LISTEN", default_value = "127.0.0.1:3000")]
    pub listen: SocketAddr,

    /// Seconds a resolved stream stays cached
    #[arg(long, env = "VRP_POSITIVE_TTL_SECS", default_value_t = DEFAULT_POSITIVE_TTL.as_secs())]
    pub positive_ttl_secs: u64,

    /// Seconds a failed source is refused before being retried
    #[arg(long, env = "VRP_NEGATIVE_TTL_SECS", default_value_t = DEFAULT_NEGATIVE_TTL.as_secs())]
    pub negative_ttl_secs: u64,

    /// Maximum number of resolved streams kept in memory
    #[arg(long, env = "VRP_CACHE_CAPACITY", default_value_t = DEFAULT_POSITIVE_CAPACITY)]
    pub cache_capacity: usize,

    /// Seconds between sweeps of expired cache entries (0 disables)
    #[arg(long, env = "VRP_SWEEP_INTERVAL_SECS", default_value_t = 60)]
    pub sweep_interval_secs: u64,

    /// Concurrent extractions plus open upstream streams
    #[arg(long, env = "VRP_MAX_UPSTREAM", default_value_t = DEFAULT_MAX_UPSTREAM)]
    pub max_upstream: usize,

    /// Upstream connect timeout in seconds
    #[arg(long, env = "VRP_CONNECT_TIMEOUT_SECS", default_value_t = DEFAULT_CONNECT_TIMEOUT.as_secs())]
    pub connect_timeout_secs: u64,

    /// Upstream read timeout in seconds
    #[arg(long, env = "VRP_READ_TIMEOUT_SECS", default_value_t = DEFAULT_READ_TIMEOUT.as_secs())]
    pub read_timeout_secs: u64,

    /// Largest chunk relayed to clients, in bytes
    #[arg(long, env = "VRP_CHUNK_SIZE", default_value_t = CHUNK_SIZE)]
    pub chunk_size: usize,

    /// Path to the yt-dlp binary
    #[arg(long, env = "VRP_YTDLP", default_value = "yt-dlp")]
    pub ytdlp: PathBuf,

    /// Netscape cookies file used to retry access-restricted sources
    #[arg(long, env = "VRP_COOKIES")]
    pub cookies: Option<PathBuf>,

    /// Outbound proxy URLs (comma separated); one is picked per upstream call
    #[arg(long = "proxy", env = "VRP_PROXIES", value_delimiter = ',')]
    pub proxies: Vec<String>,
}

impl Config {
    pub fn positive_ttl(&self) -> Duration {
        Duration::from_secs(self.positive_ttl_secs)
    }

    pub fn negative_ttl(&self) -> Duration {
        Duration::from_secs(self.negative_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_secs > 0).then(|| Duration::from_secs(self.sweep_interval_secs))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}
