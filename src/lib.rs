//! HTTP service that resolves media page URLs to playable streams and relays
//! them to clients with byte-range support.
//!
//! - [`cache`]: fingerprinting plus the positive/negative resolution cache.
//! - [`resolver`]: extraction strategies and the fallback orchestrator.
//! - [`proxy`]: range-aware streaming proxy, request handler and server.

pub mod cache;
pub mod config;
pub mod error;
pub mod proxy;
pub mod proxy_pool;
pub mod resolver;

pub use error::{Error, Result};

use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::cache::ResolutionCache;
use crate::config::Config;
use crate::proxy::{AppState, HttpFetcher, StreamingProxy};
use crate::proxy_pool::ProxyPool;
use crate::resolver::{default_strategies, Orchestrator, YtDlpExtractor};

/// Wires the cache, orchestrator and streaming proxy from configuration.
pub fn build_state(config: &Config) -> reqwest::Result<Arc<AppState>> {
    let cache = Arc::new(ResolutionCache::new(
        config.cache_capacity,
        config.positive_ttl(),
        config.negative_ttl(),
    ));
    let proxies = ProxyPool::new(config.proxies.clone());
    let permits = Arc::new(Semaphore::new(config.max_upstream.max(1)));

    let orchestrator = Orchestrator::new(
        cache,
        Arc::new(YtDlpExtractor::new(&config.ytdlp)),
        default_strategies(),
    )
    .with_credentials(config.cookies.clone())
    .with_proxies(proxies.clone())
    .with_permits(permits.clone());

    let fetcher = HttpFetcher::new(config.connect_timeout(), config.read_timeout(), &proxies)?;
    let proxy = StreamingProxy::new(Arc::new(fetcher))
        .with_permits(permits)
        .with_acquire_timeout(config.read_timeout())
        .with_chunk_size(config.chunk_size);

    Ok(Arc::new(AppState::new(orchestrator, proxy)))
}
