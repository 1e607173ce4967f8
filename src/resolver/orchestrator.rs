use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

use super::extractor::{ExtractionError, ExtractionErrorKind, ExtractionParams, Extractor};
use super::model::{MediaKind, QualityTier, ResolvedDescriptor};
use super::strategy::ExtractionStrategy;
use crate::cache::{fingerprint, ResolutionCache};
use crate::error::{Error, Result};
use crate::proxy_pool::ProxyPool;

pub const DEFAULT_MAX_UPSTREAM: usize = 64;

/// Drives the extractor through an ordered strategy list, fronted by the
/// resolution cache.
pub struct Orchestrator {
    cache: Arc<ResolutionCache>,
    extractor: Arc<dyn Extractor>,
    strategies: Vec<ExtractionStrategy>,
    credentials: Option<PathBuf>,
    proxies: ProxyPool,
    permits: Arc<Semaphore>,
}

impl Orchestrator {
    pub fn new(
        cache: Arc<ResolutionCache>,
        extractor: Arc<dyn Extractor>,
        strategies: Vec<ExtractionStrategy>,
    ) -> Self {
        Self {
            cache,
            extractor,
            strategies,
            credentials: None,
            proxies: ProxyPool::default(),
            permits: Arc::new(Semaphore::new(DEFAULT_MAX_UPSTREAM)),
        }
    }

    /// Cookies file used for one retry after an access-restricted failure.
    pub fn with_credentials(mut self, cookies_file: Option<PathBuf>) -> Self {
        self.credentials = cookies_file;
        self
    }

    pub fn with_proxies(mut self, proxies: ProxyPool) -> Self {
        self.proxies = proxies;
        self
    }

    /// Shares the permit pool that caps concurrent upstream work.
    pub fn with_permits(mut self, permits: Arc<Semaphore>) -> Self {
        self.permits = permits;
        self
    }

    pub fn cache(&self) -> &Arc<ResolutionCache> {
        &self.cache
    }

    pub fn strategies(&self) -> &[ExtractionStrategy] {
        &self.strategies
    }

    pub async fn resolve(
        &self,
        source_url: &str,
        kind: MediaKind,
        quality: QualityTier,
    ) -> Result<Arc<ResolvedDescriptor>> {
        let key = fingerprint(source_url, quality, kind);
        if let Some(descriptor) = self.cache.get_positive(&key) {
            debug!(url = source_url, %kind, %quality, "resolution cache hit");
            return Ok(descriptor);
        }

        if self.cache.is_negatively_marked(source_url) {
            info!(url = source_url, "source failed recently, not retrying");
            return Err(Error::RecentlyFailed {
                url: source_url.to_string(),
            });
        }

        let mut last_error = None;
        for strategy in &self.strategies {
            let params = ExtractionParams {
                strategy: strategy.clone(),
                kind,
                format: strategy.format_selector(kind, quality),
                cookies_file: None,
                proxy: self.proxies.pick().map(str::to_string),
            };

            let err = match self.attempt(source_url, &params).await {
                Ok(descriptor) => return Ok(self.store(key, descriptor)),
                Err(err) => err,
            };

            let err = match (&self.credentials, err.kind.is_access_restricted()) {
                (Some(cookies), true) => {
                    let params = ExtractionParams {
                        cookies_file: Some(cookies.clone()),
                        ..params
                    };
                    match self.attempt(source_url, &params).await {
                        Ok(descriptor) => return Ok(self.store(key, descriptor)),
                        Err(retry_err) => retry_err,
                    }
                }
                _ => err,
            };
            last_error = Some(err);
        }

        self.cache.mark_negative(source_url);
        let source = last_error.unwrap_or_else(|| {
            ExtractionError::new(
                ExtractionErrorKind::Transient,
                "no extraction strategies configured",
            )
        });
        warn!(url = source_url, error = %source, "all extraction strategies failed");

        let url = source_url.to_string();
        Err(match source.kind {
            ExtractionErrorKind::AuthRequired => Error::AuthRequired { url, source },
            _ => Error::ResolutionFailed { url, source },
        })
    }

    /// One strategy attempt under its own timeout, which also bounds the wait
    /// for an upstream permit. A timeout or an empty stream location counts as
    /// a failed attempt.
    async fn attempt(
        &self,
        source_url: &str,
        params: &ExtractionParams,
    ) -> std::result::Result<ResolvedDescriptor, ExtractionError> {
        let started = Instant::now();
        let run = async {
            let _permit = self.permits.acquire().await.map_err(|_| {
                ExtractionError::new(ExtractionErrorKind::Transient, "upstream permits closed")
            })?;
            self.extractor.extract(source_url, params).await
        };

        let result = match timeout(params.timeout(), run).await {
            Ok(Ok(mut descriptor)) if descriptor.is_playable() => {
                descriptor.proxy = params.proxy.clone();
                Ok(descriptor)
            }
            Ok(Ok(_)) => Err(ExtractionError::new(
                ExtractionErrorKind::NotFound,
                "extractor returned an empty stream location",
            )),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(ExtractionError::new(
                ExtractionErrorKind::Transient,
                format!("timed out after {:?}", params.timeout()),
            )),
        };

        let elapsed = started.elapsed();
        match &result {
            Ok(_) => info!(
                extractor = self.extractor.name(),
                url = source_url,
                strategy = %params.strategy.name,
                authenticated = params.is_authenticated(),
                ?elapsed,
                "extraction succeeded"
            ),
            Err(err) => warn!(
                extractor = self.extractor.name(),
                url = source_url,
                strategy = %params.strategy.name,
                authenticated = params.is_authenticated(),
                ?elapsed,
                error = %err,
                "extraction attempt failed"
            ),
        }
        result
    }

    fn store(&self, key: String, descriptor: ResolvedDescriptor) -> Arc<ResolvedDescriptor> {
        let descriptor = Arc::new(descriptor);
        self.cache.put_positive(key, descriptor.clone());
        descriptor
    }
}
