#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use hyper::StatusCode;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use video_resolve_proxy::cache::ResolutionCache;
use video_resolve_proxy::proxy::{
    ByteStream, ContentRange, FetchError, RangeRequest, UpstreamFetcher, UpstreamResponse,
};
use video_resolve_proxy::resolver::{
    ExtractionError, ExtractionErrorKind, ExtractionParams, ExtractionStrategy, Extractor,
    Orchestrator, ResolvedDescriptor,
};

pub fn descriptor(name: &str, size: Option<u64>) -> ResolvedDescriptor {
    ResolvedDescriptor {
        stream_url: format!("https://cdn.example.com/{name}.mp4"),
        title: format!("Title of {name}"),
        duration_seconds: 120,
        content_type: "video/mp4".to_string(),
        size_bytes: size,
        http_headers: BTreeMap::new(),
        formats: Vec::new(),
        proxy: None,
    }
}

pub fn strategies(names: &[&str]) -> Vec<ExtractionStrategy> {
    names
        .iter()
        .map(|name| ExtractionStrategy::new(*name).with_timeout(Duration::from_secs(5)))
        .collect()
}

#[derive(Clone)]
pub enum Outcome {
    Succeed(ResolvedDescriptor),
    Fail(ExtractionErrorKind),
    /// Never completes; only a timeout ends the attempt.
    Hang,
    /// Fails with the given kind until retried with credentials.
    NeedsCredentials(ExtractionErrorKind, ResolvedDescriptor),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub strategy: String,
    pub url: String,
    pub authenticated: bool,
    pub proxy: Option<String>,
}

/// Scripted extractor: the outcome is chosen by strategy name.
#[derive(Default)]
pub struct StubExtractor {
    outcomes: Mutex<HashMap<String, Outcome>>,
    calls: Mutex<Vec<Call>>,
}

impl StubExtractor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn on(&self, strategy: &str, outcome: Outcome) {
        self.outcomes
            .lock()
            .unwrap()
            .insert(strategy.to_string(), outcome);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn strategies_called(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.strategy).collect()
    }
}

#[async_trait]
impl Extractor for StubExtractor {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn extract(
        &self,
        source_url: &str,
        params: &ExtractionParams,
    ) -> Result<ResolvedDescriptor, ExtractionError> {
        self.calls.lock().unwrap().push(Call {
            strategy: params.strategy.name.clone(),
            url: source_url.to_string(),
            authenticated: params.is_authenticated(),
            proxy: params.proxy.clone(),
        });
        let outcome = self
            .outcomes
            .lock()
            .unwrap()
            .get(&params.strategy.name)
            .cloned()
            .unwrap_or(Outcome::Fail(ExtractionErrorKind::Transient));

        match outcome {
            Outcome::Succeed(d) => Ok(d),
            Outcome::Fail(kind) => Err(ExtractionError::new(kind, "scripted failure")),
            Outcome::Hang => {
                futures::future::pending::<()>().await;
                unreachable!()
            }
            Outcome::NeedsCredentials(_, d) if params.is_authenticated() => Ok(d),
            Outcome::NeedsCredentials(kind, _) => {
                Err(ExtractionError::new(kind, "sign in required"))
            }
        }
    }
}

pub fn orchestrator(extractor: Arc<StubExtractor>, names: &[&str]) -> Orchestrator {
    Orchestrator::new(Arc::new(ResolutionCache::default()), extractor, strategies(names))
}

/// Upstream refusal served instead of the resource.
#[derive(Clone, Copy)]
pub enum Reject {
    Status(StatusCode),
    Timeout,
}

/// Serves an in-memory resource, optionally ignoring Range like some CDNs do.
pub struct MemoryFetcher {
    pub data: Bytes,
    pub honor_range: bool,
    pub report_total: bool,
    pub fail_after_chunks: Option<usize>,
    pub reject: Option<Reject>,
    pub chunk: usize,
    pub calls: AtomicUsize,
    pub last_range: Mutex<Option<RangeRequest>>,
    pub last_proxy: Mutex<Option<String>>,
}

impl MemoryFetcher {
    pub fn new(len: usize) -> Self {
        Self {
            data: Bytes::from(pattern(len)),
            honor_range: true,
            report_total: true,
            fail_after_chunks: None,
            reject: None,
            chunk: 64,
            calls: AtomicUsize::new(0),
            last_range: Mutex::new(None),
            last_proxy: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn body(&self, bytes: Bytes) -> ByteStream {
        let chunks: Vec<Bytes> = bytes
            .chunks(self.chunk)
            .map(Bytes::copy_from_slice)
            .collect();
        let fail_after = self.fail_after_chunks;
        stream::iter(chunks.into_iter().enumerate().map(move |(i, c)| {
            match fail_after {
                Some(n) if i >= n => Err(FetchError::Body("connection reset".into())),
                _ => Ok(c),
            }
        }))
        .boxed()
    }
}

#[async_trait]
impl UpstreamFetcher for MemoryFetcher {
    async fn fetch(
        &self,
        descriptor: &ResolvedDescriptor,
        range: Option<RangeRequest>,
    ) -> Result<UpstreamResponse, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_range.lock().unwrap() = range;
        *self.last_proxy.lock().unwrap() = descriptor.proxy.clone();
        match self.reject {
            Some(Reject::Status(status)) => return Err(FetchError::Status(status)),
            Some(Reject::Timeout) => return Err(FetchError::Timeout),
            None => {}
        }
        let len = self.data.len() as u64;

        match range.filter(|_| self.honor_range) {
            Some(r) => {
                let end = r.end.unwrap_or(len - 1).min(len - 1);
                let slice = self.data.slice(r.start as usize..=end as usize);
                Ok(UpstreamResponse {
                    status: StatusCode::PARTIAL_CONTENT,
                    content_type: Some("video/mp4".into()),
                    content_length: Some(slice.len() as u64),
                    content_range: Some(ContentRange {
                        start: r.start,
                        end,
                        total: self.report_total.then_some(len),
                    }),
                    body: self.body(slice),
                })
            }
            None => Ok(UpstreamResponse {
                status: StatusCode::OK,
                content_type: Some("video/mp4".into()),
                content_length: Some(len),
                content_range: None,
                body: self.body(self.data.clone()),
            }),
        }
    }
}

pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
