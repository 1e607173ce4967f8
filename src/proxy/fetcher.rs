use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::TryStreamExt;
use hyper::StatusCode;
use reqwest::header::{HeaderName, HeaderValue, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, RANGE};
use std::collections::HashMap;
use std::io;
use std::time::Duration;

use super::range::{ContentRange, RangeRequest};
use crate::proxy_pool::ProxyPool;
use crate::resolver::ResolvedDescriptor;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

pub type ByteStream = BoxStream<'static, Result<Bytes, FetchError>>;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("upstream timed out")]
    Timeout,
    #[error("could not reach upstream: {0}")]
    Connect(String),
    #[error("upstream answered {0}")]
    Status(StatusCode),
    #[error("upstream body failed: {0}")]
    Body(String),
    #[error("upstream did not report the extent of the requested range")]
    UnknownLength,
    #[error("upstream returned bytes {start}-{end}, which do not cover byte {wanted}")]
    RangeMismatch { wanted: u64, start: u64, end: u64 },
    #[error("no upstream capacity available")]
    Unavailable,
}

impl From<FetchError> for io::Error {
    fn from(err: FetchError) -> Self {
        let kind = match err {
            FetchError::Timeout => io::ErrorKind::TimedOut,
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}

/// Status, the headers the proxy cares about, and the unread body.
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub content_range: Option<ContentRange>,
    pub body: ByteStream,
}

/// Performs the GET against a resolved stream location.
#[async_trait]
pub trait UpstreamFetcher: Send + Sync {
    /// Fetches `descriptor.stream_url` with the descriptor's headers, through
    /// the proxy it was resolved with.
    async fn fetch(
        &self,
        descriptor: &ResolvedDescriptor,
        range: Option<RangeRequest>,
    ) -> Result<UpstreamResponse, FetchError>;
}

/// `reqwest`-backed fetcher. Holds a direct client plus one client per
/// configured proxy, keyed by endpoint.
pub struct HttpFetcher {
    direct: reqwest::Client,
    proxied: HashMap<String, reqwest::Client>,
}

impl HttpFetcher {
    pub fn new(
        connect_timeout: Duration,
        read_timeout: Duration,
        proxies: &ProxyPool,
    ) -> reqwest::Result<Self> {
        let builder = || {
            reqwest::Client::builder()
                .connect_timeout(connect_timeout)
                .read_timeout(read_timeout)
        };

        let direct = builder().build()?;
        let proxied = proxies
            .endpoints()
            .iter()
            .map(|endpoint| {
                let client = builder()
                    .proxy(reqwest::Proxy::all(endpoint.as_str())?)
                    .build()?;
                Ok((endpoint.clone(), client))
            })
            .collect::<reqwest::Result<HashMap<_, _>>>()?;
        Ok(Self { direct, proxied })
    }

    fn client_for(&self, proxy: Option<&str>) -> Result<&reqwest::Client, FetchError> {
        match proxy {
            None => Ok(&self.direct),
            Some(endpoint) => self
                .proxied
                .get(endpoint)
                .ok_or_else(|| FetchError::Connect(format!("proxy {endpoint} is not configured"))),
        }
    }
}

#[async_trait]
impl UpstreamFetcher for HttpFetcher {
    async fn fetch(
        &self,
        descriptor: &ResolvedDescriptor,
        range: Option<RangeRequest>,
    ) -> Result<UpstreamResponse, FetchError> {
        let client = self.client_for(descriptor.proxy.as_deref())?;
        let mut request = client.get(&descriptor.stream_url);
        for (name, value) in &descriptor.http_headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => request = request.header(name, value),
                _ => tracing::debug!(header = %name, "skipping unrepresentable upstream header"),
            }
        }
        if let Some(range) = range {
            request = request.header(RANGE, range.header_value());
        }

        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let header = |name: HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let content_type = header(CONTENT_TYPE);
        let content_length = header(CONTENT_LENGTH).and_then(|v| v.parse().ok());
        let content_range = header(CONTENT_RANGE).and_then(|v| ContentRange::parse(&v));

        Ok(UpstreamResponse {
            status,
            content_type,
            content_length,
            content_range,
            body: Box::pin(response.bytes_stream().map_err(map_reqwest_error)),
        })
    }
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else if err.is_body() || err.is_decode() {
        FetchError::Body(err.to_string())
    } else {
        FetchError::Connect(err.to_string())
    }
}
