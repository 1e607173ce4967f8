use bytes::Bytes;
use futures::{Stream, StreamExt};
use hyper::header::{
    HeaderMap, HeaderValue, ACCEPT_RANGES, CACHE_CONTROL, CONTENT_LENGTH, CONTENT_RANGE,
    CONTENT_TYPE,
};
use hyper::StatusCode;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use super::fetcher::{ByteStream, FetchError, UpstreamFetcher, DEFAULT_READ_TIMEOUT};
use super::range::{RangeHeader, RangeRequest};
use super::CHUNK_SIZE;
use crate::error::{Error, Result};
use crate::resolver::{ResolvedDescriptor, DEFAULT_MAX_UPSTREAM};

/// Status line, headers and lazy body of a proxied stream.
pub struct ProxiedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ProxyStream,
}

/// Relays a resolved stream to the client with correct range accounting.
pub struct StreamingProxy {
    fetcher: Arc<dyn UpstreamFetcher>,
    permits: Arc<Semaphore>,
    acquire_timeout: Duration,
    chunk_size: usize,
}

impl StreamingProxy {
    pub fn new(fetcher: Arc<dyn UpstreamFetcher>) -> Self {
        Self {
            fetcher,
            permits: Arc::new(Semaphore::new(DEFAULT_MAX_UPSTREAM)),
            acquire_timeout: DEFAULT_READ_TIMEOUT,
            chunk_size: CHUNK_SIZE,
        }
    }

    pub fn with_permits(mut self, permits: Arc<Semaphore>) -> Self {
        self.permits = permits;
        self
    }

    /// How long a stream waits for upstream capacity before giving up.
    pub fn with_acquire_timeout(mut self, acquire_timeout: Duration) -> Self {
        self.acquire_timeout = acquire_timeout;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub async fn stream(
        &self,
        descriptor: &ResolvedDescriptor,
        range: Option<RangeHeader>,
    ) -> Result<ProxiedResponse> {
        let requested = match range {
            Some(header) => header.to_request(descriptor.size_bytes)?,
            None => None,
        };

        let permit = tokio::time::timeout(self.acquire_timeout, self.permits.clone().acquire_owned())
            .await
            .map_err(|_| {
                warn!(waited = ?self.acquire_timeout, "no upstream capacity for stream");
                FetchError::Unavailable
            })?
            .map_err(|_| FetchError::Unavailable)?;

        let upstream = self.fetcher.fetch(descriptor, requested).await?;

        let total = descriptor
            .size_bytes
            .or_else(|| upstream.content_range.and_then(|cr| cr.total))
            .or(match upstream.status {
                StatusCode::OK => upstream.content_length,
                _ => None,
            });

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_RANGES, HeaderValue::from_static("bytes"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
        let content_type = HeaderValue::from_str(&descriptor.content_type)
            .ok()
            .or_else(|| {
                upstream
                    .content_type
                    .as_deref()
                    .and_then(|ct| HeaderValue::from_str(ct).ok())
            })
            .unwrap_or_else(|| HeaderValue::from_static("application/octet-stream"));
        headers.insert(CONTENT_TYPE, content_type);

        let Some(requested) = requested else {
            if let Some(total) = total {
                headers.insert(CONTENT_LENGTH, HeaderValue::from(total));
            }
            info!(size = ?total, "streaming full resource");
            return Ok(ProxiedResponse {
                status: StatusCode::OK,
                headers,
                body: ProxyStream::new(upstream.body, 0, total, self.chunk_size)
                    .with_permit(permit),
            });
        };

        let requested = match total {
            Some(total) => requested.fit_to(total)?,
            None => requested,
        };

        // Bytes to drop from the front of the upstream body.
        let skip = match (upstream.status, upstream.content_range) {
            (StatusCode::PARTIAL_CONTENT, Some(cr)) if cr.start > requested.start => {
                return Err(FetchError::RangeMismatch {
                    wanted: requested.start,
                    start: cr.start,
                    end: cr.end,
                }
                .into())
            }
            (StatusCode::PARTIAL_CONTENT, Some(cr)) => requested.start - cr.start,
            (StatusCode::PARTIAL_CONTENT, None) => 0,
            _ => requested.start,
        };

        let end = match requested.end {
            Some(end) => end,
            None => match (upstream.status, upstream.content_range, upstream.content_length) {
                (StatusCode::PARTIAL_CONTENT, Some(cr), _) if cr.end >= requested.start => cr.end,
                (StatusCode::PARTIAL_CONTENT, Some(cr), _) => {
                    return Err(FetchError::RangeMismatch {
                        wanted: requested.start,
                        start: cr.start,
                        end: cr.end,
                    }
                    .into())
                }
                (StatusCode::PARTIAL_CONTENT, None, Some(len)) if len > 0 => requested
                    .start
                    .checked_add(len - 1)
                    .ok_or(FetchError::UnknownLength)?,
                _ => return Err(FetchError::UnknownLength.into()),
            },
        };
        // end >= start here.
        let len = (end - requested.start).saturating_add(1);

        let total_label = total.map_or_else(|| "*".to_string(), |t| t.to_string());
        let content_range = format!("bytes {}-{}/{}", requested.start, end, total_label);
        headers.insert(
            CONTENT_RANGE,
            HeaderValue::from_str(&content_range).map_err(|_| FetchError::UnknownLength)?,
        );
        headers.insert(CONTENT_LENGTH, HeaderValue::from(len));
        info!(range = %content_range, "streaming partial content");

        Ok(ProxiedResponse {
            status: StatusCode::PARTIAL_CONTENT,
            headers,
            body: ProxyStream::new(upstream.body, skip, Some(len), self.chunk_size)
                .with_permit(permit),
        })
    }
}

/// Forward-only, single-pass view over an upstream body.
///
/// Drops `skip` leading bytes, yields at most `limit` bytes in chunks of at
/// most `chunk_size`, and ends with an `UnexpectedEof` error if the upstream
/// closes before `limit` is reached. Once finished, the upstream body and the
/// concurrency permit are released.
pub struct ProxyStream {
    inner: Option<ByteStream>,
    pending: Bytes,
    skip: u64,
    remaining: Option<u64>,
    chunk_size: usize,
    sent: u64,
    permit: Option<OwnedSemaphorePermit>,
}

impl ProxyStream {
    pub fn new(inner: ByteStream, skip: u64, limit: Option<u64>, chunk_size: usize) -> Self {
        Self {
            inner: Some(inner),
            pending: Bytes::new(),
            skip,
            remaining: limit,
            chunk_size: chunk_size.max(1),
            sent: 0,
            permit: None,
        }
    }

    /// Holds `permit` until the stream finishes or is dropped.
    pub fn with_permit(mut self, permit: OwnedSemaphorePermit) -> Self {
        self.permit = Some(permit);
        self
    }

    fn finish(&mut self) {
        self.inner = None;
        self.permit = None;
        self.pending = Bytes::new();
    }

    fn take_pending(&mut self) -> Bytes {
        let mut n = self.pending.len().min(self.chunk_size);
        if let Some(remaining) = self.remaining {
            n = n.min(usize::try_from(remaining).unwrap_or(usize::MAX));
        }
        let chunk = self.pending.split_to(n);
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= chunk.len() as u64;
        }
        self.sent += chunk.len() as u64;
        chunk
    }
}

impl Stream for ProxyStream {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if this.remaining == Some(0) {
                if this.inner.is_some() {
                    debug!(sent = this.sent, "stream completed");
                    this.finish();
                }
                return Poll::Ready(None);
            }
            if !this.pending.is_empty() {
                return Poll::Ready(Some(Ok(this.take_pending())));
            }

            let Some(inner) = this.inner.as_mut() else {
                return Poll::Ready(None);
            };
            match inner.poll_next_unpin(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Some(Ok(mut chunk))) => {
                    if this.skip > 0 {
                        let n = usize::try_from(this.skip)
                            .unwrap_or(usize::MAX)
                            .min(chunk.len());
                        let _ = chunk.split_to(n);
                        this.skip -= n as u64;
                    }
                    this.pending = chunk;
                }
                Poll::Ready(Some(Err(err))) => {
                    warn!(sent = this.sent, error = %err, "upstream failed mid-stream");
                    this.finish();
                    return Poll::Ready(Some(Err(err.into())));
                }
                Poll::Ready(None) => {
                    this.finish();
                    let outstanding = this.remaining.unwrap_or(0) + this.skip;
                    if outstanding > 0 {
                        warn!(sent = this.sent, outstanding, "upstream closed early");
                        return Poll::Ready(Some(Err(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            format!("upstream closed with {outstanding} bytes outstanding"),
                        ))));
                    }
                    debug!(sent = this.sent, "stream completed");
                    return Poll::Ready(None);
                }
            }
        }
    }
}

impl Drop for ProxyStream {
    fn drop(&mut self) {
        if self.inner.is_some() {
            debug!(sent = self.sent, "stream dropped before completion");
        }
    }
}
