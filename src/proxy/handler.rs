use bytes::Bytes;
use futures::TryStreamExt;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::Frame;
use hyper::header::{HeaderValue, CONTENT_RANGE, CONTENT_TYPE, RANGE, RETRY_AFTER};
use http::request::Parts;
use hyper::{Method, Request, Response, StatusCode};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::convert::Infallible;
use std::io;
use std::sync::Arc;
use tracing::{info, warn};

use super::range::parse_range_header;
use super::stream::StreamingProxy;
use crate::cache::ResolutionCache;
use crate::error::{Error, Result};
use crate::resolver::{FormatInfo, MediaKind, Orchestrator, QualityTier};

pub type ResponseBody = UnsyncBoxBody<Bytes, io::Error>;

/// Everything a request handler needs, shared across connections.
pub struct AppState {
    pub orchestrator: Orchestrator,
    pub proxy: StreamingProxy,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator, proxy: StreamingProxy) -> Self {
        Self {
            orchestrator,
            proxy,
        }
    }

    pub fn cache(&self) -> &ResolutionCache {
        self.orchestrator.cache()
    }
}

/// Validated `url`/`mediaKind`/`qualityTier` query.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaQuery {
    pub url: String,
    pub kind: MediaKind,
    pub quality: QualityTier,
}

impl MediaQuery {
    pub fn parse(query: Option<&str>) -> Result<Self> {
        let params: HashMap<String, String> = url::form_urlencoded::parse(
            query.unwrap_or_default().as_bytes(),
        )
        .into_owned()
        .collect();

        let raw = params
            .get("url")
            .map(|u| u.trim())
            .filter(|u| !u.is_empty())
            .ok_or_else(|| Error::InvalidRequest("missing 'url' parameter".into()))?;
        let parsed = url::Url::parse(raw)
            .map_err(|e| Error::InvalidRequest(format!("invalid url '{raw}': {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::InvalidRequest(format!(
                "unsupported url scheme '{}'",
                parsed.scheme()
            )));
        }

        let kind = params
            .get("mediaKind")
            .or_else(|| params.get("media_type"))
            .map(|k| k.parse::<MediaKind>())
            .transpose()?
            .unwrap_or_default();
        let quality = params
            .get("qualityTier")
            .map(|q| q.parse::<QualityTier>())
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            url: raw.to_string(),
            kind,
            quality,
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResolveResponse<'a> {
    title: &'a str,
    duration_seconds: u64,
    content_type: &'a str,
    size_bytes: Option<u64>,
    formats: &'a [FormatInfo],
}

pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
) -> std::result::Result<Response<ResponseBody>, Infallible> {
    let (parts, _) = req.into_parts();
    let method = parts.method.clone();
    let path = parts.uri.path().to_string();

    let result = match (&method, path.as_str()) {
        (&Method::GET, "/") => Ok(index()),
        (&Method::GET, "/resolve") => resolve(&parts, &state).await,
        (&Method::GET, "/stream") => stream(&parts, &state).await,
        (&Method::GET, "/cache/stats") => Ok(json_response(StatusCode::OK, &state.cache().stats())),
        (&Method::POST, "/cache/clear") => {
            state.cache().clear();
            info!("resolution cache cleared");
            Ok(json_response(StatusCode::OK, &json!({ "cleared": true })))
        }
        (_, "/" | "/resolve" | "/stream" | "/cache/stats" | "/cache/clear") => Ok(json_response(
            StatusCode::METHOD_NOT_ALLOWED,
            &json!({ "error": "MethodNotAllowed", "message": format!("{method} not allowed on {path}") }),
        )),
        _ => Ok(json_response(
            StatusCode::NOT_FOUND,
            &json!({ "error": "NotFound", "message": format!("no route for {path}") }),
        )),
    };

    Ok(result.unwrap_or_else(|err| {
        warn!(%method, %path, error = %err, "request failed");
        error_response(&err, &state)
    }))
}

async fn resolve(parts: &Parts, state: &AppState) -> Result<Response<ResponseBody>> {
    let query = MediaQuery::parse(parts.uri.query())?;
    let descriptor = state
        .orchestrator
        .resolve(&query.url, query.kind, query.quality)
        .await?;

    Ok(json_response(
        StatusCode::OK,
        &ResolveResponse {
            title: &descriptor.title,
            duration_seconds: descriptor.duration_seconds,
            content_type: &descriptor.content_type,
            size_bytes: descriptor.size_bytes,
            formats: &descriptor.formats,
        },
    ))
}

async fn stream(parts: &Parts, state: &AppState) -> Result<Response<ResponseBody>> {
    let query = MediaQuery::parse(parts.uri.query())?;
    let range = parts
        .headers
        .get(RANGE)
        .and_then(|h| h.to_str().ok())
        .and_then(parse_range_header);

    let descriptor = state
        .orchestrator
        .resolve(&query.url, query.kind, query.quality)
        .await?;
    let proxied = state.proxy.stream(&descriptor, range).await?;

    let body = StreamBody::new(proxied.body.map_ok(Frame::data)).boxed_unsync();
    let mut response = Response::new(body);
    *response.status_mut() = proxied.status;
    *response.headers_mut() = proxied.headers;
    Ok(response)
}

fn index() -> Response<ResponseBody> {
    json_response(
        StatusCode::OK,
        &json!({
            "message": "Video resolve proxy",
            "endpoints": [
                "GET /resolve?url=<source url>&mediaKind=video|audio&qualityTier=low|medium|high|best",
                "GET /stream?url=<source url>&mediaKind=video|audio&qualityTier=low|medium|high|best",
                "GET /cache/stats",
                "POST /cache/clear",
            ],
        }),
    )
}

fn full_body(bytes: impl Into<Bytes>) -> ResponseBody {
    Full::new(bytes.into())
        .map_err(|never| match never {})
        .boxed_unsync()
}

fn json_response(status: StatusCode, value: &impl Serialize) -> Response<ResponseBody> {
    let (status, body) = match serde_json::to_vec(value) {
        Ok(body) => (status, body),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, b"{}".to_vec()),
    };
    let mut response = Response::new(full_body(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

fn error_response(err: &Error, state: &AppState) -> Response<ResponseBody> {
    let mut response = json_response(
        err.status_code(),
        &json!({ "error": err.class(), "message": err.to_string() }),
    );
    match err {
        Error::RecentlyFailed { .. } => {
            let retry_after = state.cache().negative_ttl().as_secs().max(1);
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(retry_after));
        }
        Error::RangeNotSatisfiable { size } => {
            if let Ok(value) = HeaderValue::from_str(&format!("bytes */{size}")) {
                response.headers_mut().insert(CONTENT_RANGE, value);
            }
        }
        _ => {}
    }
    response
}
