use hyper::StatusCode;

use crate::proxy::FetchError;
use crate::resolver::{ExtractionError, ExtractionErrorKind};

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Every failure a caller of the service can observe.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The source failed recently and is inside its negative TTL window.
    #[error("{url} failed recently, retry later")]
    RecentlyFailed { url: String },

    #[error("could not resolve {url}: {source}")]
    ResolutionFailed {
        url: String,
        #[source]
        source: ExtractionError,
    },

    #[error("{url} requires credentials: {source}")]
    AuthRequired {
        url: String,
        #[source]
        source: ExtractionError,
    },

    #[error("upstream fetch failed: {0}")]
    UpstreamFetchFailed(#[from] FetchError),

    #[error("range not satisfiable for resource of {size} bytes")]
    RangeNotSatisfiable { size: u64 },
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::RecentlyFailed { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::ResolutionFailed { source, .. } => match source.kind {
                ExtractionErrorKind::Unsupported => StatusCode::BAD_REQUEST,
                _ => StatusCode::NOT_FOUND,
            },
            Self::AuthRequired { .. } => StatusCode::FORBIDDEN,
            Self::UpstreamFetchFailed(FetchError::Timeout) => StatusCode::GATEWAY_TIMEOUT,
            Self::UpstreamFetchFailed(_) => StatusCode::BAD_GATEWAY,
            Self::RangeNotSatisfiable { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
        }
    }

    /// Stable class name reported in JSON error bodies.
    pub fn class(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "InvalidRequest",
            Self::RecentlyFailed { .. } => "RecentlyFailed",
            Self::ResolutionFailed { .. } => "ResolutionFailed",
            Self::AuthRequired { .. } => "AuthRequired",
            Self::UpstreamFetchFailed(_) => "UpstreamFetchFailed",
            Self::RangeNotSatisfiable { .. } => "RangeNotSatisfiable",
        }
    }
}
