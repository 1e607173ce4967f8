use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use super::model::{MediaKind, ResolvedDescriptor};
use super::strategy::ExtractionStrategy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionErrorKind {
    /// Bot detection, rate limiting, geo gating or a bare 403.
    Blocked,
    /// Login, age, private or members-only gating.
    AuthRequired,
    /// Removed, unavailable, or no playable stream.
    NotFound,
    /// The extractor does not understand the input.
    Unsupported,
    Transient,
}

impl ExtractionErrorKind {
    /// Failures that credentials might get past.
    pub fn is_access_restricted(&self) -> bool {
        matches!(self, Self::Blocked | Self::AuthRequired)
    }
}

impl fmt::Display for ExtractionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Blocked => "blocked",
            Self::AuthRequired => "auth required",
            Self::NotFound => "not found",
            Self::Unsupported => "unsupported",
            Self::Transient => "transient",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ExtractionError {
    pub kind: ExtractionErrorKind,
    pub message: String,
}

impl ExtractionError {
    pub fn new(kind: ExtractionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Builds an error whose kind is read from extractor diagnostics.
    pub fn from_diagnostics(diagnostics: &str) -> Self {
        let message = diagnostics
            .lines()
            .rev()
            .find(|line| line.contains("ERROR"))
            .unwrap_or(diagnostics)
            .trim()
            .to_string();
        Self::new(classify(diagnostics), message)
    }
}

/// Everything the extractor needs for one attempt.
#[derive(Debug, Clone)]
pub struct ExtractionParams {
    pub strategy: ExtractionStrategy,
    pub kind: MediaKind,
    pub format: String,
    pub cookies_file: Option<PathBuf>,
    pub proxy: Option<String>,
}

impl ExtractionParams {
    pub fn timeout(&self) -> Duration {
        self.strategy.timeout
    }

    pub fn is_authenticated(&self) -> bool {
        self.cookies_file.is_some()
    }
}

/// The capability that turns a source URL into a fetchable stream.
#[async_trait]
pub trait Extractor: Send + Sync {
    fn name(&self) -> &'static str;

    async fn extract(
        &self,
        source_url: &str,
        params: &ExtractionParams,
    ) -> Result<ResolvedDescriptor, ExtractionError>;
}

/// Maps extractor diagnostics onto a failure class.
pub fn classify(diagnostics: &str) -> ExtractionErrorKind {
    let lower = diagnostics.to_lowercase();
    let has = |patterns: &[&str]| patterns.iter().any(|p| lower.contains(p));

    if has(&["unsupported url", "is not a valid url"]) {
        return ExtractionErrorKind::Unsupported;
    }
    if has(&[
        "sign in to confirm your age",
        "age-restricted",
        "private video",
        "video is private",
        "members only",
        "members-only",
        "join this channel",
        "login required",
        "requires authentication",
    ]) {
        return ExtractionErrorKind::AuthRequired;
    }
    if has(&[
        "available in your country",
        "blocked in your country",
        "geo restrict",
        "http error 429",
        "too many requests",
        "rate limit",
        "confirm you're not a bot",
        "captcha",
        "unusual traffic",
        "http error 403",
        "forbidden",
    ]) {
        return ExtractionErrorKind::Blocked;
    }
    if has(&[
        "video unavailable",
        "video has been removed",
        "no longer available",
        "does not exist",
        "http error 404",
        "requested format is not available",
        "no video formats found",
    ]) {
        return ExtractionErrorKind::NotFound;
    }
    ExtractionErrorKind::Transient
}
