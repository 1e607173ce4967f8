use std::time::Duration;

use super::model::{MediaKind, QualityTier};

const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36";

/// One named way of asking the extractor for a stream.
///
/// Strategies carry no state; the orchestrator tries them in list order.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionStrategy {
    pub name: String,
    /// Client identity the extractor should present (e.g. `android`, `web`).
    pub player_client: Option<String>,
    pub user_agent: Option<String>,
    pub headers: Vec<(String, String)>,
    /// Replaces the selector derived from kind and quality.
    pub format_override: Option<String>,
    pub timeout: Duration,
    /// Retries the extractor may spend internally within `timeout`.
    pub retries: u32,
}

impl ExtractionStrategy {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            player_client: None,
            user_agent: None,
            headers: Vec::new(),
            format_override: None,
            timeout: Duration::from_secs(30),
            retries: 1,
        }
    }

    pub fn with_player_client(mut self, client: impl Into<String>) -> Self {
        self.player_client = Some(client.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_format(mut self, selector: impl Into<String>) -> Self {
        self.format_override = Some(selector.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn format_selector(&self, kind: MediaKind, quality: QualityTier) -> String {
        self.format_override
            .clone()
            .unwrap_or_else(|| format_selector(kind, quality))
    }
}

/// Default strategy order: cheapest and least-blocked client first.
pub fn default_strategies() -> Vec<ExtractionStrategy> {
    vec![
        ExtractionStrategy::new("android")
            .with_player_client("android")
            .with_timeout(Duration::from_secs(20))
            .with_retries(1),
        ExtractionStrategy::new("web")
            .with_player_client("web")
            .with_user_agent(DESKTOP_USER_AGENT)
            .with_header("Accept-Language", "en-US,en;q=0.9")
            .with_timeout(Duration::from_secs(30))
            .with_retries(2),
        ExtractionStrategy::new("tv-any-format")
            .with_player_client("tv")
            .with_format("best/bestaudio")
            .with_timeout(Duration::from_secs(45))
            .with_retries(2),
    ]
}

/// Selector for a single self-contained format.
///
/// The proxy relays exactly one upstream URL, so video selectors insist on
/// formats that already carry audio.
pub fn format_selector(kind: MediaKind, quality: QualityTier) -> String {
    match kind {
        MediaKind::Audio => match quality.max_audio_bitrate() {
            Some(abr) => format!("bestaudio[abr<={abr}]/worstaudio/bestaudio/best"),
            None => "bestaudio/best".to_string(),
        },
        MediaKind::Video => match quality.max_height() {
            Some(h) => format!(
                "best[height<={h}][vcodec!=none][acodec!=none]/best[height<={h}]/best"
            ),
            None => "best[vcodec!=none][acodec!=none]/best".to_string(),
        },
    }
}
