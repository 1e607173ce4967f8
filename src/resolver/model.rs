use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    #[default]
    Video,
    Audio,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "video" => Ok(Self::Video),
            "audio" => Ok(Self::Audio),
            other => Err(Error::InvalidRequest(format!("unknown media kind '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Low,
    #[default]
    Medium,
    High,
    Best,
}

impl QualityTier {
    pub const ALL: [QualityTier; 4] = [Self::Low, Self::Medium, Self::High, Self::Best];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Best => "best",
        }
    }

    /// Upper bound on video height, `None` for no limit.
    pub fn max_height(&self) -> Option<u32> {
        match self {
            Self::Low => Some(360),
            Self::Medium => Some(480),
            Self::High => Some(720),
            Self::Best => None,
        }
    }

    /// Upper bound on audio bitrate in kbps, `None` for no limit.
    pub fn max_audio_bitrate(&self) -> Option<u32> {
        match self {
            Self::Low => Some(64),
            Self::Medium => Some(128),
            Self::High | Self::Best => None,
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QualityTier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "best" => Ok(Self::Best),
            other => Err(Error::InvalidRequest(format!("unknown quality tier '{other}'"))),
        }
    }
}

/// One format the source offers, as reported by the extractor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatInfo {
    pub format_id: String,
    pub ext: String,
    pub height: Option<u32>,
    pub audio_bitrate: Option<f32>,
    pub size_bytes: Option<u64>,
}

/// A successfully resolved, directly fetchable stream.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedDescriptor {
    pub stream_url: String,
    pub title: String,
    pub duration_seconds: u64,
    pub content_type: String,
    pub size_bytes: Option<u64>,
    /// Headers the upstream expects when `stream_url` is fetched.
    pub http_headers: BTreeMap<String, String>,
    pub formats: Vec<FormatInfo>,
    /// Outbound proxy the location was resolved through. Signed stream URLs
    /// are bound to the resolving exit IP, so the fetch must reuse it.
    pub proxy: Option<String>,
}

impl ResolvedDescriptor {
    pub fn is_playable(&self) -> bool {
        !self.stream_url.trim().is_empty()
    }
}

/// MIME type for a container extension.
pub fn content_type_for(ext: &str, kind: MediaKind) -> &'static str {
    match (ext, kind) {
        ("mp4" | "m4a", MediaKind::Audio) | ("m4a", _) => "audio/mp4",
        ("mp4" | "m4v", _) => "video/mp4",
        ("webm", MediaKind::Audio) | ("weba", _) => "audio/webm",
        ("webm", _) => "video/webm",
        ("mp3", _) => "audio/mpeg",
        ("ogg" | "opus", _) => "audio/ogg",
        ("aac", _) => "audio/aac",
        ("flv", _) => "video/x-flv",
        ("3gp", _) => "video/3gpp",
        ("ts", _) => "video/mp2t",
        _ => "application/octet-stream",
    }
}
