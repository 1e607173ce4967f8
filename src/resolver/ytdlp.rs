use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

use super::extractor::{ExtractionError, ExtractionErrorKind, ExtractionParams, Extractor};
use super::model::{content_type_for, FormatInfo, ResolvedDescriptor};

/// Extractor backed by the `yt-dlp` binary.
pub struct YtDlpExtractor {
    binary: PathBuf,
}

impl YtDlpExtractor {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn build_args(source_url: &str, params: &ExtractionParams) -> Vec<String> {
        let strategy = &params.strategy;
        let mut args: Vec<String> = vec![
            "--dump-single-json".into(),
            "--skip-download".into(),
            "--no-playlist".into(),
            "--no-warnings".into(),
            "--no-cache-dir".into(),
            "--format".into(),
            params.format.clone(),
            "--retries".into(),
            strategy.retries.to_string(),
            "--socket-timeout".into(),
            strategy.timeout.as_secs().max(1).to_string(),
        ];

        if let Some(client) = &strategy.player_client {
            args.push("--extractor-args".into());
            args.push(format!("youtube:player_client={client}"));
        }
        if let Some(ua) = &strategy.user_agent {
            args.push("--user-agent".into());
            args.push(ua.clone());
        }
        for (name, value) in &strategy.headers {
            args.push("--add-header".into());
            args.push(format!("{name}:{value}"));
        }
        if let Some(cookies) = &params.cookies_file {
            args.push("--cookies".into());
            args.push(cookies.display().to_string());
        }
        if let Some(proxy) = &params.proxy {
            args.push("--proxy".into());
            args.push(proxy.clone());
        }

        args.push("--".into());
        args.push(source_url.to_string());
        args
    }

    fn parse_output(stdout: &[u8], params: &ExtractionParams) -> Result<ResolvedDescriptor, ExtractionError> {
        let info: YtDlpInfo = serde_json::from_slice(stdout).map_err(|e| {
            ExtractionError::new(
                ExtractionErrorKind::Transient,
                format!("unreadable extractor output: {e}"),
            )
        })?;

        let stream_url = match info.url {
            Some(url) if !url.is_empty() => url,
            _ if info.requested_formats.is_some() => {
                return Err(ExtractionError::new(
                    ExtractionErrorKind::NotFound,
                    "selected format is split into separate streams",
                ))
            }
            _ => {
                return Err(ExtractionError::new(
                    ExtractionErrorKind::NotFound,
                    "no direct stream url in extractor output",
                ))
            }
        };

        let ext = info.ext.unwrap_or_default();
        let formats = info
            .formats
            .into_iter()
            .map(|f| FormatInfo {
                format_id: f.format_id,
                ext: f.ext.unwrap_or_default(),
                height: f.height,
                audio_bitrate: f.abr,
                size_bytes: f.filesize,
            })
            .collect();

        Ok(ResolvedDescriptor {
            stream_url,
            title: info.title.unwrap_or_else(|| "Unknown".to_string()),
            duration_seconds: info.duration.map(|d| d.max(0.0) as u64).unwrap_or(0),
            content_type: content_type_for(&ext, params.kind).to_string(),
            size_bytes: info.filesize,
            http_headers: info.http_headers,
            formats,
            proxy: params.proxy.clone(),
        })
    }
}

#[async_trait]
impl Extractor for YtDlpExtractor {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn extract(
        &self,
        source_url: &str,
        params: &ExtractionParams,
    ) -> Result<ResolvedDescriptor, ExtractionError> {
        let args = Self::build_args(source_url, params);
        tracing::debug!(
            strategy = %params.strategy.name,
            "running {} {}",
            self.binary.display(),
            args.join(" ")
        );

        // The orchestrator drops this future on timeout; kill_on_drop reaps the child.
        let output = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                ExtractionError::new(
                    ExtractionErrorKind::Transient,
                    format!("failed to start {}: {e}", self.binary.display()),
                )
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractionError::from_diagnostics(&stderr));
        }

        Self::parse_output(&output.stdout, params)
    }
}

#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    title: Option<String>,
    duration: Option<f64>,
    url: Option<String>,
    ext: Option<String>,
    filesize: Option<u64>,
    #[serde(default)]
    http_headers: BTreeMap<String, String>,
    #[serde(default)]
    formats: Vec<YtDlpFormat>,
    requested_formats: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct YtDlpFormat {
    #[serde(default)]
    format_id: String,
    ext: Option<String>,
    height: Option<u32>,
    abr: Option<f32>,
    filesize: Option<u64>,
}
