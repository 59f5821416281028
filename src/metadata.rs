// Metadata boundary — yt-dlp as the extraction engine
//
// yt-dlp is asked for a single JSON document on stdout. The loose document
// is validated into strict types here; nothing downstream touches raw JSON.

use async_trait::async_trait;
use serde::Deserialize;

use crate::errors::MetadataError;
use crate::models::{FormatDescriptor, VideoMetadata};
use crate::traits::MetadataResolver;
use crate::utils::{detect_proxy, find_ytdlp, run_output_with_timeout};

const RESOLVE_TIMEOUT_SECS: u64 = 60;

/// Shape of one metadata object as yt-dlp prints it
#[derive(Debug, Deserialize)]
struct RawEntry {
    title: Option<String>,
    duration: Option<f64>,
    formats: Option<Vec<FormatDescriptor>>,
}

/// Top-level document: either a single entry, or a playlist wrapper with
/// an `entries` array of them.
#[derive(Debug, Deserialize)]
struct RawDocument {
    title: Option<String>,
    duration: Option<f64>,
    formats: Option<Vec<FormatDescriptor>>,
    entries: Option<Vec<RawEntry>>,
}

pub struct YtdlpResolver {
    ytdlp_path: String,
    proxy: Option<String>,
}

impl YtdlpResolver {
    pub fn new() -> Self {
        Self {
            ytdlp_path: find_ytdlp(),
            proxy: detect_proxy(),
        }
    }

    fn build_args(&self, url: &str) -> Vec<String> {
        let mut args = vec![
            "--dump-single-json".to_string(),
            "--no-warnings".to_string(),
            "--no-check-certificates".to_string(),
        ];

        if let Some(proxy) = &self.proxy {
            args.push("--proxy".to_string());
            args.push(proxy.clone());
        }

        args.push(url.to_string());
        args
    }

    /// Validate the parsed document into a single video's metadata.
    /// Multi-entry results (playlists, series) are an explicit single-video
    /// scope boundary: only the first entry is processed.
    fn validate(doc: RawDocument) -> Result<VideoMetadata, MetadataError> {
        let (title, duration, formats) = match doc.entries {
            Some(mut entries) if !entries.is_empty() => {
                if entries.len() > 1 {
                    eprintln!(
                        "[metadata] Source returned {} entries; processing the first only",
                        entries.len()
                    );
                }
                let first = entries.remove(0);
                (first.title, first.duration, first.formats)
            }
            _ => (doc.title, doc.duration, doc.formats),
        };

        let raw_formats = formats.ok_or(MetadataError::NoFormats)?;
        let total = raw_formats.len();

        // Records without a fetch location are useless downstream
        let formats: Vec<FormatDescriptor> = raw_formats
            .into_iter()
            .filter(|f| f.url.as_deref().map_or(false, |u| !u.is_empty()))
            .collect();

        if formats.len() < total {
            eprintln!(
                "[metadata] Dropped {} format record(s) without a URL",
                total - formats.len()
            );
        }
        if formats.is_empty() {
            return Err(MetadataError::NoFormats);
        }

        Ok(VideoMetadata {
            title,
            duration,
            formats,
        })
    }
}

impl Default for YtdlpResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataResolver for YtdlpResolver {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn resolve(&self, url: &str) -> Result<VideoMetadata, MetadataError> {
        let args = self.build_args(url);
        eprintln!("[metadata] Resolving: {} {}", self.ytdlp_path, args.join(" "));

        let output = run_output_with_timeout(&self.ytdlp_path, args, RESOLVE_TIMEOUT_SECS)
            .await
            .map_err(|e| {
                if e.contains("Failed to start") {
                    MetadataError::ToolNotFound(format!("{}: {}", self.ytdlp_path, e))
                } else {
                    MetadataError::ExecutionFailed(e)
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MetadataError::ExecutionFailed(
                stderr.lines().take(3).collect::<Vec<_>>().join(" | "),
            ));
        }

        let doc: RawDocument = serde_json::from_slice(&output.stdout)
            .map_err(|e| MetadataError::InvalidJson(e.to_string()))?;

        Self::validate(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_single_object() {
        let doc: RawDocument = serde_json::from_str(
            r#"{
                "title": "Clip",
                "duration": 42.5,
                "formats": [
                    {"vcodec": "avc1", "acodec": "mp4a", "height": 720,
                     "ext": "mp4", "url": "https://example.com/f"}
                ]
            }"#,
        )
        .unwrap();

        let meta = YtdlpResolver::validate(doc).unwrap();
        assert_eq!(meta.title.as_deref(), Some("Clip"));
        assert_eq!(meta.duration, Some(42.5));
        assert_eq!(meta.formats.len(), 1);
    }

    #[test]
    fn test_validate_takes_first_playlist_entry() {
        let doc: RawDocument = serde_json::from_str(
            r#"{
                "title": "Series",
                "entries": [
                    {"title": "Episode 1",
                     "formats": [{"url": "https://example.com/e1"}]},
                    {"title": "Episode 2",
                     "formats": [{"url": "https://example.com/e2"}]}
                ]
            }"#,
        )
        .unwrap();

        let meta = YtdlpResolver::validate(doc).unwrap();
        assert_eq!(meta.title.as_deref(), Some("Episode 1"));
        assert_eq!(
            meta.formats[0].url.as_deref(),
            Some("https://example.com/e1")
        );
    }

    #[test]
    fn test_validate_drops_urlless_records() {
        let doc: RawDocument = serde_json::from_str(
            r#"{
                "title": "Clip",
                "formats": [
                    {"vcodec": "avc1", "height": 720},
                    {"url": "https://example.com/ok"}
                ]
            }"#,
        )
        .unwrap();

        let meta = YtdlpResolver::validate(doc).unwrap();
        assert_eq!(meta.formats.len(), 1);
    }

    #[test]
    fn test_validate_rejects_empty() {
        let doc: RawDocument = serde_json::from_str(r#"{"title": "Clip"}"#).unwrap();
        assert!(matches!(
            YtdlpResolver::validate(doc),
            Err(MetadataError::NoFormats)
        ));

        let doc: RawDocument =
            serde_json::from_str(r#"{"title": "Clip", "formats": [{"height": 1}]}"#).unwrap();
        assert!(matches!(
            YtdlpResolver::validate(doc),
            Err(MetadataError::NoFormats)
        ));
    }
}
