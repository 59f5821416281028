// Data model for the selection and acquisition pipeline

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::errors::CleanupError;

/// One candidate media representation, as reported by yt-dlp.
///
/// Produced entirely at the metadata boundary; never mutated downstream.
#[derive(Debug, Clone, Deserialize)]
pub struct FormatDescriptor {
    /// Video codec (e.g., "avc1.4d401f"), "none" when no video channel
    pub vcodec: Option<String>,

    /// Audio codec (e.g., "mp4a.40.2"), "none" when no audio channel
    pub acodec: Option<String>,

    /// Frame height in pixels
    pub height: Option<u32>,

    /// Total bitrate in kbps
    pub tbr: Option<f32>,

    /// Audio bitrate in kbps
    pub abr: Option<f32>,

    /// Container extension (mp4, webm, m4a)
    pub ext: Option<String>,

    /// Direct fetch location
    pub url: Option<String>,
}

impl FormatDescriptor {
    /// Check whether the video channel is present
    pub fn has_video(&self) -> bool {
        self.vcodec
            .as_deref()
            .map_or(false, |v| v != "none" && !v.is_empty())
    }

    /// Check whether the audio channel is present
    pub fn has_audio(&self) -> bool {
        self.acodec
            .as_deref()
            .map_or(false, |a| a != "none" && !a.is_empty())
    }

    /// Container extension with a sensible default
    pub fn ext_or(&self, default: &str) -> String {
        self.ext
            .as_deref()
            .filter(|e| !e.is_empty())
            .unwrap_or(default)
            .to_string()
    }
}

/// Validated metadata for a single video (first entry of a playlist result)
#[derive(Debug, Clone)]
pub struct VideoMetadata {
    pub title: Option<String>,
    /// Duration in seconds, used only for advisory merge progress
    pub duration: Option<f64>,
    pub formats: Vec<FormatDescriptor>,
}

/// Result of format selection. The "nothing met the ceiling" case is the
/// selector returning `None`.
#[derive(Debug, Clone)]
pub enum Selection {
    /// One representation carries both channels; no local download needed
    Progressive(FormatDescriptor),

    /// Disjoint best-video and best-audio tracks that must be combined
    Dash {
        video: FormatDescriptor,
        audio: FormatDescriptor,
    },
}

/// Which acquisition method a retrieval job tries first.
///
/// Video endpoints respond well to a plain browser-shaped GET; audio
/// endpoints more often need the delegated downloader's host-specific
/// handling, so the orders are opposite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodOrder {
    DirectFirst,
    DelegatedFirst,
}

/// One file to fetch: source, destination, and method order.
#[derive(Debug, Clone)]
pub struct RetrievalJob {
    pub url: String,
    pub dest: PathBuf,
    pub order: MethodOrder,
}

impl RetrievalJob {
    pub fn new(url: impl Into<String>, dest: impl Into<PathBuf>, order: MethodOrder) -> Self {
        Self {
            url: url.into(),
            dest: dest.into(),
            order,
        }
    }
}

/// Intermediate files created during a Dash run.
///
/// Owned by the orchestrator; removal is attempted exactly once per run,
/// on the success and the failure path alike.
#[derive(Debug, Default)]
pub struct TempFileSet {
    paths: Vec<PathBuf>,
}

impl TempFileSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, path: impl Into<PathBuf>) {
        self.paths.push(path.into());
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Remove every tracked file, tolerating individual failures.
    /// Missing files are not failures (a job may never have created its
    /// destination). Returns the failures for the caller to log.
    pub fn remove_all(self) -> Vec<CleanupError> {
        let mut failures = Vec::new();
        for path in self.paths {
            match std::fs::remove_file(&path) {
                Ok(()) => eprintln!("[cleanup] Removed {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(source) => failures.push(CleanupError { path, source }),
            }
        }
        failures
    }
}

/// The single JSON document emitted on stdout at the end of a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Report {
    /// A muxed representation exists; final retrieval is left to the caller
    #[serde(rename = "progressive")]
    Progressive {
        height: u32,
        ext: String,
        url: String,
        note: String,
    },

    /// Both tracks were downloaded and remuxed into one file
    #[serde(rename = "merged")]
    Merged {
        #[serde(rename = "outputFile")]
        output_file: String,
        video: String,
        audio: String,
        note: String,
    },

    /// Automation failed; the caller gets raw URLs plus a runnable command
    #[serde(rename = "dash_fallback")]
    DashFallback {
        video: String,
        audio: String,
        #[serde(rename = "howToMerge")]
        how_to_merge: String,
        note: String,
    },
}

impl Report {
    /// Build the copy-pasteable escape-hatch command for a fallback report.
    pub fn merge_command(video_url: &str, audio_url: &str, output: &Path) -> String {
        format!(
            "ffmpeg -i \"{}\" -i \"{}\" -c copy -avoid_negative_ts make_zero \"{}\"",
            video_url,
            audio_url,
            output.display()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_presence() {
        let f = FormatDescriptor {
            vcodec: Some("avc1.4d401f".to_string()),
            acodec: Some("none".to_string()),
            height: Some(720),
            tbr: Some(1200.0),
            abr: None,
            ext: Some("mp4".to_string()),
            url: Some("https://example.com/v".to_string()),
        };
        assert!(f.has_video());
        assert!(!f.has_audio());
    }

    #[test]
    fn test_report_json_shapes() {
        let merged = Report::Merged {
            output_file: "clip_720p_merged.mp4".to_string(),
            video: "https://example.com/v".to_string(),
            audio: "https://example.com/a".to_string(),
            note: "done".to_string(),
        };
        let json = serde_json::to_value(&merged).unwrap();
        assert_eq!(json["type"], "merged");
        assert_eq!(json["outputFile"], "clip_720p_merged.mp4");

        let fallback = Report::DashFallback {
            video: "v".to_string(),
            audio: "a".to_string(),
            how_to_merge: "ffmpeg ...".to_string(),
            note: "manual".to_string(),
        };
        let json = serde_json::to_value(&fallback).unwrap();
        assert_eq!(json["type"], "dash_fallback");
        assert!(json["howToMerge"].is_string());
    }

    #[test]
    fn test_temp_set_removes_existing_and_skips_missing() {
        let dir = std::env::temp_dir();
        let present = dir.join("dashgrab_test_present.tmp");
        let missing = dir.join("dashgrab_test_missing.tmp");
        std::fs::write(&present, b"x").unwrap();

        let mut set = TempFileSet::new();
        set.add(&present);
        set.add(&missing);

        let failures = set.remove_all();
        assert!(failures.is_empty());
        assert!(!present.exists());
    }
}
