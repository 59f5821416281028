// Merge engine — ffmpeg remux of two local tracks into one container
//
// Stream copy only, no re-encoding. ffmpeg runs with `-progress pipe:1` so
// it emits discrete key=value lifecycle lines on stdout; completion is
// signaled by the terminal `progress=end` line plus a zero exit status,
// never assumed from silence.

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command as TokioCommand;

use crate::errors::MergeError;
use crate::traits::StreamMerger;
use crate::utils::find_ffmpeg;

lazy_static! {
    // out_time_ms is microseconds despite the name
    static ref OUT_TIME_RE: Regex = Regex::new(r"^out_time_ms=(\d+)").unwrap();
    static ref END_RE: Regex = Regex::new(r"^progress=end").unwrap();
}

/// Parse one `-progress` line into an advisory fraction, when the source
/// duration is known.
fn parse_progress_line(line: &str, duration_secs: Option<f64>) -> Option<f32> {
    let caps = OUT_TIME_RE.captures(line)?;
    let micros: f64 = caps.get(1)?.as_str().parse().ok()?;
    let duration = duration_secs.filter(|d| *d > 0.0)?;
    let fraction = (micros / 1_000_000.0 / duration) as f32;
    Some(fraction.clamp(0.0, 1.0))
}

pub struct FfmpegMerger {
    ffmpeg_path: String,
}

impl FfmpegMerger {
    pub fn new() -> Self {
        Self {
            ffmpeg_path: find_ffmpeg(),
        }
    }

    fn build_args(video: &Path, audio: &Path, output: &Path) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-i".to_string(),
            video.display().to_string(),
            "-i".to_string(),
            audio.display().to_string(),
            "-c".to_string(),
            "copy".to_string(),
            "-avoid_negative_ts".to_string(),
            "make_zero".to_string(),
            "-progress".to_string(),
            "pipe:1".to_string(),
            output.display().to_string(),
        ]
    }
}

impl Default for FfmpegMerger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StreamMerger for FfmpegMerger {
    async fn merge(
        &self,
        video: &Path,
        audio: &Path,
        output: &Path,
        duration: Option<f64>,
    ) -> Result<(), MergeError> {
        let args = Self::build_args(video, audio, output);
        eprintln!("[merge] Starting: {} {}", self.ffmpeg_path, args.join(" "));

        let mut child = TokioCommand::new(&self.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| MergeError::Spawn(e.to_string()))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MergeError::Spawn("failed to capture stdout".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| MergeError::Spawn("failed to capture stderr".to_string()))?;

        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf).await;
            buf
        });

        // Watch the progress stream for the terminal done event
        let mut end_seen = false;
        let mut last_logged = -1i32;
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if END_RE.is_match(&line) {
                end_seen = true;
            }
            if let Some(fraction) = parse_progress_line(&line, duration) {
                let percent = (fraction * 100.0) as i32;
                // one log line per whole percent, not per update
                if percent > last_logged {
                    last_logged = percent;
                    eprintln!("[merge] Progress: {}%", percent);
                }
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| MergeError::Spawn(e.to_string()))?;
        let stderr_output = stderr_task.await.unwrap_or_default();

        if !status.success() {
            return Err(MergeError::Exited {
                code: status.code(),
                stderr: stderr_output
                    .lines()
                    .take(3)
                    .collect::<Vec<_>>()
                    .join(" | "),
            });
        }
        if !end_seen {
            return Err(MergeError::NoEndEvent);
        }

        eprintln!("[merge] Done: {}", output.display());
        Ok(())
    }
}
