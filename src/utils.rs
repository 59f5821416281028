// Shared helpers: subprocess execution, tool discovery, naming

use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::Command as TokioCommand;
use tokio::time::{timeout, Duration};

/// Characters that cannot appear in a derived file name
const HOSTILE_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Maximum length of a derived base name, in characters
const MAX_BASENAME_CHARS: usize = 80;

/// Placeholder base name when the source has no usable title
const DEFAULT_BASENAME: &str = "video";

/// Run command with timeout, capturing stdout and stderr.
pub async fn run_output_with_timeout(
    program: &str,
    args: Vec<String>,
    timeout_secs: u64,
) -> Result<std::process::Output, String> {
    let mut child = TokioCommand::new(program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| format!("Failed to start {}: {}", program, e))?;

    let mut stdout_pipe = child
        .stdout
        .take()
        .ok_or_else(|| format!("Failed to capture stdout from {}", program))?;
    let mut stderr_pipe = child
        .stderr
        .take()
        .ok_or_else(|| format!("Failed to capture stderr from {}", program))?;

    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stdout_pipe
            .read_to_end(&mut buf)
            .await
            .map_err(|e| format!("Failed to read stdout: {}", e))?;
        Ok::<Vec<u8>, String>(buf)
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stderr_pipe
            .read_to_end(&mut buf)
            .await
            .map_err(|e| format!("Failed to read stderr: {}", e))?;
        Ok::<Vec<u8>, String>(buf)
    });

    let waited = timeout(Duration::from_secs(timeout_secs), child.wait()).await;
    match waited {
        Ok(status_res) => {
            let status =
                status_res.map_err(|e| format!("Failed to wait for {}: {}", program, e))?;
            let stdout = stdout_task
                .await
                .map_err(|e| format!("stdout task failed: {}", e))??;
            let stderr = stderr_task
                .await
                .map_err(|e| format!("stderr task failed: {}", e))??;
            Ok(std::process::Output {
                status,
                stdout,
                stderr,
            })
        }
        Err(_) => {
            let _ = child.kill().await;
            stdout_task.abort();
            stderr_task.abort();
            Err(format!("Timed out after {}s", timeout_secs))
        }
    }
}

/// Find a tool binary, probing common install locations before PATH.
fn find_tool(name: &str) -> String {
    let common_paths = [
        format!("/opt/homebrew/bin/{}", name),
        format!("/usr/local/bin/{}", name),
        format!("/usr/bin/{}", name),
    ];

    for path in &common_paths {
        if std::path::Path::new(path).exists() {
            return path.clone();
        }
    }

    // Hope it's in PATH
    name.to_string()
}

pub fn find_ytdlp() -> String {
    find_tool("yt-dlp")
}

pub fn find_ffmpeg() -> String {
    find_tool("ffmpeg")
}

/// Proxy URL from the standard environment variables, if any.
/// Forwarded to yt-dlp via --proxy; the HTTP client picks these up itself.
pub fn detect_proxy() -> Option<String> {
    for var in ["HTTPS_PROXY", "https_proxy", "HTTP_PROXY", "http_proxy", "ALL_PROXY"] {
        if let Ok(value) = std::env::var(var) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }
    None
}

/// Derive a filesystem-safe base name from a video title.
///
/// Strips filesystem-hostile characters, truncates to 80 characters, and
/// falls back to a fixed placeholder for empty or missing titles.
pub fn sanitize_title(title: Option<&str>) -> String {
    let cleaned: String = title
        .unwrap_or("")
        .chars()
        .filter(|c| !HOSTILE_CHARS.contains(c))
        .take(MAX_BASENAME_CHARS)
        .collect();

    let trimmed = cleaned.trim().to_string();
    if trimmed.is_empty() {
        DEFAULT_BASENAME.to_string()
    } else {
        trimmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_hostile_chars() {
        let name = sanitize_title(Some("A/B:C*D"));
        assert_eq!(name, "ABCD");
        for c in HOSTILE_CHARS {
            assert!(!name.contains(*c));
        }
    }

    #[test]
    fn test_sanitize_truncates_long_titles() {
        let long = "x".repeat(300);
        assert_eq!(sanitize_title(Some(&long)).chars().count(), 80);
    }

    #[test]
    fn test_sanitize_falls_back_on_empty() {
        assert_eq!(sanitize_title(None), "video");
        assert_eq!(sanitize_title(Some("")), "video");
        assert_eq!(sanitize_title(Some("///")), "video");
    }

    #[tokio::test]
    async fn test_run_output_with_timeout_captures_stdout() {
        let out = run_output_with_timeout("echo", vec!["hello".to_string()], 5)
            .await
            .unwrap();
        assert!(out.status.success());
        assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), "hello");
    }

    #[tokio::test]
    async fn test_run_output_with_timeout_kills_slow_process() {
        let err = run_output_with_timeout("sleep", vec!["10".to_string()], 1)
            .await
            .unwrap_err();
        assert!(err.contains("Timed out"));
    }
}
