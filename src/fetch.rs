// Retrieval engine — two acquisition methods with layered retry/fallback
//
// Method (a): direct streaming HTTP GET with browser-shaped headers,
// written to disk incrementally. Retried with backoff before giving up.
// Method (b): yt-dlp's own downloader, which copes better with hosts that
// need source-specific anti-bot handling.
//
// Video jobs run (a) then (b); audio jobs run (b) then (a) — audio
// endpoints fail the direct method far more often in practice.

use async_trait::async_trait;
use futures::StreamExt;
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command as TokioCommand;
use tokio::time::{sleep, Duration};

use crate::errors::FetchError;
use crate::models::{MethodOrder, RetrievalJob};
use crate::traits::StreamFetcher;
use crate::utils::{detect_proxy, find_ytdlp};

pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36";
pub const REFERER: &str = "https://www.youtube.com/";
pub const ORIGIN: &str = "https://www.youtube.com";

/// Attempt ceiling for the direct method
const MAX_DIRECT_ATTEMPTS: u32 = 3;

/// Whole-request bound for one direct attempt, headers through last byte
const DIRECT_TIMEOUT_SECS: u64 = 300;

/// Backoff before retrying the direct method. Blocks only this job's task.
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(u64::from(attempt) * 2)
}

/// The two interchangeable acquisition methods, as a seam so the
/// order/fallback policy below can run against in-process fakes.
#[async_trait]
trait AcquisitionMethods: Send + Sync {
    /// Direct HTTP method, retries included
    async fn direct(&self, job: &RetrievalJob) -> Result<(), FetchError>;

    /// Delegated-downloader method
    async fn delegated(&self, job: &RetrievalJob) -> Result<(), FetchError>;
}

/// Try the job's primary method; on exhaustion, try the other one.
/// Both failing is terminal for the job.
async fn fetch_with_fallback<M>(methods: &M, job: &RetrievalJob) -> Result<(), FetchError>
where
    M: AcquisitionMethods + ?Sized,
{
    let first = match job.order {
        MethodOrder::DirectFirst => methods.direct(job).await,
        MethodOrder::DelegatedFirst => methods.delegated(job).await,
    };

    let first_error = match first {
        Ok(()) => return Ok(()),
        Err(e) => e,
    };

    eprintln!("[fetch] Primary method exhausted ({}), trying the other", first_error);

    let second = match job.order {
        MethodOrder::DirectFirst => methods.delegated(job).await,
        MethodOrder::DelegatedFirst => methods.direct(job).await,
    };

    second.map_err(|second_error| FetchError::Exhausted {
        url: job.url.clone(),
        first: first_error.to_string(),
        second: second_error.to_string(),
    })
}

pub struct HttpFetcher {
    ytdlp_path: String,
    proxy: Option<String>,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            ytdlp_path: find_ytdlp(),
            proxy: detect_proxy(),
        }
    }

    /// One direct attempt: GET with browser headers, stream to disk.
    /// The payload is never buffered whole in memory.
    async fn direct_once(&self, url: &str, dest: &Path) -> Result<(), FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DIRECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let response = client
            .get(url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .header(reqwest::header::REFERER, REFERER)
            .header(reqwest::header::ORIGIN, ORIGIN)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            if status.as_u16() == 403 {
                eprintln!("[fetch] Got 403 Forbidden — host is likely blocking direct access");
            }
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| FetchError::Io(format!("{}: {}", dest.display(), e)))?;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let data = chunk.map_err(|e| FetchError::Network(e.to_string()))?;
            file.write_all(&data)
                .await
                .map_err(|e| FetchError::Io(format!("{}: {}", dest.display(), e)))?;
        }
        file.flush()
            .await
            .map_err(|e| FetchError::Io(format!("{}: {}", dest.display(), e)))?;

        Ok(())
    }

    fn delegated_args(&self, job: &RetrievalJob) -> Vec<String> {
        let mut args = vec![
            "--no-warnings".to_string(),
            "--no-check-certificates".to_string(),
            "--user-agent".to_string(),
            USER_AGENT.to_string(),
            "--referer".to_string(),
            REFERER.to_string(),
            "-o".to_string(),
            job.dest.display().to_string(),
        ];

        if let Some(proxy) = &self.proxy {
            args.push("--proxy".to_string());
            args.push(proxy.clone());
        }

        args.push(job.url.clone());
        args
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AcquisitionMethods for HttpFetcher {
    /// Direct method with retry: up to MAX_DIRECT_ATTEMPTS with increasing
    /// backoff before the method as a whole counts as failed.
    async fn direct(&self, job: &RetrievalJob) -> Result<(), FetchError> {
        let mut last_error = FetchError::Network("no attempt made".to_string());

        for attempt in 1..=MAX_DIRECT_ATTEMPTS {
            eprintln!(
                "[fetch] Direct attempt {}/{} -> {}",
                attempt,
                MAX_DIRECT_ATTEMPTS,
                job.dest.display()
            );
            match self.direct_once(&job.url, &job.dest).await {
                Ok(()) => {
                    eprintln!("[fetch] Direct fetch succeeded: {}", job.dest.display());
                    return Ok(());
                }
                Err(e) => {
                    eprintln!("[fetch] Direct attempt {} failed: {}", attempt, e);
                    last_error = e;
                    if attempt < MAX_DIRECT_ATTEMPTS {
                        sleep(backoff_delay(attempt)).await;
                    }
                }
            }
        }

        Err(last_error)
    }

    /// Delegated method: hand the URL to yt-dlp's downloader. Its own
    /// timeout policy applies; we only watch the exit status.
    async fn delegated(&self, job: &RetrievalJob) -> Result<(), FetchError> {
        let args = self.delegated_args(job);
        eprintln!("[fetch] Delegating to {} -> {}", self.ytdlp_path, job.dest.display());

        let output = TokioCommand::new(&self.ytdlp_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| FetchError::ToolFailed(format!("{}: {}", self.ytdlp_path, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail = stderr
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("no error output")
                .to_string();
            return Err(FetchError::ToolFailed(tail));
        }

        eprintln!("[fetch] Delegated fetch succeeded: {}", job.dest.display());
        Ok(())
    }
}

#[async_trait]
impl StreamFetcher for HttpFetcher {
    async fn fetch(&self, job: &RetrievalJob) -> Result<(), FetchError> {
        fetch_with_fallback(self, job).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_backoff_increases_with_attempt_index() {
        assert_eq!(backoff_delay(1), Duration::from_secs(2));
        assert_eq!(backoff_delay(2), Duration::from_secs(4));
        assert!(backoff_delay(2) > backoff_delay(1));
    }

    #[test]
    fn test_delegated_args_shape() {
        let fetcher = HttpFetcher {
            ytdlp_path: "yt-dlp".to_string(),
            proxy: None,
        };
        let job = RetrievalJob::new(
            "https://example.com/audio.m4a",
            "clip_audio.m4a",
            MethodOrder::DelegatedFirst,
        );
        let args = fetcher.delegated_args(&job);

        let o_pos = args.iter().position(|a| a == "-o").unwrap();
        assert_eq!(args[o_pos + 1], "clip_audio.m4a");
        assert!(args.contains(&"--user-agent".to_string()));
        assert!(args.contains(&"--referer".to_string()));
        assert_eq!(args.last().unwrap(), "https://example.com/audio.m4a");
    }

    #[test]
    fn test_delegated_args_include_proxy_when_set() {
        let fetcher = HttpFetcher {
            ytdlp_path: "yt-dlp".to_string(),
            proxy: Some("socks5://127.0.0.1:1080".to_string()),
        };
        let job = RetrievalJob::new("https://example.com/v", "v.mp4", MethodOrder::DirectFirst);
        let args = fetcher.delegated_args(&job);
        let p_pos = args.iter().position(|a| a == "--proxy").unwrap();
        assert_eq!(args[p_pos + 1], "socks5://127.0.0.1:1080");
    }

    /// Records which methods ran, in order, and fails the configured ones.
    struct FakeMethods {
        direct_fails: bool,
        delegated_fails: bool,
        calls: Mutex<Vec<&'static str>>,
    }

    impl FakeMethods {
        fn new(direct_fails: bool, delegated_fails: bool) -> Self {
            Self {
                direct_fails,
                delegated_fails,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AcquisitionMethods for FakeMethods {
        async fn direct(&self, _job: &RetrievalJob) -> Result<(), FetchError> {
            self.calls.lock().unwrap().push("direct");
            if self.direct_fails {
                Err(FetchError::HttpStatus(403))
            } else {
                Ok(())
            }
        }

        async fn delegated(&self, _job: &RetrievalJob) -> Result<(), FetchError> {
            self.calls.lock().unwrap().push("delegated");
            if self.delegated_fails {
                Err(FetchError::ToolFailed("exited 1".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn job(order: MethodOrder) -> RetrievalJob {
        RetrievalJob::new("https://example.com/track", "track.bin", order)
    }

    #[tokio::test]
    async fn test_direct_first_stops_after_primary_success() {
        let methods = FakeMethods::new(false, false);
        fetch_with_fallback(&methods, &job(MethodOrder::DirectFirst))
            .await
            .unwrap();
        assert_eq!(methods.calls(), vec!["direct"]);
    }

    #[tokio::test]
    async fn test_delegated_first_stops_after_primary_success() {
        let methods = FakeMethods::new(false, false);
        fetch_with_fallback(&methods, &job(MethodOrder::DelegatedFirst))
            .await
            .unwrap();
        assert_eq!(methods.calls(), vec!["delegated"]);
    }

    #[tokio::test]
    async fn test_direct_exhaustion_falls_back_to_delegated() {
        let methods = FakeMethods::new(true, false);
        fetch_with_fallback(&methods, &job(MethodOrder::DirectFirst))
            .await
            .unwrap();
        assert_eq!(methods.calls(), vec!["direct", "delegated"]);
    }

    #[tokio::test]
    async fn test_delegated_exhaustion_falls_back_to_direct() {
        let methods = FakeMethods::new(false, true);
        fetch_with_fallback(&methods, &job(MethodOrder::DelegatedFirst))
            .await
            .unwrap();
        assert_eq!(methods.calls(), vec!["delegated", "direct"]);
    }

    #[tokio::test]
    async fn test_both_methods_failing_is_terminal_with_both_causes() {
        let methods = FakeMethods::new(true, true);
        let err = fetch_with_fallback(&methods, &job(MethodOrder::DirectFirst))
            .await
            .unwrap_err();
        assert_eq!(methods.calls(), vec!["direct", "delegated"]);
        match err {
            FetchError::Exhausted { url, first, second } => {
                assert_eq!(url, "https://example.com/track");
                assert!(first.contains("403"));
                assert!(second.contains("exited 1"));
            }
            other => panic!("expected Exhausted, got {:?}", other),
        }
    }
}
