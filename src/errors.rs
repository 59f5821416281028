// Error types for the acquisition pipeline

use std::fmt;
use std::path::PathBuf;

/// Metadata collaborator failed: unreachable tool or unusable output.
/// Fatal — nothing can be produced without format data.
#[derive(Debug, Clone)]
pub enum MetadataError {
    /// yt-dlp binary could not be started
    ToolNotFound(String),

    /// yt-dlp exited non-zero or timed out
    ExecutionFailed(String),

    /// stdout was not the JSON document the contract promises
    InvalidJson(String),

    /// The document parsed but carried no usable formats
    NoFormats,
}

impl fmt::Display for MetadataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ToolNotFound(tool) => write!(f, "Tool not found: {}", tool),
            Self::ExecutionFailed(msg) => write!(f, "Metadata extraction failed: {}", msg),
            Self::InvalidJson(msg) => write!(f, "Invalid metadata JSON: {}", msg),
            Self::NoFormats => write!(f, "Metadata contained no downloadable formats"),
        }
    }
}

impl std::error::Error for MetadataError {}

/// No candidate representation met the quality ceiling. Fatal.
#[derive(Debug, Clone)]
pub struct SelectionError {
    pub ceiling: u32,
}

impl fmt::Display for SelectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "No muxed or video+audio format pair available at or below {}p",
            self.ceiling
        )
    }
}

impl std::error::Error for SelectionError {}

/// One acquisition attempt (or a whole method, or both methods) failed.
/// Recovered at the orchestrator by falling back to manual instructions.
#[derive(Debug, Clone)]
pub enum FetchError {
    /// Server answered with a non-2xx status. 403 gets its own message
    /// (anti-bot blocking is the usual culprit) but no special handling.
    HttpStatus(u16),

    /// Transport-level error from the HTTP client
    Network(String),

    /// Destination file could not be created or written
    Io(String),

    /// Delegated downloader exited non-zero or could not be started
    ToolFailed(String),

    /// Both acquisition methods exhausted for one track
    Exhausted {
        url: String,
        first: String,
        second: String,
    },
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HttpStatus(403) => write!(f, "HTTP 403 Forbidden (likely anti-bot blocking)"),
            Self::HttpStatus(code) => write!(f, "HTTP status {}", code),
            Self::Network(msg) => write!(f, "Network error: {}", msg),
            Self::Io(msg) => write!(f, "Write error: {}", msg),
            Self::ToolFailed(msg) => write!(f, "Delegated downloader failed: {}", msg),
            Self::Exhausted { url, first, second } => write!(
                f,
                "All acquisition methods failed for {} (first: {}; second: {})",
                url, first, second
            ),
        }
    }
}

impl std::error::Error for FetchError {}

/// Remux collaborator failure. Recovered the same way as FetchError.
#[derive(Debug, Clone)]
pub enum MergeError {
    /// ffmpeg could not be started
    Spawn(String),

    /// ffmpeg exited non-zero
    Exited { code: Option<i32>, stderr: String },

    /// Process exited zero but never emitted its terminal done event
    NoEndEvent,
}

impl fmt::Display for MergeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spawn(msg) => write!(f, "Failed to start ffmpeg: {}", msg),
            Self::Exited { code, stderr } => {
                write!(f, "ffmpeg exited with code {:?}: {}", code, stderr)
            }
            Self::NoEndEvent => write!(f, "ffmpeg finished without signaling completion"),
        }
    }
}

impl std::error::Error for MergeError {}

/// A temp file could not be removed. Logged only, never escalated.
#[derive(Debug)]
pub struct CleanupError {
    pub path: PathBuf,
    pub source: std::io::Error,
}

impl fmt::Display for CleanupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Could not remove {}: {}", self.path.display(), self.source)
    }
}

impl std::error::Error for CleanupError {}

/// The exit-code-2 class: failures before any degraded output is possible.
#[derive(Debug, Clone)]
pub enum FatalError {
    Metadata(MetadataError),
    Selection(SelectionError),
}

impl fmt::Display for FatalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Metadata(e) => write!(f, "{}", e),
            Self::Selection(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for FatalError {}

impl From<MetadataError> for FatalError {
    fn from(e: MetadataError) -> Self {
        Self::Metadata(e)
    }
}

impl From<SelectionError> for FatalError {
    fn from(e: SelectionError) -> Self {
        Self::Selection(e)
    }
}
