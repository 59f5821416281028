// Collaborator seams
//
// The orchestrator only ever talks to the metadata engine, the retrieval
// engine, and the remux engine through these traits, so the whole pipeline
// can run against in-process fakes in tests.

use async_trait::async_trait;
use std::path::Path;

use crate::errors::{FetchError, MergeError, MetadataError};
use crate::models::{RetrievalJob, VideoMetadata};

/// Turns a page URL into validated metadata (title, duration, formats).
#[async_trait]
pub trait MetadataResolver: Send + Sync {
    /// Name for logging
    fn name(&self) -> &'static str;

    async fn resolve(&self, url: &str) -> Result<VideoMetadata, MetadataError>;
}

/// Materializes one remote resource to a local path.
#[async_trait]
pub trait StreamFetcher: Send + Sync {
    async fn fetch(&self, job: &RetrievalJob) -> Result<(), FetchError>;
}

/// Remuxes two local tracks into one output container.
#[async_trait]
pub trait StreamMerger: Send + Sync {
    /// `duration` is the source duration in seconds, when known; used only
    /// for advisory progress reporting.
    async fn merge(
        &self,
        video: &Path,
        audio: &Path,
        output: &Path,
        duration: Option<f64>,
    ) -> Result<(), MergeError>;
}
