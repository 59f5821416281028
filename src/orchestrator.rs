// Orchestrator — sequences resolve, select, acquire, merge, cleanup
//
// State machine:
//   ResolvingMetadata -> Selecting -> ReportingProgressiveDirect
//                                  -> AcquiringDash -> MergingDash -> CleaningUp -> Done
// with FallbackReporting reachable from AcquiringDash or MergingDash on
// failure. Metadata/selection failures are fatal (exit 2); everything past
// selection degrades to a fallback report instead of failing the process.

use std::path::{Path, PathBuf};

use crate::errors::{FatalError, SelectionError};
use crate::fetch::HttpFetcher;
use crate::merge::FfmpegMerger;
use crate::metadata::YtdlpResolver;
use crate::models::{
    FormatDescriptor, MethodOrder, Report, RetrievalJob, Selection, TempFileSet, VideoMetadata,
};
use crate::selector::{select, QUALITY_CEILING};
use crate::traits::{MetadataResolver, StreamFetcher, StreamMerger};
use crate::utils::sanitize_title;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    ResolvingMetadata,
    Selecting,
    ReportingProgressiveDirect,
    AcquiringDash,
    MergingDash,
    CleaningUp,
    FallbackReporting,
    Done,
}

fn log_stage(stage: Stage) {
    eprintln!("[run] Stage: {:?}", stage);
}

/// File names for one Dash run, derived once from the sanitized title
/// before either retrieval job starts.
#[derive(Debug, Clone)]
struct DashPlan {
    video_path: PathBuf,
    audio_path: PathBuf,
    output_path: PathBuf,
}

impl DashPlan {
    fn new(
        title: Option<&str>,
        video: &FormatDescriptor,
        audio: &FormatDescriptor,
        workdir: &Path,
    ) -> Self {
        let base = sanitize_title(title);
        let height = video.height.unwrap_or(0);
        Self {
            video_path: Self::place(workdir, format!("{}_video.{}", base, video.ext_or("mp4"))),
            audio_path: Self::place(workdir, format!("{}_audio.{}", base, audio.ext_or("m4a"))),
            output_path: Self::place(workdir, format!("{}_{}p_merged.mp4", base, height)),
        }
    }

    /// Keep names bare when running in the working directory, so reports
    /// carry "Clip_720p_merged.mp4" rather than "./Clip_720p_merged.mp4".
    fn place(workdir: &Path, name: String) -> PathBuf {
        if workdir == Path::new(".") {
            PathBuf::from(name)
        } else {
            workdir.join(name)
        }
    }
}

pub struct Orchestrator {
    resolver: Box<dyn MetadataResolver>,
    fetcher: Box<dyn StreamFetcher>,
    merger: Box<dyn StreamMerger>,
    workdir: PathBuf,
}

impl Orchestrator {
    pub fn new(
        resolver: Box<dyn MetadataResolver>,
        fetcher: Box<dyn StreamFetcher>,
        merger: Box<dyn StreamMerger>,
    ) -> Self {
        Self {
            resolver,
            fetcher,
            merger,
            workdir: PathBuf::from("."),
        }
    }

    /// Real collaborators: yt-dlp metadata, dual-method fetcher, ffmpeg.
    pub fn with_defaults() -> Self {
        Self::new(
            Box::new(YtdlpResolver::new()),
            Box::new(HttpFetcher::new()),
            Box::new(FfmpegMerger::new()),
        )
    }

    pub fn with_workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = dir.into();
        self
    }

    /// Run the whole pipeline for one URL.
    ///
    /// `Ok` covers both the fully automated outcomes and the degraded
    /// fallback report; `Err` is reserved for the nothing-usable class.
    pub async fn run(&self, url: &str) -> Result<Report, FatalError> {
        log_stage(Stage::ResolvingMetadata);
        eprintln!("[run] Resolving metadata via {}", self.resolver.name());
        let meta = self.resolver.resolve(url).await?;

        log_stage(Stage::Selecting);
        let selection = select(&meta.formats, QUALITY_CEILING).ok_or(SelectionError {
            ceiling: QUALITY_CEILING,
        })?;

        match selection {
            Selection::Progressive(format) => {
                log_stage(Stage::ReportingProgressiveDirect);
                // Final retrieval of a single muxed file is the caller's job
                let report = Report::Progressive {
                    height: format.height.unwrap_or(0),
                    ext: format.ext_or("mp4"),
                    url: format.url.clone().unwrap_or_default(),
                    note: "Progressive stream selected; fetch the URL directly".to_string(),
                };
                log_stage(Stage::Done);
                Ok(report)
            }
            Selection::Dash { video, audio } => Ok(self.run_dash(&meta, &video, &audio).await),
        }
    }

    /// Dash path: concurrent track retrieval, remux, cleanup. Never fails
    /// the process — every failure lands in the fallback report.
    async fn run_dash(
        &self,
        meta: &VideoMetadata,
        video: &FormatDescriptor,
        audio: &FormatDescriptor,
    ) -> Report {
        log_stage(Stage::AcquiringDash);

        let plan = DashPlan::new(meta.title.as_deref(), video, audio, &self.workdir);
        let video_url = video.url.clone().unwrap_or_default();
        let audio_url = audio.url.clone().unwrap_or_default();

        let mut temps = TempFileSet::new();
        temps.add(&plan.video_path);
        temps.add(&plan.audio_path);

        let video_job = RetrievalJob::new(&video_url, &plan.video_path, MethodOrder::DirectFirst);
        let audio_job =
            RetrievalJob::new(&audio_url, &plan.audio_path, MethodOrder::DelegatedFirst);

        // Both jobs in flight at once; no mid-flight cancellation — each is
        // awaited to its own success or failure before anything is cleaned.
        let (video_res, audio_res) = tokio::join!(
            self.fetcher.fetch(&video_job),
            self.fetcher.fetch(&audio_job)
        );

        let mut acquired = true;
        if let Err(e) = &video_res {
            eprintln!("[run] Video track acquisition failed: {}", e);
            acquired = false;
        }
        if let Err(e) = &audio_res {
            eprintln!("[run] Audio track acquisition failed: {}", e);
            acquired = false;
        }

        if acquired {
            log_stage(Stage::MergingDash);
            match self
                .merger
                .merge(
                    &plan.video_path,
                    &plan.audio_path,
                    &plan.output_path,
                    meta.duration,
                )
                .await
            {
                Ok(()) => {
                    log_stage(Stage::CleaningUp);
                    Self::cleanup(temps);
                    let report = Report::Merged {
                        output_file: plan.output_path.display().to_string(),
                        video: video_url,
                        audio: audio_url,
                        note: "Video and audio tracks downloaded and remuxed".to_string(),
                    };
                    log_stage(Stage::Done);
                    return report;
                }
                Err(e) => {
                    eprintln!("[run] Merge failed: {}", e);
                }
            }
        }

        log_stage(Stage::FallbackReporting);
        Self::cleanup(temps);
        Report::DashFallback {
            how_to_merge: Report::merge_command(&video_url, &audio_url, &plan.output_path),
            video: video_url,
            audio: audio_url,
            note: "Automatic acquisition failed; download both URLs yourself and run howToMerge"
                .to_string(),
        }
    }

    /// Best-effort temp removal. Failures are logged, never escalated.
    fn cleanup(temps: TempFileSet) {
        for failure in temps.remove_all() {
            eprintln!("[cleanup] {}", failure);
        }
    }
}
