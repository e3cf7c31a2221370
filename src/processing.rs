use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::error::{QuickBitsError, Result};
use crate::ledger::UploadLedger;
use crate::models::Video;
use crate::pipeline::ExtractionPipeline;
use crate::upload::{PlatformOutcome, UploadOrchestrator};
use crate::youtube::{html_entity_decode, VideoSource};

/// Result for a single video
#[derive(Debug, Clone, Serialize)]
pub struct VideoProcessingResult {
    pub video_id: String,
    pub title: String,
    pub status: ProcessingStatus,
    pub outcomes: Vec<PlatformOutcome>,
    pub error_message: Option<String>,
    pub processing_time: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProcessingStatus {
    /// Every platform has the clip (now or from an earlier run)
    Published,
    /// A clip was produced but at least one platform failed
    PartiallyPublished,
    /// No usable Quick Bits segment (no chapter, or no sound)
    Skipped,
    Failed,
}

/// Overall results of one batch run
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    /// Candidates looked at, including ones already uploaded everywhere
    pub considered: usize,
    pub already_uploaded: usize,
    pub processed: usize,
    pub published: usize,
    pub partially_published: usize,
    pub skipped: usize,
    pub failed: usize,
    pub total_time: Duration,
    pub results: Vec<VideoProcessingResult>,
}

impl BatchSummary {
    fn record(&mut self, result: VideoProcessingResult) {
        self.processed += 1;
        match result.status {
            ProcessingStatus::Published => self.published += 1,
            ProcessingStatus::PartiallyPublished => self.partially_published += 1,
            ProcessingStatus::Skipped => self.skipped += 1,
            ProcessingStatus::Failed => self.failed += 1,
        }
        self.results.push(result);
    }
}

/// Runs the pipeline and uploads over the latest videos plus the backlog
pub struct BatchProcessor {
    source: Arc<dyn VideoSource>,
    pipeline: ExtractionPipeline,
    orchestrator: UploadOrchestrator,
    ledger: Arc<UploadLedger>,
    max_videos_per_run: usize,
    backlog: Vec<Video>,
}

impl BatchProcessor {
    pub fn new(
        source: Arc<dyn VideoSource>,
        pipeline: ExtractionPipeline,
        orchestrator: UploadOrchestrator,
        ledger: Arc<UploadLedger>,
        max_videos_per_run: usize,
    ) -> Self {
        info!("🔧 Initializing BatchProcessor (max {} videos per run)", max_videos_per_run);
        Self {
            source,
            pipeline,
            orchestrator,
            ledger,
            max_videos_per_run,
            backlog: Vec::new(),
        }
    }

    /// Older videos to work through after the latest ones
    pub fn with_backlog(mut self, backlog: Vec<Video>) -> Self {
        self.backlog = backlog;
        self
    }

    /// Process latest videos, then the backlog, until `max_videos_per_run`
    /// videos went through the pipeline
    pub async fn run(&self) -> Result<BatchSummary> {
        let start_time = Instant::now();
        info!("🚀 Starting batch run...");

        let latest = self.source.get_latest_videos().await?;
        let candidates = merge_candidates(latest, &self.backlog);
        info!("📹 {} candidate videos ({} from backlog)", candidates.len(), self.backlog.len());

        let mut summary = BatchSummary::default();
        for video in &candidates {
            if summary.processed >= self.max_videos_per_run {
                info!("⏸️ Reached {} videos for this run", self.max_videos_per_run);
                break;
            }
            summary.considered += 1;

            match self.ledger.is_uploaded_to_all_platforms(&video.video_id).await {
                Ok(true) => {
                    debug!("Already on every platform: {}", video.video_id);
                    summary.already_uploaded += 1;
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    error!("Ledger lookup failed for {}: {}", video.video_id, e);
                    return Err(e);
                }
            }

            let result = self.process_video(video).await;
            summary.record(result);
        }

        summary.total_time = start_time.elapsed();
        info!(
            "🏁 Batch finished in {:.2}s: {} processed, {} published, {} partial, {} skipped, {} failed, {} already uploaded",
            summary.total_time.as_secs_f64(),
            summary.processed,
            summary.published,
            summary.partially_published,
            summary.skipped,
            summary.failed,
            summary.already_uploaded
        );

        Ok(summary)
    }

    /// Run one video through extraction and upload. Errors end up in the
    /// result, never in the caller.
    pub async fn process_video(&self, video: &Video) -> VideoProcessingResult {
        let start_time = Instant::now();
        let orchestrator = &self.orchestrator;

        let outcome = self
            .pipeline
            .run(video, |clip| async move { orchestrator.upload_to_platforms(&clip).await })
            .await;

        let (status, outcomes, error_message) = match outcome {
            Ok(outcomes) => {
                let failures: Vec<QuickBitsError> = outcomes.iter().filter_map(|o| o.error()).collect();
                for failure in &failures {
                    warn!("⚠️ {}: {}", video.video_id, failure);
                }
                let status = if failures.is_empty() {
                    ProcessingStatus::Published
                } else {
                    ProcessingStatus::PartiallyPublished
                };
                let message = (!failures.is_empty()).then(|| {
                    failures
                        .iter()
                        .map(|f| f.to_string())
                        .collect::<Vec<_>>()
                        .join("; ")
                });
                (status, outcomes, message)
            }
            Err(e) if e.is_skippable() => {
                info!("⏭️ Skipping {}: {}", video.video_id, e);
                (ProcessingStatus::Skipped, Vec::new(), Some(e.to_string()))
            }
            Err(e) => {
                error!("❌ Error handling video {} - {}: {}", video.video_id, video.title, e);
                (ProcessingStatus::Failed, Vec::new(), Some(e.to_string()))
            }
        };

        VideoProcessingResult {
            video_id: video.video_id.clone(),
            title: video.title.clone(),
            status,
            outcomes,
            error_message,
            processing_time: start_time.elapsed(),
        }
    }
}

/// Latest videos first, then backlog entries not already listed
fn merge_candidates(latest: Vec<Video>, backlog: &[Video]) -> Vec<Video> {
    let mut seen = HashSet::new();
    latest
        .into_iter()
        .chain(backlog.iter().cloned())
        .filter(|video| seen.insert(video.video_id.clone()))
        .collect()
}

/// Load a backlog JSON file (array of videos, newest first) and return it
/// oldest first with decoded titles
pub async fn load_backlog(path: &Path) -> Result<Vec<Video>> {
    let raw = tokio::fs::read_to_string(path).await?;
    let mut videos: Vec<Video> = serde_json::from_str(&raw)?;
    videos.reverse();
    for video in &mut videos {
        video.title = html_entity_decode(&video.title);
    }

    info!("📚 Loaded {} backlog videos from {}", videos.len(), path.display());
    Ok(videos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::SoundProbe;
    use crate::chapters::Chapter;
    use crate::models::{Clip, Platform};
    use crate::platforms::Uploader;
    use crate::video::ClipExtractor;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn video(id: &str) -> Video {
        Video {
            video_id: id.to_string(),
            title: format!("Video {}", id),
            published_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        }
    }

    /// Latest videos are fixed; videos whose id starts with "nochap" have no chapters
    struct FakeSource {
        latest: Vec<Video>,
        downloads: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl VideoSource for FakeSource {
        async fn get_latest_videos(&self) -> Result<Vec<Video>> {
            Ok(self.latest.clone())
        }

        async fn get_video_chapters(&self, video_id: &str) -> Result<Vec<Chapter>> {
            if video_id.starts_with("nochap") {
                return Ok(vec![]);
            }
            Ok(vec![Chapter::new("Intro", 0, 60), Chapter::new("Quick Bits", 60, 120)])
        }

        async fn download_video(&self, video: &Video, output_path: &Path) -> Result<()> {
            self.downloads.lock().unwrap().push(video.video_id.clone());
            tokio::fs::write(output_path, b"source").await?;
            Ok(())
        }
    }

    struct CopyExtractor;

    #[async_trait]
    impl ClipExtractor for CopyExtractor {
        async fn extract_chapter(&self, input: &Path, output: &Path, _start: u64, _duration: u64) -> Result<()> {
            tokio::fs::copy(input, output).await?;
            Ok(())
        }
    }

    struct LoudProbe;

    #[async_trait]
    impl SoundProbe for LoudProbe {
        async fn has_sound(&self, _path: &Path) -> Result<bool> {
            Ok(true)
        }
    }

    struct FakeUploader {
        platform: Platform,
        fail: bool,
    }

    #[async_trait]
    impl Uploader for FakeUploader {
        fn platform(&self) -> Platform {
            self.platform
        }

        async fn upload(&self, clip: &Clip) -> anyhow::Result<String> {
            if self.fail {
                anyhow::bail!("quota exceeded");
            }
            Ok(format!("{}-{}", self.platform, clip.id))
        }
    }

    struct Setup {
        processor: BatchProcessor,
        source: Arc<FakeSource>,
        ledger: Arc<UploadLedger>,
        _dir: TempDir,
    }

    async fn setup(latest: Vec<Video>, twitter_fails: bool, max_videos: usize) -> Setup {
        let dir = TempDir::new().unwrap();
        let ledger = Arc::new(UploadLedger::open("sqlite::memory:", Platform::ALL.to_vec()).await.unwrap());
        let source = Arc::new(FakeSource {
            latest,
            downloads: Mutex::new(Vec::new()),
        });
        let pipeline = ExtractionPipeline::new(source.clone(), Arc::new(CopyExtractor), Arc::new(LoudProbe), dir.path());
        let youtube: Arc<dyn Uploader> = Arc::new(FakeUploader {
            platform: Platform::YouTube,
            fail: false,
        });
        let twitter: Arc<dyn Uploader> = Arc::new(FakeUploader {
            platform: Platform::Twitter,
            fail: twitter_fails,
        });
        let uploaders = vec![youtube, twitter];
        let orchestrator = UploadOrchestrator::new(ledger.clone(), uploaders);
        let processor = BatchProcessor::new(source.clone(), pipeline, orchestrator, ledger.clone(), max_videos);

        Setup {
            processor,
            source,
            ledger,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn test_batch_publishes_and_skips() {
        let s = setup(vec![video("a"), video("nochap1")], false, 5).await;
        let summary = s.processor.run().await.unwrap();

        assert_eq!(summary.processed, 2);
        assert_eq!(summary.published, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 0);
        assert!(s.ledger.is_uploaded_to_all_platforms("a").await.unwrap());
        assert!(!s.ledger.is_uploaded_to_platform("nochap1", Platform::YouTube).await.unwrap());
    }

    #[tokio::test]
    async fn test_already_uploaded_videos_are_not_downloaded() {
        let s = setup(vec![video("a"), video("b")], false, 5).await;
        s.ledger.save_upload("a", Platform::YouTube, "y").await.unwrap();
        s.ledger.save_upload("a", Platform::Twitter, "t").await.unwrap();

        let summary = s.processor.run().await.unwrap();

        assert_eq!(summary.already_uploaded, 1);
        assert_eq!(summary.processed, 1);
        assert_eq!(*s.source.downloads.lock().unwrap(), vec!["b".to_string()]);
    }

    #[tokio::test]
    async fn test_partial_failure_is_retried_next_run() {
        let s = setup(vec![video("a")], true, 5).await;

        let first = s.processor.run().await.unwrap();
        assert_eq!(first.partially_published, 1);
        assert!(first.results[0].error_message.as_deref().unwrap().contains("twitter"));
        assert!(s.ledger.is_uploaded_to_platform("a", Platform::YouTube).await.unwrap());
        assert!(!s.ledger.is_uploaded_to_all_platforms("a").await.unwrap());

        // Not on every platform yet, so it is picked up again
        let second = s.processor.run().await.unwrap();
        assert_eq!(second.processed, 1);
        let youtube = &second.results[0].outcomes[0];
        assert_eq!(youtube.status, crate::upload::UploadStatus::AlreadyUploaded);
    }

    #[tokio::test]
    async fn test_max_videos_per_run_and_backlog_order() {
        let s = setup(vec![video("a")], false, 2).await;
        let processor = s.processor.with_backlog(vec![video("a"), video("old1"), video("old2")]);

        let summary = processor.run().await.unwrap();

        assert_eq!(summary.processed, 2);
        let ids: Vec<&str> = summary.results.iter().map(|r| r.video_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "old1"]);
    }

    #[tokio::test]
    async fn test_load_backlog_reverses_and_decodes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("videos.json");
        tokio::fs::write(
            &path,
            r#"[
                {"videoId": "new", "title": "Newest &amp; best", "publishedAt": "2024-05-02T00:00:00Z"},
                {"videoId": "old", "title": "Oldest", "publishedAt": "2024-05-01T00:00:00Z"}
            ]"#,
        )
        .await
        .unwrap();

        let backlog = load_backlog(&path).await.unwrap();
        assert_eq!(backlog[0].video_id, "old");
        assert_eq!(backlog[1].title, "Newest & best");
    }

    #[tokio::test]
    async fn test_load_backlog_missing_file() {
        let result = load_backlog(Path::new("/nonexistent/videos.json")).await;
        assert!(matches!(result, Err(QuickBitsError::Io(_))));
    }
}
