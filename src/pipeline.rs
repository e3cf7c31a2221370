//! Quick Bits extraction pipeline
//!
//! Locate the chapter and download the source concurrently, check the source
//! has sound, cut the padded chapter with a vertical crop, check the clip has
//! sound, then hand the clip to a consumer. Working files for the video are
//! removed on every exit path, after the consumer is done with the clip.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::audio::SoundProbe;
use crate::chapters::{find_quick_bits_chapter, DEFAULT_QUICK_BITS_NAMES};
use crate::error::{QuickBitsError, Result};
use crate::models::{Clip, Video};
use crate::video::{ClipExtractor, ClipWindow, CLIP_PADDING_SECONDS};
use crate::youtube::VideoSource;

pub struct ExtractionPipeline {
    source: Arc<dyn VideoSource>,
    extractor: Arc<dyn ClipExtractor>,
    probe: Arc<dyn SoundProbe>,
    working_dir: PathBuf,
    chapter_names: Vec<String>,
    padding_seconds: u64,
}

impl ExtractionPipeline {
    pub fn new(
        source: Arc<dyn VideoSource>,
        extractor: Arc<dyn ClipExtractor>,
        probe: Arc<dyn SoundProbe>,
        working_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source,
            extractor,
            probe,
            working_dir: working_dir.into(),
            chapter_names: DEFAULT_QUICK_BITS_NAMES.iter().map(|s| s.to_string()).collect(),
            padding_seconds: CLIP_PADDING_SECONDS,
        }
    }

    pub fn with_chapter_names(mut self, chapter_names: Vec<String>) -> Self {
        self.chapter_names = chapter_names;
        self
    }

    pub fn with_padding(mut self, padding_seconds: u64) -> Self {
        self.padding_seconds = padding_seconds;
        self
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn source_path(&self, video_id: &str) -> PathBuf {
        self.working_dir.join(format!("{}.mp4", video_id))
    }

    pub fn clip_path(&self, video_id: &str) -> PathBuf {
        self.working_dir.join(format!("{}_quick_bits.mp4", video_id))
    }

    /// Produce the Quick Bits clip for `video` and pass it to `consume`.
    ///
    /// The clip file exists for as long as `consume` runs and is deleted
    /// afterwards, together with the downloaded source.
    pub async fn run<F, Fut, T>(&self, video: &Video, consume: F) -> Result<T>
    where
        F: FnOnce(Clip) -> Fut,
        Fut: Future<Output = T>,
    {
        tokio::fs::create_dir_all(&self.working_dir).await?;

        let outcome = match self.extract(video).await {
            Ok(clip) => Ok(consume(clip).await),
            Err(e) => Err(e),
        };

        let removed = cleanup_working_files(&self.working_dir, &video.video_id).await;
        debug!("🧹 Removed {} working files for {}", removed, video.video_id);

        outcome
    }

    async fn extract(&self, video: &Video) -> Result<Clip> {
        let video_id = video.video_id.as_str();
        let source_path = self.source_path(video_id);
        let clip_path = self.clip_path(video_id);

        info!("🎬 Processing video {}: {}", video_id, video.title);

        // Extraction waits for both
        let (chapters, download) = tokio::join!(
            self.source.get_video_chapters(video_id),
            self.source.download_video(video, &source_path)
        );
        let chapters = chapters?;
        download?;

        let chapter = find_quick_bits_chapter(&chapters, &self.chapter_names)
            .cloned()
            .ok_or_else(|| QuickBitsError::NoChapterFound(video_id.to_string()))?;
        info!(
            "📍 Quick Bits chapter for {}: '{}' ({}s to {}s)",
            video_id, chapter.title, chapter.start, chapter.end
        );

        if !self.probe.has_sound(&source_path).await? {
            return Err(QuickBitsError::NoAudioInSource(video_id.to_string()));
        }

        let window = ClipWindow::around(&chapter, self.padding_seconds);
        self.extractor
            .extract_chapter(&source_path, &clip_path, window.start, window.duration)
            .await?;

        if !self.probe.has_sound(&clip_path).await? {
            return Err(QuickBitsError::SilentClip(video_id.to_string()));
        }

        info!("✅ Clip ready for {}: {}", video_id, clip_path.display());
        Ok(Clip {
            id: video.video_id.clone(),
            title: video.title.clone(),
            path: clip_path,
            published_at: video.published_at,
        })
    }
}

/// Delete every file in `dir` named `<video_id>.*` or `<video_id>_*`.
/// Failures are logged and skipped. Returns the number of files removed.
pub async fn cleanup_working_files(dir: &Path, video_id: &str) -> usize {
    let dot_prefix = format!("{}.", video_id);
    let underscore_prefix = format!("{}_", video_id);

    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Cannot list {} for cleanup: {}", dir.display(), e);
            return 0;
        }
    };

    let mut removed = 0;
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                warn!("Cleanup of {} stopped early: {}", dir.display(), e);
                break;
            }
        };

        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !name.starts_with(&dot_prefix) && !name.starts_with(&underscore_prefix) {
            continue;
        }

        match tokio::fs::remove_file(entry.path()).await {
            Ok(()) => removed += 1,
            Err(e) => warn!("Failed to remove {}: {}", entry.path().display(), e),
        }
    }

    removed
}
