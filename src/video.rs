use async_trait::async_trait;
use std::path::Path;
use tracing::{info, warn};

use crate::chapters::Chapter;
use crate::error::{QuickBitsError, Result};
use crate::tools::run_tool;

/// Centered crop to a 9:16 frame at full source height
pub const VERTICAL_CROP_FILTER: &str = "crop=ih*9/16:ih";

/// Seconds of lead-in and lead-out added around the chapter
pub const CLIP_PADDING_SECONDS: u64 = 2;

/// Time range handed to the extractor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipWindow {
    pub start: u64,
    pub duration: u64,
}

impl ClipWindow {
    /// Pad a chapter with `padding` seconds on both sides. The lead-in is
    /// clamped at the start of the video; the clip always ends `padding`
    /// seconds after the chapter.
    pub fn around(chapter: &Chapter, padding: u64) -> Self {
        let start = chapter.start.saturating_sub(padding);
        let lead_in = chapter.start - start;
        Self {
            start,
            duration: lead_in + chapter.duration + padding,
        }
    }
}

/// Cuts a time range out of a source video
#[async_trait]
pub trait ClipExtractor: Send + Sync {
    async fn extract_chapter(
        &self,
        input_path: &Path,
        output_path: &Path,
        start_seconds: u64,
        duration_seconds: u64,
    ) -> Result<()>;
}

/// ffmpeg-backed extractor that re-encodes with a vertical crop
#[derive(Debug, Clone)]
pub struct FfmpegExtractor {
    ffmpeg_path: String,
}

impl FfmpegExtractor {
    pub fn new(ffmpeg_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }

    /// Command line for one extraction. `-ss` before `-i` seeks on input;
    /// since the stream is re-encoded the cut is still frame accurate.
    pub fn build_args(
        input_path: &Path,
        output_path: &Path,
        start_seconds: u64,
        duration_seconds: u64,
    ) -> Vec<String> {
        vec![
            "-hide_banner".to_string(),
            "-nostdin".to_string(),
            "-y".to_string(),
            "-ss".to_string(),
            start_seconds.to_string(),
            "-i".to_string(),
            input_path.to_string_lossy().into_owned(),
            "-t".to_string(),
            duration_seconds.to_string(),
            "-vf".to_string(),
            VERTICAL_CROP_FILTER.to_string(),
            output_path.to_string_lossy().into_owned(),
        ]
    }
}

impl Default for FfmpegExtractor {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

#[async_trait]
impl ClipExtractor for FfmpegExtractor {
    async fn extract_chapter(
        &self,
        input_path: &Path,
        output_path: &Path,
        start_seconds: u64,
        duration_seconds: u64,
    ) -> Result<()> {
        info!(
            "✂️ Extracting {}s from {} starting at {}s",
            duration_seconds,
            input_path.display(),
            start_seconds
        );

        let args = Self::build_args(input_path, output_path, start_seconds, duration_seconds);
        let output = run_tool(&self.ffmpeg_path, &args)
            .await
            .map_err(|e| QuickBitsError::ExtractionFailed(format!("failed to run {}: {}", self.ffmpeg_path, e)))?;

        if !output.success() {
            let detail = output.stderr_tail(5);
            warn!("ffmpeg failed for {}: {}", input_path.display(), detail);
            return Err(QuickBitsError::ExtractionFailed(format!(
                "ffmpeg exited with {} for {}: {}",
                output.status,
                input_path.display(),
                detail
            )));
        }

        info!("✅ Chapter extracted: {}", output_path.display());
        Ok(())
    }
}
