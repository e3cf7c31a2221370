use async_trait::async_trait;
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, info};

use crate::error::{QuickBitsError, Result};
use crate::tools::run_tool;

/// Mean volume at or below this is treated as silence
pub const DEFAULT_AUDIBLE_THRESHOLD_DB: f64 = -90.0;

/// Answers "does this file carry audible sound?"
#[async_trait]
pub trait SoundProbe: Send + Sync {
    async fn has_sound(&self, path: &Path) -> Result<bool>;
}

/// Audio presence and loudness checks built on ffprobe and ffmpeg
#[derive(Debug, Clone)]
pub struct AudioValidator {
    ffmpeg_path: String,
    ffprobe_path: String,
    audible_threshold_db: f64,
}

impl AudioValidator {
    pub fn new(ffmpeg_path: impl Into<String>, ffprobe_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: ffprobe_path.into(),
            audible_threshold_db: DEFAULT_AUDIBLE_THRESHOLD_DB,
        }
    }

    pub fn with_threshold(mut self, audible_threshold_db: f64) -> Self {
        self.audible_threshold_db = audible_threshold_db;
        self
    }

    /// True iff ffprobe reports at least one audio stream. A probe that
    /// cannot run or exits non-zero is an error; unreadable metadata is not.
    pub async fn has_audio_track(&self, path: &Path) -> Result<bool> {
        let path_str = path.to_string_lossy();
        let output = run_tool(
            &self.ffprobe_path,
            ["-v", "error", "-print_format", "json", "-show_streams", &*path_str],
        )
        .await
        .map_err(|e| QuickBitsError::Probe(format!("failed to run {}: {}", self.ffprobe_path, e)))?;

        if !output.success() {
            return Err(QuickBitsError::Probe(format!(
                "ffprobe failed for {}: {}",
                path.display(),
                output.stderr_tail(3)
            )));
        }

        let has_audio = streams_have_audio(&output.stdout);
        debug!("Audio track present in {}: {}", path.display(), has_audio);
        Ok(has_audio)
    }

    /// Run `volumedetect` over the whole file and compare the mean volume
    /// with the threshold. A missing figure means not audible.
    pub async fn are_audio_levels_audible(&self, path: &Path) -> Result<bool> {
        let path_str = path.to_string_lossy();
        let output = run_tool(
            &self.ffmpeg_path,
            [
                "-hide_banner",
                "-nostdin",
                "-i",
                &*path_str,
                "-vn",
                "-af",
                "volumedetect",
                "-f",
                "null",
                "-",
            ],
        )
        .await
        .map_err(|e| QuickBitsError::Probe(format!("failed to run {}: {}", self.ffmpeg_path, e)))?;

        if !output.success() {
            // No audio stream to feed the filter
            if has_no_output_streams(&output.stderr) {
                return Ok(false);
            }
            return Err(QuickBitsError::Probe(format!(
                "volume detection failed for {}: {}",
                path.display(),
                output.stderr_tail(3)
            )));
        }

        let audible = match parse_mean_volume(&output.stderr) {
            Some(mean_volume) => {
                debug!("Mean volume of {}: {:.1} dB", path.display(), mean_volume);
                mean_volume > self.audible_threshold_db
            }
            None => false,
        };
        Ok(audible)
    }
}

impl Default for AudioValidator {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

#[async_trait]
impl SoundProbe for AudioValidator {
    /// Both checks run concurrently; either failing fails the whole call.
    async fn has_sound(&self, path: &Path) -> Result<bool> {
        let (has_track, audible) = tokio::try_join!(
            self.has_audio_track(path),
            self.are_audio_levels_audible(path)
        )?;

        let has_sound = has_track && audible;
        info!(
            "🔊 Sound check for {}: {} (track: {}, audible: {})",
            path.display(),
            if has_sound { "ok" } else { "silent" },
            has_track,
            audible
        );
        Ok(has_sound)
    }
}

/// Whether ffprobe's JSON lists any stream with `codec_type == "audio"`
pub fn streams_have_audio(ffprobe_json: &str) -> bool {
    let Ok(data) = serde_json::from_str::<serde_json::Value>(ffprobe_json) else {
        return false;
    };

    data["streams"]
        .as_array()
        .map(|streams| streams.iter().any(|s| s["codec_type"] == "audio"))
        .unwrap_or(false)
}

fn mean_volume_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"mean_volume:\s*(-?\d+(?:\.\d+)?|-?inf)\s*dB").expect("mean volume pattern is valid"))
}

/// Extract the `mean_volume` figure (dB) from ffmpeg's volumedetect output
pub fn parse_mean_volume(stderr: &str) -> Option<f64> {
    let caps = mean_volume_regex().captures(stderr)?;
    caps[1].parse::<f64>().ok()
}

fn has_no_output_streams(stderr: &str) -> bool {
    stderr.contains("does not contain any stream") || stderr.contains("matches no streams")
}
