use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

use crate::chapters::DEFAULT_QUICK_BITS_NAMES;
use crate::models::Platform;

/// Configuration for the Quick Bits publisher
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Source channel and YouTube Data API access
    pub channel: ChannelConfig,

    /// Extraction pipeline settings
    pub pipeline: PipelineConfig,

    /// Upload ledger storage
    pub ledger: LedgerConfig,

    /// YouTube Shorts upload settings
    pub youtube_upload: YouTubeUploadConfig,

    /// Twitter/X upload settings
    pub twitter_upload: TwitterUploadConfig,

    /// Batch run limits
    pub batch: BatchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Channel whose latest videos are scanned
    pub channel_id: String,

    /// YouTube Data API key
    pub api_key: Option<String>,

    /// Number of latest videos fetched per run
    pub max_results: u32,

    /// Base URL of the YouTube Data API
    pub api_base_url: String,

    /// HTTP request timeout in seconds
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory holding downloads and extracted clips
    pub working_dir: PathBuf,

    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    pub yt_dlp_path: String,

    /// Chapter titles that identify the Quick Bits segment, most specific first
    pub chapter_names: Vec<String>,

    /// Seconds added before and after the chapter
    pub clip_padding_seconds: u64,

    /// Mean volume (dB) a file must exceed to count as audible
    pub audible_threshold_db: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// sqlx SQLite connection URL
    pub database_url: String,

    /// Platforms a video must reach to count as fully uploaded
    pub platforms: Vec<Platform>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct YouTubeUploadConfig {
    /// Pre-issued OAuth access token with upload scope
    pub access_token: Option<String>,

    pub upload_url: String,
    pub category_id: String,
    pub privacy_status: String,
    pub tags: Vec<String>,

    /// Upload request timeout in seconds
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TwitterUploadConfig {
    /// Pre-issued OAuth 2.0 user access token
    pub access_token: Option<String>,

    /// Chunked media upload endpoint
    pub media_upload_url: String,

    /// Tweet creation endpoint
    pub tweet_url: String,

    /// Size of each APPEND segment in bytes
    pub chunk_size_bytes: usize,

    /// Maximum number of processing status polls after FINALIZE
    pub max_status_polls: u32,

    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Maximum number of videos processed in one run
    pub max_videos_per_run: usize,

    /// Optional JSON file of older videos to work through
    pub backlog_file: Option<PathBuf>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            channel_id: String::new(),
            api_key: None,
            max_results: 5,
            api_base_url: "https://www.googleapis.com/youtube/v3".to_string(),
            request_timeout_seconds: 30,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            working_dir: PathBuf::from("./videos"),
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            yt_dlp_path: "yt-dlp".to_string(),
            chapter_names: DEFAULT_QUICK_BITS_NAMES.iter().map(|s| s.to_string()).collect(),
            clip_padding_seconds: crate::video::CLIP_PADDING_SECONDS,
            audible_threshold_db: crate::audio::DEFAULT_AUDIBLE_THRESHOLD_DB,
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://quick-bits.db".to_string(),
            platforms: Platform::ALL.to_vec(),
        }
    }
}

impl Default for YouTubeUploadConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            upload_url: "https://www.googleapis.com/upload/youtube/v3/videos".to_string(),
            category_id: "28".to_string(), // Science & Technology
            privacy_status: "public".to_string(),
            tags: vec!["quick bits".to_string()],
            timeout_seconds: 600,
        }
    }
}

impl Default for TwitterUploadConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            media_upload_url: "https://upload.twitter.com/1.1/media/upload.json".to_string(),
            tweet_url: "https://api.twitter.com/2/tweets".to_string(),
            chunk_size_bytes: 4 * 1024 * 1024, // 4MB segments
            max_status_polls: 30,
            timeout_seconds: 300,
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_videos_per_run: 5,
            backlog_file: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            channel: ChannelConfig::default(),
            pipeline: PipelineConfig::default(),
            ledger: LedgerConfig::default(),
            youtube_upload: YouTubeUploadConfig::default(),
            twitter_upload: TwitterUploadConfig::default(),
            batch: BatchConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the first config file found, falling back
    /// to environment variables
    pub fn load() -> Result<Self> {
        let config_paths = ["quick-bits.toml", "config/quick-bits.toml"];

        for path in &config_paths {
            if let Ok(config_str) = std::fs::read_to_string(path) {
                match toml::from_str::<Config>(&config_str) {
                    Ok(mut config) => {
                        tracing::info!("📄 Loaded configuration from: {}", path);
                        config.apply_env();
                        return Ok(config);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {}: {}", path, e);
                    }
                }
            }
        }

        Self::from_env()
    }

    /// Load configuration from a specific file. Environment variables still
    /// override secrets.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("Cannot read config file {}: {}", path.display(), e))?;
        let mut config: Config = toml::from_str(&config_str)
            .map_err(|e| anyhow!("Invalid config file {}: {}", path.display(), e))?;
        config.apply_env();
        tracing::info!("📄 Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Build configuration from defaults plus environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(channel_id) = std::env::var("CHANNEL_ID") {
            self.channel.channel_id = channel_id;
        }

        if let Ok(api_key) = std::env::var("YOUTUBE_API_KEY") {
            self.channel.api_key = Some(api_key);
        }

        if let Ok(token) = std::env::var("YOUTUBE_ACCESS_TOKEN") {
            self.youtube_upload.access_token = Some(token);
        }

        if let Ok(token) = std::env::var("X_ACCESS_TOKEN") {
            self.twitter_upload.access_token = Some(token);
        }

        if let Ok(working_dir) = std::env::var("QUICK_BITS_WORKING_DIR") {
            self.pipeline.working_dir = PathBuf::from(working_dir);
        }

        if let Ok(database_url) = std::env::var("QUICK_BITS_DATABASE_URL") {
            self.ledger.database_url = database_url;
        }

        if let Ok(max_videos) = std::env::var("QUICK_BITS_MAX_VIDEOS") {
            self.batch.max_videos_per_run = max_videos.parse().unwrap_or(5);
        }

        if let Ok(backlog) = std::env::var("QUICK_BITS_BACKLOG_FILE") {
            self.batch.backlog_file = Some(PathBuf::from(backlog));
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.channel.channel_id.trim().is_empty() {
            return Err(anyhow!("channel.channel_id is required (or set CHANNEL_ID)"));
        }

        if self.channel.api_key.is_none() {
            return Err(anyhow!("channel.api_key is required (or set YOUTUBE_API_KEY)"));
        }

        if self.ledger.platforms.is_empty() {
            return Err(anyhow!("ledger.platforms must name at least one platform"));
        }

        let mut seen = HashSet::new();
        if let Some(duplicate) = self.ledger.platforms.iter().find(|p| !seen.insert(**p)) {
            return Err(anyhow!("ledger.platforms lists {} more than once", duplicate));
        }

        for platform in &self.ledger.platforms {
            let token = match platform {
                Platform::YouTube => &self.youtube_upload.access_token,
                Platform::Twitter => &self.twitter_upload.access_token,
            };
            if token.is_none() {
                return Err(anyhow!("Access token required for platform {}", platform));
            }
        }

        if self.pipeline.chapter_names.iter().all(|name| name.trim().is_empty()) {
            return Err(anyhow!("pipeline.chapter_names must not be empty"));
        }

        if self.batch.max_videos_per_run == 0 {
            return Err(anyhow!("batch.max_videos_per_run must be greater than 0"));
        }

        if self.twitter_upload.chunk_size_bytes == 0 {
            return Err(anyhow!("twitter_upload.chunk_size_bytes must be greater than 0"));
        }

        if !self.pipeline.working_dir.exists() {
            if let Err(e) = std::fs::create_dir_all(&self.pipeline.working_dir) {
                return Err(anyhow!("Cannot create working directory: {}", e));
            }
        }

        tracing::info!("✅ Configuration validation passed");
        Ok(())
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "Quick Bits Configuration:\n\
            - Channel: {}\n\
            - Working Directory: {}\n\
            - Ledger: {}\n\
            - Platforms: {}\n\
            - Max Videos Per Run: {}\n\
            - Backlog: {}",
            self.channel.channel_id,
            self.pipeline.working_dir.display(),
            self.ledger.database_url,
            self.ledger
                .platforms
                .iter()
                .map(|p| p.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            self.batch.max_videos_per_run,
            self.batch
                .backlog_file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "none".to_string())
        )
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_channel(mut self, channel_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        self.config.channel.channel_id = channel_id.into();
        self.config.channel.api_key = Some(api_key.into());
        self
    }

    pub fn with_working_dir(mut self, dir: PathBuf) -> Self {
        self.config.pipeline.working_dir = dir;
        self
    }

    pub fn with_platforms(mut self, platforms: Vec<Platform>) -> Self {
        self.config.ledger.platforms = platforms;
        self
    }

    pub fn with_youtube_token(mut self, token: impl Into<String>) -> Self {
        self.config.youtube_upload.access_token = Some(token.into());
        self
    }

    pub fn with_twitter_token(mut self, token: impl Into<String>) -> Self {
        self.config.twitter_upload.access_token = Some(token.into());
        self
    }

    pub fn with_chapter_names(mut self, names: Vec<String>) -> Self {
        self.config.pipeline.chapter_names = names;
        self
    }

    pub fn with_max_videos(mut self, max_videos: usize) -> Self {
        self.config.batch.max_videos_per_run = max_videos;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
