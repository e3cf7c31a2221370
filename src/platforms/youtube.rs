use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use super::{require_token, Uploader};
use crate::config::YouTubeUploadConfig;
use crate::models::{Clip, Platform};

/// YouTube rejects longer titles
const MAX_TITLE_CHARS: usize = 100;

/// Uploads clips as YouTube videos through the resumable upload protocol
pub struct YouTubeUploader {
    config: YouTubeUploadConfig,
    access_token: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VideoSnippet {
    title: String,
    description: String,
    tags: Vec<String>,
    category_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VideoStatus {
    privacy_status: String,
}

#[derive(Debug, Serialize)]
struct VideoResource {
    snippet: VideoSnippet,
    status: VideoStatus,
}

#[derive(Debug, Deserialize)]
struct InsertedVideo {
    id: String,
}

impl YouTubeUploader {
    pub fn new(config: YouTubeUploadConfig) -> Result<Self> {
        let access_token = require_token(&config.access_token, Platform::YouTube)?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            config,
            access_token,
            client,
        })
    }

    fn video_resource(&self, clip: &Clip) -> VideoResource {
        VideoResource {
            snippet: VideoSnippet {
                title: truncate_title(&clip.title),
                description: format!("{}\n\nFull video: {}", clip.title.trim(), clip.source_url()),
                tags: self.config.tags.clone(),
                category_id: self.config.category_id.clone(),
            },
            status: VideoStatus {
                privacy_status: self.config.privacy_status.clone(),
            },
        }
    }

    /// Open a resumable session and return its upload URL
    async fn start_session(&self, clip: &Clip, content_length: usize) -> Result<String> {
        let response = self
            .client
            .post(&self.config.upload_url)
            .query(&[("uploadType", "resumable"), ("part", "snippet,status")])
            .bearer_auth(&self.access_token)
            .header("X-Upload-Content-Type", "video/mp4")
            .header("X-Upload-Content-Length", content_length.to_string())
            .json(&self.video_resource(clip))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("YouTube API error {}: {}", status, text));
        }

        let session_url = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| anyhow!("YouTube did not return a resumable session URL"))?
            .to_string();

        Ok(session_url)
    }
}

#[async_trait]
impl Uploader for YouTubeUploader {
    fn platform(&self) -> Platform {
        Platform::YouTube
    }

    async fn upload(&self, clip: &Clip) -> Result<String> {
        let bytes = tokio::fs::read(&clip.path)
            .await
            .map_err(|e| anyhow!("Cannot read clip {}: {}", clip.path.display(), e))?;

        info!("📤 Uploading {} to YouTube ({} bytes)", clip.id, bytes.len());
        let session_url = self.start_session(clip, bytes.len()).await?;
        debug!("YouTube resumable session opened for {}", clip.id);

        let response = self
            .client
            .put(&session_url)
            .bearer_auth(&self.access_token)
            .header(CONTENT_TYPE, "video/mp4")
            .header(CONTENT_LENGTH, bytes.len())
            .body(bytes)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("YouTube upload error {}: {}", status, text));
        }

        let video: InsertedVideo = response.json().await?;
        info!("✅ Uploaded {} to YouTube as {}", clip.id, video.id);
        Ok(video.id)
    }
}

fn truncate_title(title: &str) -> String {
    title.trim().chars().take(MAX_TITLE_CHARS).collect()
}
