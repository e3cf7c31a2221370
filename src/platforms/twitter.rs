use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

use super::{post_text, require_token, Uploader};
use crate::config::TwitterUploadConfig;
use crate::models::{Clip, Platform};

/// Uploads clips as video media via the chunked upload API, then posts them
pub struct TwitterUploader {
    config: TwitterUploadConfig,
    access_token: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct MediaResponse {
    media_id_string: String,
    processing_info: Option<ProcessingInfo>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
struct ProcessingInfo {
    state: String,
    check_after_secs: Option<u64>,
    error: Option<ProcessingError>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
struct ProcessingError {
    message: Option<String>,
}

#[derive(Debug, Serialize)]
struct TweetRequest {
    text: String,
    media: TweetMedia,
}

#[derive(Debug, Serialize)]
struct TweetMedia {
    media_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TweetResponse {
    data: TweetData,
}

#[derive(Debug, Deserialize)]
struct TweetData {
    id: String,
}

/// Where server-side media processing stands after FINALIZE
#[derive(Debug, PartialEq)]
enum ProcessingState {
    Ready,
    Pending(Duration),
    Failed(String),
}

impl ProcessingState {
    fn from_info(info: Option<&ProcessingInfo>) -> Self {
        let Some(info) = info else {
            return ProcessingState::Ready;
        };

        match info.state.as_str() {
            "succeeded" => ProcessingState::Ready,
            "failed" => ProcessingState::Failed(
                info.error
                    .as_ref()
                    .and_then(|e| e.message.clone())
                    .unwrap_or_else(|| "media processing failed".to_string()),
            ),
            _ => ProcessingState::Pending(Duration::from_secs(info.check_after_secs.unwrap_or(1).max(1))),
        }
    }
}

/// Follow the processing state, issuing at most `max_polls` STATUS checks.
/// The response to the last check is still inspected.
async fn poll_until_ready<F, Fut>(
    media_id: &str,
    mut info: Option<ProcessingInfo>,
    max_polls: u32,
    mut poll: F,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<ProcessingInfo>>>,
{
    let mut polls = 0;
    loop {
        match ProcessingState::from_info(info.as_ref()) {
            ProcessingState::Ready => return Ok(()),
            ProcessingState::Failed(message) => {
                return Err(anyhow!("Twitter media processing failed: {}", message));
            }
            ProcessingState::Pending(delay) => {
                if polls >= max_polls {
                    return Err(anyhow!(
                        "Twitter media {} still processing after {} checks",
                        media_id,
                        polls
                    ));
                }
                debug!("Media {} still processing, checking again in {:?}", media_id, delay);
                tokio::time::sleep(delay).await;
                info = poll().await?;
                polls += 1;
            }
        }
    }
}

impl TwitterUploader {
    pub fn new(config: TwitterUploadConfig) -> Result<Self> {
        let access_token = require_token(&config.access_token, Platform::Twitter)?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            config,
            access_token,
            client,
        })
    }

    async fn media_command(&self, request: reqwest::RequestBuilder) -> Result<Option<MediaResponse>> {
        let response = request.bearer_auth(&self.access_token).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Twitter media API error {}: {}", status, text));
        }

        // APPEND answers with an empty body
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&body)?))
    }

    async fn init(&self, total_bytes: usize) -> Result<String> {
        let total_bytes = total_bytes.to_string();
        let request = self.client.post(&self.config.media_upload_url).form(&[
            ("command", "INIT"),
            ("total_bytes", total_bytes.as_str()),
            ("media_type", "video/mp4"),
            ("media_category", "tweet_video"),
        ]);

        let media = self
            .media_command(request)
            .await?
            .ok_or_else(|| anyhow!("Twitter INIT returned no media id"))?;
        Ok(media.media_id_string)
    }

    async fn append(&self, media_id: &str, segment_index: usize, chunk: Vec<u8>) -> Result<()> {
        let form = Form::new()
            .text("command", "APPEND")
            .text("media_id", media_id.to_string())
            .text("segment_index", segment_index.to_string())
            .part("media", Part::bytes(chunk).file_name("clip.mp4").mime_str("video/mp4")?);

        let request = self.client.post(&self.config.media_upload_url).multipart(form);
        self.media_command(request).await?;
        Ok(())
    }

    async fn finalize(&self, media_id: &str) -> Result<Option<ProcessingInfo>> {
        let request = self
            .client
            .post(&self.config.media_upload_url)
            .form(&[("command", "FINALIZE"), ("media_id", media_id)]);

        let media = self.media_command(request).await?;
        Ok(media.and_then(|m| m.processing_info))
    }

    async fn status(&self, media_id: &str) -> Result<Option<ProcessingInfo>> {
        let request = self
            .client
            .get(&self.config.media_upload_url)
            .query(&[("command", "STATUS"), ("media_id", media_id)]);

        let media = self.media_command(request).await?;
        Ok(media.and_then(|m| m.processing_info))
    }

    /// Poll until the uploaded video is ready to attach
    async fn wait_for_processing(&self, media_id: &str, info: Option<ProcessingInfo>) -> Result<()> {
        poll_until_ready(media_id, info, self.config.max_status_polls, || self.status(media_id)).await
    }

    async fn post_tweet(&self, text: String, media_id: String) -> Result<String> {
        let request = TweetRequest {
            text,
            media: TweetMedia {
                media_ids: vec![media_id],
            },
        };

        let response = self
            .client
            .post(&self.config.tweet_url)
            .bearer_auth(&self.access_token)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Twitter API error {}: {}", status, text));
        }

        let tweet: TweetResponse = response.json().await?;
        Ok(tweet.data.id)
    }
}

#[async_trait]
impl Uploader for TwitterUploader {
    fn platform(&self) -> Platform {
        Platform::Twitter
    }

    async fn upload(&self, clip: &Clip) -> Result<String> {
        let bytes = tokio::fs::read(&clip.path)
            .await
            .map_err(|e| anyhow!("Cannot read clip {}: {}", clip.path.display(), e))?;

        info!("📤 Uploading {} to Twitter ({} bytes)", clip.id, bytes.len());
        let media_id = self.init(bytes.len()).await?;

        for (index, chunk) in bytes.chunks(self.config.chunk_size_bytes.max(1)).enumerate() {
            self.append(&media_id, index, chunk.to_vec()).await?;
        }

        let info = self.finalize(&media_id).await?;
        self.wait_for_processing(&media_id, info).await?;

        let tweet_id = self.post_tweet(post_text(clip), media_id).await?;
        info!("✅ Posted {} to Twitter as {}", clip.id, tweet_id);
        Ok(tweet_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(state: &str, check_after: Option<u64>) -> ProcessingInfo {
        ProcessingInfo {
            state: state.to_string(),
            check_after_secs: check_after,
            error: None,
        }
    }

    #[test]
    fn test_processing_state_from_info() {
        assert_eq!(ProcessingState::from_info(None), ProcessingState::Ready);
        assert_eq!(
            ProcessingState::from_info(Some(&info("succeeded", None))),
            ProcessingState::Ready
        );
        assert_eq!(
            ProcessingState::from_info(Some(&info("in_progress", Some(5)))),
            ProcessingState::Pending(Duration::from_secs(5))
        );
        assert_eq!(
            ProcessingState::from_info(Some(&info("pending", Some(0)))),
            ProcessingState::Pending(Duration::from_secs(1))
        );
    }

    #[test]
    fn test_failed_processing_carries_message() {
        let json = r#"{"media_id_string":"42","processing_info":{"state":"failed","error":{"message":"InvalidMedia"}}}"#;
        let media: MediaResponse = serde_json::from_str(json).unwrap();
        assert_eq!(media.media_id_string, "42");
        assert_eq!(
            ProcessingState::from_info(media.processing_info.as_ref()),
            ProcessingState::Failed("InvalidMedia".to_string())
        );
    }

    #[tokio::test]
    async fn test_polling_stops_at_limit_and_reads_last_status() {
        let polls = std::cell::Cell::new(0);
        let pending = || {
            polls.set(polls.get() + 1);
            async { Ok::<_, anyhow::Error>(Some(info("in_progress", Some(1)))) }
        };
        let err = poll_until_ready("42", Some(info("pending", Some(1))), 2, pending)
            .await
            .unwrap_err();
        assert_eq!(polls.get(), 2);
        assert!(err.to_string().contains("after 2 checks"));

        let polls = std::cell::Cell::new(0);
        let ready_on_last = || {
            polls.set(polls.get() + 1);
            let state = if polls.get() == 2 { "succeeded" } else { "in_progress" };
            async move { Ok::<_, anyhow::Error>(Some(info(state, Some(1)))) }
        };
        poll_until_ready("42", Some(info("pending", Some(1))), 2, ready_on_last)
            .await
            .unwrap();
        assert_eq!(polls.get(), 2);
    }

    #[tokio::test]
    async fn test_polling_skipped_when_already_ready() {
        let polls = std::cell::Cell::new(0);
        poll_until_ready("42", None, 0, || {
            polls.set(polls.get() + 1);
            async { Ok::<_, anyhow::Error>(None) }
        })
        .await
        .unwrap();
        assert_eq!(polls.get(), 0);
    }

    #[test]
    fn test_tweet_request_shape() {
        let request = TweetRequest {
            text: "Hello".to_string(),
            media: TweetMedia {
                media_ids: vec!["42".to_string()],
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["media"]["media_ids"][0], "42");
    }

    #[test]
    fn test_new_requires_token() {
        assert!(TwitterUploader::new(TwitterUploadConfig::default()).is_err());
        let uploader = TwitterUploader::new(TwitterUploadConfig {
            access_token: Some("token".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(uploader.platform(), Platform::Twitter);
    }
}
