use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::{Captures, Regex};
use serde::Deserialize;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::chapters::{parse_chapters, parse_duration, Chapter};
use crate::config::ChannelConfig;
use crate::error::{QuickBitsError, Result};
use crate::models::Video;
use crate::tools::run_tool;

/// Where videos, their chapters and their media come from
#[async_trait]
pub trait VideoSource: Send + Sync {
    /// Most recent uploads of the channel, newest first
    async fn get_latest_videos(&self) -> Result<Vec<Video>>;

    /// Chapters parsed from the video description
    async fn get_video_chapters(&self, video_id: &str) -> Result<Vec<Chapter>>;

    /// Download the video as mp4 to `output_path`
    async fn download_video(&self, video: &Video, output_path: &Path) -> Result<()>;
}

/// YouTube Data API v3 client, with yt-dlp for downloads
pub struct YouTubeClient {
    client: reqwest::Client,
    api_base_url: String,
    api_key: String,
    channel_id: String,
    max_results: u32,
    yt_dlp_path: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
    snippet: SearchSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItemId {
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchSnippet {
    title: String,
    published_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct VideosResponse {
    #[serde(default)]
    items: Vec<VideoDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoDetails {
    snippet: DetailsSnippet,
    content_details: ContentDetails,
}

#[derive(Debug, Deserialize)]
struct DetailsSnippet {
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ContentDetails {
    duration: String,
}

impl YouTubeClient {
    pub fn new(config: &ChannelConfig, yt_dlp_path: impl Into<String>) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| QuickBitsError::Metadata("YouTube API key not configured".to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .user_agent("Mozilla/5.0 (compatible; quick-bits/0.1)")
            .build()?;

        Ok(Self {
            client,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_key,
            channel_id: config.channel_id.clone(),
            max_results: config.max_results,
            yt_dlp_path: yt_dlp_path.into(),
        })
    }

    fn endpoint(&self, resource: &str, params: &[(&str, &str)]) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/{}", self.api_base_url, resource))
            .map_err(|e| QuickBitsError::Metadata(format!("Invalid API URL: {}", e)))?;
        url.query_pairs_mut()
            .extend_pairs(params)
            .append_pair("key", &self.api_key);
        Ok(url)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(QuickBitsError::Metadata(format!("YouTube API error {}: {}", status, text)));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl VideoSource for YouTubeClient {
    async fn get_latest_videos(&self) -> Result<Vec<Video>> {
        let max_results = self.max_results.to_string();
        let url = self.endpoint(
            "search",
            &[
                ("channelId", self.channel_id.as_str()),
                ("order", "date"),
                ("part", "snippet"),
                ("type", "video"),
                ("maxResults", max_results.as_str()),
            ],
        )?;

        let response: SearchResponse = self.get_json(url).await?;
        let videos = videos_from_search(response);
        info!("📺 Found {} latest videos for channel {}", videos.len(), self.channel_id);
        Ok(videos)
    }

    async fn get_video_chapters(&self, video_id: &str) -> Result<Vec<Chapter>> {
        let url = self.endpoint("videos", &[("part", "snippet,contentDetails"), ("id", video_id)])?;
        let response: VideosResponse = self.get_json(url).await?;

        let chapters = chapters_from_details(video_id, response)?;
        debug!("Parsed {} chapters for {}", chapters.len(), video_id);
        Ok(chapters)
    }

    async fn download_video(&self, video: &Video, output_path: &Path) -> Result<()> {
        let url = video.watch_url();
        let output_str = output_path.to_string_lossy();
        info!("⬇️ Downloading {} to {}", url, output_path.display());

        let output = run_tool(
            &self.yt_dlp_path,
            ["--quiet", "--no-warnings", "-f", "mp4", "-o", &*output_str, url.as_str()],
        )
        .await
        .map_err(|e| QuickBitsError::Download(format!("failed to run {}: {}", self.yt_dlp_path, e)))?;

        if !output.success() {
            warn!("yt-dlp failed for {}", video.video_id);
            return Err(QuickBitsError::Download(format!(
                "yt-dlp exited with {} for {}: {}",
                output.status,
                video.video_id,
                output.stderr_tail(3)
            )));
        }

        if !output_path.exists() {
            return Err(QuickBitsError::Download(format!(
                "yt-dlp reported success but {} is missing",
                output_path.display()
            )));
        }

        Ok(())
    }
}

fn videos_from_search(response: SearchResponse) -> Vec<Video> {
    response
        .items
        .into_iter()
        .filter_map(|item| {
            let video_id = item.id.video_id?;
            Some(Video {
                video_id,
                title: html_entity_decode(&item.snippet.title),
                published_at: item.snippet.published_at,
            })
        })
        .collect()
}

fn chapters_from_details(video_id: &str, response: VideosResponse) -> Result<Vec<Chapter>> {
    let details = response
        .items
        .into_iter()
        .next()
        .ok_or_else(|| QuickBitsError::Metadata(format!("Video {} not found", video_id)))?;

    let total = parse_duration(&details.content_details.duration)?;
    Ok(parse_chapters(&details.snippet.description, total))
}

fn entity_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z]{2,8});").expect("entity pattern is valid"))
}

/// Decode the HTML entities the Data API leaves in titles. Unknown
/// entities are kept as written.
pub fn html_entity_decode(s: &str) -> String {
    entity_regex()
        .replace_all(s, |caps: &Captures| {
            let entity = &caps[1];
            let decoded = if let Some(hex) = entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = entity.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                named_entity(entity)
            };

            decoded.map(String::from).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn named_entity(name: &str) -> Option<char> {
    let c = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "mdash" => '—',
        "ndash" => '–',
        "hellip" => '…',
        "lsquo" => '‘',
        "rsquo" => '’',
        "ldquo" => '“',
        "rdquo" => '”',
        "trade" => '™',
        "reg" => '®',
        "copy" => '©',
        _ => return None,
    };
    Some(c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_entity_decode() {
        assert_eq!(html_entity_decode("Hello &amp; World"), "Hello & World");
        assert_eq!(html_entity_decode("It&#39;s &quot;fast&quot;"), "It's \"fast\"");
        assert_eq!(html_entity_decode("&#x1F680; launch"), "🚀 launch");
        assert_eq!(html_entity_decode("AMD&rsquo;s new chip"), "AMD’s new chip");
    }

    #[test]
    fn test_html_entity_decode_is_single_pass() {
        assert_eq!(html_entity_decode("&amp;lt;"), "&lt;");
        assert_eq!(html_entity_decode("&bogus; & &;"), "&bogus; & &;");
    }

    #[test]
    fn test_videos_from_search_decodes_titles_and_skips_non_videos() {
        let json = r#"{
            "items": [
                {"id": {"kind": "youtube#video", "videoId": "abc"},
                 "snippet": {"title": "CPUs &amp; GPUs", "publishedAt": "2024-05-01T12:00:00Z"}},
                {"id": {"kind": "youtube#channel", "channelId": "UC1"},
                 "snippet": {"title": "Channel", "publishedAt": "2024-05-01T12:00:00Z"}}
            ]
        }"#;
        let response: SearchResponse = serde_json::from_str(json).unwrap();
        let videos = videos_from_search(response);

        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].video_id, "abc");
        assert_eq!(videos[0].title, "CPUs & GPUs");
    }

    #[test]
    fn test_chapters_from_details() {
        let json = r#"{
            "items": [{
                "snippet": {"description": "0:00 Intro\n1:30 Quick Bits\n4:00 Outro"},
                "contentDetails": {"duration": "PT5M"}
            }]
        }"#;
        let response: VideosResponse = serde_json::from_str(json).unwrap();
        let chapters = chapters_from_details("abc", response).unwrap();

        assert_eq!(chapters.len(), 3);
        assert_eq!(chapters[1], Chapter::new("Quick Bits", 90, 240));
        assert_eq!(chapters[2].end, 300);
    }

    #[test]
    fn test_chapters_from_details_errors() {
        let empty: VideosResponse = serde_json::from_str(r#"{"items": []}"#).unwrap();
        assert!(matches!(chapters_from_details("abc", empty), Err(QuickBitsError::Metadata(_))));

        let live: VideosResponse = serde_json::from_str(
            r#"{"items": [{"snippet": {"description": "0:00 Intro"}, "contentDetails": {"duration": "PT"}}]}"#,
        )
        .unwrap();
        assert!(matches!(
            chapters_from_details("abc", live),
            Err(QuickBitsError::InvalidDurationFormat(_))
        ));
    }

    #[test]
    fn test_endpoint_includes_key_and_params() {
        let config = ChannelConfig {
            channel_id: "UC123".to_string(),
            api_key: Some("secret".to_string()),
            ..Default::default()
        };
        let client = YouTubeClient::new(&config, "yt-dlp").unwrap();
        let url = client.endpoint("videos", &[("id", "abc")]).unwrap();

        assert!(url.as_str().starts_with("https://www.googleapis.com/youtube/v3/videos?"));
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("id".to_string(), "abc".to_string())));
        assert!(pairs.contains(&("key".to_string(), "secret".to_string())));
    }

    #[test]
    fn test_new_requires_api_key() {
        assert!(YouTubeClient::new(&ChannelConfig::default(), "yt-dlp").is_err());
    }
}
