//! Publishing destinations

pub mod twitter;
pub mod youtube;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

use crate::config::Config;
use crate::models::{Clip, Platform};

pub use twitter::TwitterUploader;
pub use youtube::YouTubeUploader;

/// Publishes a clip to one platform and returns the platform's id for it
#[async_trait]
pub trait Uploader: Send + Sync {
    fn platform(&self) -> Platform;
    async fn upload(&self, clip: &Clip) -> Result<String>;
}

/// Create an uploader for every configured platform, in configured order
/// One uploader per configured platform, in configured order. A platform
/// listed twice gets a single uploader.
pub fn create_uploaders(config: &Config) -> Result<Vec<Arc<dyn Uploader>>> {
    let mut seen = HashSet::new();
    config
        .ledger
        .platforms
        .iter()
        .filter(|platform| seen.insert(**platform))
        .map(|platform| create_uploader(*platform, config))
        .collect()
}

pub fn create_uploader(platform: Platform, config: &Config) -> Result<Arc<dyn Uploader>> {
    match platform {
        Platform::YouTube => {
            let uploader = YouTubeUploader::new(config.youtube_upload.clone())?;
            Ok(Arc::new(uploader))
        }
        Platform::Twitter => {
            let uploader = TwitterUploader::new(config.twitter_upload.clone())?;
            Ok(Arc::new(uploader))
        }
    }
}

/// Short post text shared by the platforms: title plus a link back
pub fn post_text(clip: &Clip) -> String {
    format!("{} {}", clip.title.trim(), clip.source_url())
}

pub(crate) fn require_token(token: &Option<String>, platform: Platform) -> Result<String> {
    token
        .as_ref()
        .filter(|t| !t.trim().is_empty())
        .cloned()
        .ok_or_else(|| anyhow!("{} access token not configured", platform))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigBuilder;
    use chrono::Utc;
    use std::path::PathBuf;

    #[test]
    fn test_create_uploaders_follows_configured_order() {
        let config = ConfigBuilder::new()
            .with_youtube_token("yt")
            .with_twitter_token("x")
            .with_platforms(vec![Platform::Twitter, Platform::YouTube])
            .build();

        let uploaders = create_uploaders(&config).unwrap();
        let platforms: Vec<Platform> = uploaders.iter().map(|u| u.platform()).collect();
        assert_eq!(platforms, vec![Platform::Twitter, Platform::YouTube]);
    }

    #[test]
    fn test_create_uploaders_skips_repeated_platforms() {
        let config = ConfigBuilder::new()
            .with_youtube_token("yt")
            .with_twitter_token("x")
            .with_platforms(vec![Platform::YouTube, Platform::Twitter, Platform::YouTube])
            .build();

        let uploaders = create_uploaders(&config).unwrap();
        let platforms: Vec<Platform> = uploaders.iter().map(|u| u.platform()).collect();
        assert_eq!(platforms, vec![Platform::YouTube, Platform::Twitter]);
    }

    #[test]
    fn test_create_uploader_requires_token() {
        let config = ConfigBuilder::new().with_youtube_token("yt").build();
        assert!(create_uploader(Platform::YouTube, &config).is_ok());
        assert!(create_uploader(Platform::Twitter, &config).is_err());
    }

    #[test]
    fn test_post_text_links_source() {
        let clip = Clip {
            id: "abc".to_string(),
            title: " New GPUs ".to_string(),
            path: PathBuf::from("abc_quick_bits.mp4"),
            published_at: Utc::now(),
        };
        assert_eq!(post_text(&clip), "New GPUs https://www.youtube.com/watch?v=abc");
    }
}
