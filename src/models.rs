use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// A long-form video from the channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub video_id: String,
    pub title: String,
    pub published_at: DateTime<Utc>,
}

impl Video {
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.video_id)
    }
}

/// A validated, extracted Quick Bits clip ready for publishing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Clip {
    /// Same as the source video's id
    pub id: String,
    pub title: String,
    pub path: PathBuf,
    pub published_at: DateTime<Utc>,
}

impl Clip {
    pub fn source_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.id)
    }
}

/// Publishing destination
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    YouTube,
    Twitter,
}

impl Platform {
    /// Every supported platform, in upload order
    pub const ALL: [Platform; 2] = [Platform::YouTube, Platform::Twitter];

    /// Ledger key for this platform
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::YouTube => "youtube",
            Platform::Twitter => "twitter",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "youtube" => Ok(Platform::YouTube),
            "twitter" | "x" => Ok(Platform::Twitter),
            other => Err(format!("Unknown platform: {}", other)),
        }
    }
}
