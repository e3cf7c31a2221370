//! Chapter parsing and selection
//!
//! Turns a video's duration token and free-text description into timed
//! chapters, and picks the Quick Bits segment out of them.

pub mod parser;
pub mod selector;

// Re-export main types
pub use parser::{parse_chapters, parse_duration};
pub use selector::{find_chapter_by_name, find_fallback_chapter, find_quick_bits_chapter};

use serde::{Deserialize, Serialize};

/// Chapter names that identify the Quick Bits segment, highest priority first
pub const DEFAULT_QUICK_BITS_NAMES: &[&str] =
    &["quick bits intro", "quick bits", "quick intro", "quaint blips"];

/// A named, timed sub-range of a video
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chapter {
    /// Chapter title as written in the description
    pub title: String,
    /// Start offset in seconds
    pub start: u64,
    /// End offset in seconds (next chapter's start, or the video's end)
    pub end: u64,
    /// `end - start`
    pub duration: u64,
}

impl Chapter {
    pub fn new(title: impl Into<String>, start: u64, end: u64) -> Self {
        Self {
            title: title.into(),
            start,
            end,
            duration: end.saturating_sub(start),
        }
    }
}
