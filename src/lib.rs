//! Quick Bits publisher
//!
//! Finds the "Quick Bits" segment of a channel's long-form videos, cuts it
//! into a vertical clip, checks it carries sound, and publishes it to each
//! configured platform, recording every upload in a durable ledger.

pub mod audio;
pub mod chapters;
pub mod config;
pub mod error;
pub mod ledger;
pub mod models;
pub mod pipeline;
pub mod platforms;
pub mod processing;
pub mod tools;
pub mod upload;
pub mod video;
pub mod youtube;

// Re-export main types for easy access
pub use crate::audio::{AudioValidator, SoundProbe};
pub use crate::chapters::{find_chapter_by_name, find_quick_bits_chapter, parse_chapters, parse_duration, Chapter};
pub use crate::config::{Config, ConfigBuilder};
pub use crate::error::{QuickBitsError, Result};
pub use crate::ledger::UploadLedger;
pub use crate::models::{Clip, Platform, Video};
pub use crate::pipeline::ExtractionPipeline;
pub use crate::platforms::Uploader;
pub use crate::processing::{BatchProcessor, BatchSummary};
pub use crate::upload::{PlatformOutcome, UploadOrchestrator, UploadStatus};
pub use crate::video::{ClipExtractor, FfmpegExtractor};
pub use crate::youtube::{VideoSource, YouTubeClient};
