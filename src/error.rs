//! Error types shared by the parser, pipeline and ledger

/// Result type for Quick Bits operations
pub type Result<T> = std::result::Result<T, QuickBitsError>;

/// Error types for Quick Bits operations
#[derive(thiserror::Error, Debug)]
pub enum QuickBitsError {
    #[error("Invalid duration format: '{0}' (expected PT[nH][nM][nS] with at least one component)")]
    InvalidDurationFormat(String),

    #[error("No Quick Bits chapter found for video {0}")]
    NoChapterFound(String),

    #[error("Source video {0} has no audible sound")]
    NoAudioInSource(String),

    #[error("Extracted clip for video {0} is silent")]
    SilentClip(String),

    #[error("Chapter extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("Media probe failed: {0}")]
    Probe(String),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Upload to {platform} failed: {message}")]
    UploadFailed { platform: String, message: String },

    #[error("Metadata lookup failed: {0}")]
    Metadata(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl QuickBitsError {
    /// Expected outcomes that mean "skip this video and move on"
    pub fn is_skippable(&self) -> bool {
        matches!(
            self,
            QuickBitsError::NoChapterFound(_)
                | QuickBitsError::NoAudioInSource(_)
                | QuickBitsError::SilentClip(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skippable_errors() {
        assert!(QuickBitsError::NoChapterFound("abc".into()).is_skippable());
        assert!(QuickBitsError::NoAudioInSource("abc".into()).is_skippable());
        assert!(QuickBitsError::SilentClip("abc".into()).is_skippable());
        assert!(!QuickBitsError::ExtractionFailed("boom".into()).is_skippable());
        assert!(!QuickBitsError::InvalidDurationFormat("PT".into()).is_skippable());
    }

    #[test]
    fn test_error_display() {
        let err = QuickBitsError::UploadFailed {
            platform: "youtube".into(),
            message: "quota exceeded".into(),
        };
        assert_eq!(err.to_string(), "Upload to youtube failed: quota exceeded");
    }
}
