//! Fan a clip out to every configured platform, recording each outcome

use futures::future::join_all;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::QuickBitsError;
use crate::ledger::UploadLedger;
use crate::models::{Clip, Platform};
use crate::platforms::Uploader;

/// What happened on one platform
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UploadStatus {
    /// A ledger record already existed, nothing was sent
    AlreadyUploaded,
    Uploaded { platform_id: String },
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlatformOutcome {
    pub platform: Platform,
    pub status: UploadStatus,
}

impl PlatformOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self.status, UploadStatus::Failed { .. })
    }

    pub fn is_uploaded(&self) -> bool {
        matches!(self.status, UploadStatus::Uploaded { .. })
    }

    pub fn error(&self) -> Option<QuickBitsError> {
        match &self.status {
            UploadStatus::Failed { message } => Some(QuickBitsError::UploadFailed {
                platform: self.platform.to_string(),
                message: message.clone(),
            }),
            _ => None,
        }
    }
}

pub struct UploadOrchestrator {
    ledger: Arc<UploadLedger>,
    uploaders: Vec<Arc<dyn Uploader>>,
}

impl UploadOrchestrator {
    /// Keeps the first uploader for each platform so a (video, platform)
    /// pair is never uploaded twice in one call.
    pub fn new(ledger: Arc<UploadLedger>, uploaders: Vec<Arc<dyn Uploader>>) -> Self {
        let mut seen = HashSet::new();
        let uploaders = uploaders
            .into_iter()
            .filter(|uploader| {
                let platform = uploader.platform();
                let first = seen.insert(platform);
                if !first {
                    warn!("Ignoring extra uploader for {}", platform);
                }
                first
            })
            .collect();

        Self { ledger, uploaders }
    }

    /// Upload to all platforms concurrently. Never fails as a whole; one
    /// outcome per uploader, in uploader order.
    pub async fn upload_to_platforms(&self, clip: &Clip) -> Vec<PlatformOutcome> {
        let uploads = self
            .uploaders
            .iter()
            .map(|uploader| self.upload_to_platform(uploader.as_ref(), clip));

        join_all(uploads).await
    }

    async fn upload_to_platform(&self, uploader: &dyn Uploader, clip: &Clip) -> PlatformOutcome {
        let platform = uploader.platform();
        let status = self.try_upload(uploader, clip).await;
        PlatformOutcome { platform, status }
    }

    async fn try_upload(&self, uploader: &dyn Uploader, clip: &Clip) -> UploadStatus {
        let platform = uploader.platform();

        match self.ledger.is_uploaded_to_platform(&clip.id, platform).await {
            Ok(true) => {
                info!("⏭️ {} already uploaded to {}", clip.id, platform);
                return UploadStatus::AlreadyUploaded;
            }
            Ok(false) => {}
            Err(e) => {
                let error = anyhow::Error::new(e).context(format!("Cannot check ledger for {}", platform));
                return self.record_failure(clip, platform, &error).await;
            }
        }

        let platform_id = match uploader.upload(clip).await {
            Ok(platform_id) => platform_id,
            Err(e) => return self.record_failure(clip, platform, &e).await,
        };

        if let Err(e) = self.ledger.save_upload(&clip.id, platform, &platform_id).await {
            // The clip is live but unrecorded; the next run will retry it
            let error = anyhow::Error::new(e).context(format!(
                "Uploaded {} to {} as {} but could not record it",
                clip.id, platform, platform_id
            ));
            return self.record_failure(clip, platform, &error).await;
        }

        info!("🎉 {} uploaded to {}: {}", clip.id, platform, platform_id);
        UploadStatus::Uploaded { platform_id }
    }

    async fn record_failure(&self, clip: &Clip, platform: Platform, error: &anyhow::Error) -> UploadStatus {
        let message = error.to_string();
        error!("❌ Upload of {} to {} failed: {}", clip.id, platform, message);

        let trace = cause_chain(error);
        if let Err(e) = self
            .ledger
            .log_upload_error(&clip.id, platform, &message, trace.as_deref())
            .await
        {
            warn!("Could not record upload error for {} on {}: {}", clip.id, platform, e);
        }

        UploadStatus::Failed { message }
    }
}

/// Full cause chain of an error, one cause per line. `None` when the error
/// has no underlying cause.
pub fn cause_chain(error: &anyhow::Error) -> Option<String> {
    if error.chain().count() < 2 {
        return None;
    }

    Some(
        error
            .chain()
            .enumerate()
            .map(|(depth, cause)| {
                if depth == 0 {
                    cause.to_string()
                } else {
                    format!("caused by: {}", cause)
                }
            })
            .collect::<Vec<_>>()
            .join("\n"),
    )
}
