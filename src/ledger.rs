//! Durable upload ledger
//!
//! One row per (video, platform) that was uploaded successfully, plus an
//! append-only log of failed attempts. A row in `video_uploads` is the only
//! thing that marks a video as published on a platform.

use std::collections::HashSet;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{
    FromRow, SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use tracing::{debug, info};

use crate::error::Result;
use crate::models::Platform;

/// A successful upload
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UploadRecord {
    pub video_id: String,
    pub platform: String,
    pub platform_id: String,
    pub published_at: DateTime<Utc>,
}

/// A failed upload attempt, kept for diagnostics only
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UploadErrorRecord {
    pub id: i64,
    pub video_id: String,
    pub platform: String,
    pub error_message: String,
    pub stack_trace: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Handle to the upload ledger store.
///
/// Opened once per process and shared; `close` releases the pool.
#[derive(Debug, Clone)]
pub struct UploadLedger {
    pool: SqlitePool,
    platforms: Vec<Platform>,
}

impl UploadLedger {
    /// Open (creating and migrating if needed) the ledger at `database_url`.
    /// `platforms` is the set a video must reach to count as fully uploaded.
    pub async fn open(database_url: &str, platforms: Vec<Platform>) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        // Every connection to `:memory:` is its own database, so keep exactly one alive
        let pool = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(options)
                .await?
        };

        let ledger = Self::from_pool(pool, platforms).await?;
        info!("📒 Upload ledger opened: {}", database_url);
        Ok(ledger)
    }

    /// Wrap an existing pool, applying migrations
    pub async fn from_pool(pool: SqlitePool, platforms: Vec<Platform>) -> Result<Self> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool, platforms })
    }

    /// Close the underlying pool, waiting for in-flight statements
    pub async fn close(self) {
        self.pool.close().await;
        debug!("Upload ledger closed");
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn is_uploaded_to_platform(&self, video_id: &str, platform: Platform) -> Result<bool> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT platform_id FROM video_uploads WHERE video_id = ?1 AND platform = ?2",
        )
        .bind(video_id)
        .bind(platform.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.is_some())
    }

    /// Distinct platform keys recorded for a video, including ones that are
    /// not configured
    pub async fn recorded_platforms(&self, video_id: &str) -> Result<HashSet<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT DISTINCT platform FROM video_uploads WHERE video_id = ?1")
                .bind(video_id)
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(|(platform,)| platform).collect())
    }

    /// True iff every configured platform has a record for this video
    pub async fn is_uploaded_to_all_platforms(&self, video_id: &str) -> Result<bool> {
        let recorded = self.recorded_platforms(video_id).await?;
        Ok(self
            .platforms
            .iter()
            .all(|platform| recorded.contains(platform.as_str())))
    }

    /// Record a successful upload. Re-saving the same key replaces the
    /// previous `platform_id`.
    pub async fn save_upload(&self, video_id: &str, platform: Platform, platform_id: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO video_uploads (video_id, platform, platform_id, published_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(video_id, platform) DO UPDATE SET
                 platform_id = excluded.platform_id,
                 published_at = excluded.published_at",
        )
        .bind(video_id)
        .bind(platform.as_str())
        .bind(platform_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        debug!("Saved upload {} -> {}:{}", video_id, platform, platform_id);
        Ok(())
    }

    pub async fn get_upload(&self, video_id: &str, platform: Platform) -> Result<Option<UploadRecord>> {
        let record = sqlx::query_as::<_, UploadRecord>(
            "SELECT video_id, platform, platform_id, published_at
             FROM video_uploads WHERE video_id = ?1 AND platform = ?2",
        )
        .bind(video_id)
        .bind(platform.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// Append a failed attempt to the error log
    pub async fn log_upload_error(
        &self,
        video_id: &str,
        platform: Platform,
        message: &str,
        stack_trace: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO upload_errors (video_id, platform, error_message, stack_trace, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(video_id)
        .bind(platform.as_str())
        .bind(message)
        .bind(stack_trace)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Error history for a video on a platform, oldest first
    pub async fn list_upload_errors(&self, video_id: &str, platform: Platform) -> Result<Vec<UploadErrorRecord>> {
        let records = sqlx::query_as::<_, UploadErrorRecord>(
            "SELECT id, video_id, platform, error_message, stack_trace, created_at
             FROM upload_errors WHERE video_id = ?1 AND platform = ?2
             ORDER BY id ASC",
        )
        .bind(video_id)
        .bind(platform.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }
}
