//! Media share and media share history queries

use crate::db::{
    timestamp, Database, MediaShareHistoryModel, MediaShareModel, MediaShareStatus,
};
use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row};
use tracing::{debug, info};

const MEDIA_SHARE_COLUMNS: &str = "id, donation_id, creator_id, creator_username, donor_name, \
     message, amount, video_url, start_seconds, duration_seconds, queue_position, status, \
     created_at, updated_at";

fn media_share_from_row(row: &Row<'_>) -> rusqlite::Result<MediaShareModel> {
    Ok(MediaShareModel {
        id: row.get("id")?,
        donation_id: row.get("donation_id")?,
        creator_id: row.get("creator_id")?,
        creator_username: row.get("creator_username")?,
        donor_name: row.get("donor_name")?,
        message: row.get("message")?,
        amount: row.get("amount")?,
        video_url: row.get("video_url")?,
        start_seconds: row.get("start_seconds")?,
        duration_seconds: row.get("duration_seconds")?,
        queue_position: row.get("queue_position")?,
        status: row.get("status")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

/// Media share queries
pub struct MediaShareQueries<'a> {
    db: &'a Database,
}

impl<'a> MediaShareQueries<'a> {
    /// Create a new query instance
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Append a media share to the end of its creator's queue.
    ///
    /// The `queue_position` of the argument is ignored; the stored row
    /// is returned. A second call for the same donation returns `None`.
    pub async fn enqueue(&self, media_share: &MediaShareModel) -> Result<Option<MediaShareModel>> {
        let conn = self.db.conn();
        let mut conn = conn.lock().await;
        let tx = conn.transaction()?;

        let position: i64 = tx.query_row(
            "SELECT COALESCE(MAX(queue_position), 0) + 1 FROM media_shares WHERE creator_id = ?1",
            [&media_share.creator_id],
            |row| row.get(0),
        )?;

        let inserted = tx.execute(
            r#"
            INSERT OR IGNORE INTO media_shares (id, donation_id, creator_id, creator_username, donor_name, message, amount, video_url, start_seconds, duration_seconds, queue_position, status, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
            rusqlite::params![
                &media_share.id,
                &media_share.donation_id,
                &media_share.creator_id,
                &media_share.creator_username,
                &media_share.donor_name,
                &media_share.message,
                media_share.amount,
                &media_share.video_url,
                media_share.start_seconds,
                media_share.duration_seconds,
                position,
                media_share.status,
                timestamp(&media_share.created_at),
                timestamp(&media_share.updated_at),
            ],
        )?;
        tx.commit()?;

        if inserted == 0 {
            debug!(
                "DB: Media share for donation {} already queued",
                media_share.donation_id
            );
            return Ok(None);
        }

        info!(
            "DB: Enqueued media share: id={}, creator={}, position={}",
            media_share.id, media_share.creator_username, position
        );
        Ok(Some(MediaShareModel {
            queue_position: position,
            ..media_share.clone()
        }))
    }

    /// Get a live media share by ID
    pub async fn get_by_id(&self, id: &str) -> Result<Option<MediaShareModel>> {
        let conn = self.db.conn();
        let conn = conn.lock().await;
        let media_share = conn
            .query_row(
                &format!("SELECT {} FROM media_shares WHERE id = ?1", MEDIA_SHARE_COLUMNS),
                [id],
                media_share_from_row,
            )
            .optional()?;
        Ok(media_share)
    }

    /// List a creator's live media shares in queue order
    pub async fn list_by_creator(&self, creator_id: &str) -> Result<Vec<MediaShareModel>> {
        let conn = self.db.conn();
        let conn = conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM media_shares WHERE creator_id = ?1 ORDER BY queue_position ASC",
            MEDIA_SHARE_COLUMNS
        ))?;
        let media_shares = stmt
            .query_map([creator_id], media_share_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(media_shares)
    }

    /// Set the playback status if it still equals `expected`
    pub async fn transition_status(
        &self,
        id: &str,
        expected: MediaShareStatus,
        status: MediaShareStatus,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let conn = self.db.conn();
        let conn = conn.lock().await;
        let changed = conn.execute(
            "UPDATE media_shares SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
            rusqlite::params![status, timestamp(&now), id, expected],
        )?;
        info!(
            "DB: Media share status transition: id={}, {} -> {}, applied={}",
            id,
            expected,
            status,
            changed > 0
        );
        Ok(changed > 0)
    }

    /// List live PLAYED or SKIPPED media shares created before `cutoff`
    pub async fn list_archivable(&self, cutoff: DateTime<Utc>) -> Result<Vec<MediaShareModel>> {
        let conn = self.db.conn();
        let conn = conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM media_shares WHERE status IN (?1, ?2) AND created_at < ?3 ORDER BY created_at ASC",
            MEDIA_SHARE_COLUMNS
        ))?;
        let media_shares = stmt
            .query_map(
                rusqlite::params![
                    MediaShareStatus::Played,
                    MediaShareStatus::Skipped,
                    timestamp(&cutoff)
                ],
                media_share_from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(media_shares)
    }

    /// Move a live media share into the history table (one transaction)
    pub async fn archive(
        &self,
        media_share: &MediaShareModel,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let conn = self.db.conn();
        let mut conn = conn.lock().await;
        let tx = conn.transaction()?;

        tx.execute(
            r#"
            INSERT OR IGNORE INTO media_share_history (id, donation_id, creator_id, creator_username, donor_name, message, amount, video_url, start_seconds, duration_seconds, queue_position, status, created_at, updated_at, archive_reason, archived_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            "#,
            rusqlite::params![
                &media_share.id,
                &media_share.donation_id,
                &media_share.creator_id,
                &media_share.creator_username,
                &media_share.donor_name,
                &media_share.message,
                media_share.amount,
                &media_share.video_url,
                media_share.start_seconds,
                media_share.duration_seconds,
                media_share.queue_position,
                media_share.status,
                timestamp(&media_share.created_at),
                timestamp(&media_share.updated_at),
                reason,
                timestamp(&now),
            ],
        )?;

        let deleted = tx.execute("DELETE FROM media_shares WHERE id = ?1", [&media_share.id])?;
        tx.commit()?;

        debug!(
            "DB: Archived media share: id={}, removed_live={}",
            media_share.id,
            deleted > 0
        );
        Ok(deleted > 0)
    }

    /// Get an archived media share by ID
    pub async fn get_history(&self, id: &str) -> Result<Option<MediaShareHistoryModel>> {
        let conn = self.db.conn();
        let conn = conn.lock().await;
        let history = conn
            .query_row(
                &format!(
                    "SELECT {}, archive_reason, archived_at FROM media_share_history WHERE id = ?1",
                    MEDIA_SHARE_COLUMNS
                ),
                [id],
                |row| {
                    Ok(MediaShareHistoryModel {
                        media_share: media_share_from_row(row)?,
                        archive_reason: row.get("archive_reason")?,
                        archived_at: row.get("archived_at")?,
                    })
                },
            )
            .optional()?;
        Ok(history)
    }
}
