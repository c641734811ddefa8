//! Donation and donation history queries

use crate::db::{
    timestamp, Database, DonationHistoryModel, DonationModel, DonationStatus, MediaRequest,
};
use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row};
use tracing::{debug, info};

const DONATION_COLUMNS: &str = "id, merchant_ref, donor_name, message, amount, status, creator_id, \
     creator_username, media_video_url, media_start_seconds, media_duration_seconds, created_at, \
     updated_at, paid_at";

fn donation_from_row(row: &Row<'_>) -> rusqlite::Result<DonationModel> {
    let video_url: Option<String> = row.get("media_video_url")?;
    let media = match video_url {
        Some(video_url) => Some(MediaRequest {
            video_url,
            start_seconds: row.get::<_, Option<i64>>("media_start_seconds")?.unwrap_or(0),
            duration_seconds: row.get::<_, Option<i64>>("media_duration_seconds")?.unwrap_or(0),
        }),
        None => None,
    };

    Ok(DonationModel {
        id: row.get("id")?,
        merchant_ref: row.get("merchant_ref")?,
        donor_name: row.get("donor_name")?,
        message: row.get("message")?,
        amount: row.get("amount")?,
        status: row.get("status")?,
        creator_id: row.get("creator_id")?,
        creator_username: row.get("creator_username")?,
        media,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        paid_at: row.get("paid_at")?,
    })
}

fn history_from_row(row: &Row<'_>) -> rusqlite::Result<DonationHistoryModel> {
    Ok(DonationHistoryModel {
        donation: donation_from_row(row)?,
        archive_reason: row.get("archive_reason")?,
        archived_at: row.get("archived_at")?,
    })
}

/// A PAID donation reduced to what leaderboards need
#[derive(Debug, Clone)]
pub struct PaidDonationRow {
    /// Donor name as stored
    pub donor_name: String,
    /// Amount
    pub amount: i64,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Donation queries, covering both the live and the history table
pub struct DonationQueries<'a> {
    db: &'a Database,
}

impl<'a> DonationQueries<'a> {
    /// Create a new query instance
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Insert a new live donation
    pub async fn insert(&self, donation: &DonationModel) -> Result<()> {
        let conn = self.db.conn();
        let conn = conn.lock().await;
        conn.execute(
            r#"
            INSERT INTO donations (id, merchant_ref, donor_name, message, amount, status, creator_id, creator_username, media_video_url, media_start_seconds, media_duration_seconds, created_at, updated_at, paid_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
            rusqlite::params![
                &donation.id,
                &donation.merchant_ref,
                &donation.donor_name,
                &donation.message,
                donation.amount,
                donation.status,
                &donation.creator_id,
                &donation.creator_username,
                donation.media.as_ref().map(|m| m.video_url.as_str()),
                donation.media.as_ref().map(|m| m.start_seconds),
                donation.media.as_ref().map(|m| m.duration_seconds),
                timestamp(&donation.created_at),
                timestamp(&donation.updated_at),
                donation.paid_at.as_ref().map(timestamp),
            ],
        )?;
        info!(
            "DB: Inserted donation: id={}, merchant_ref={}, creator={}, amount={}, status={}",
            donation.id, donation.merchant_ref, donation.creator_username, donation.amount, donation.status
        );
        Ok(())
    }

    /// Get a live donation by merchant reference
    pub async fn get_by_merchant_ref(&self, merchant_ref: &str) -> Result<Option<DonationModel>> {
        let conn = self.db.conn();
        let conn = conn.lock().await;
        let donation = conn
            .query_row(
                &format!("SELECT {} FROM donations WHERE merchant_ref = ?1", DONATION_COLUMNS),
                [merchant_ref],
                donation_from_row,
            )
            .optional()?;
        Ok(donation)
    }

    /// Get a live donation by ID
    pub async fn get_by_id(&self, id: &str) -> Result<Option<DonationModel>> {
        let conn = self.db.conn();
        let conn = conn.lock().await;
        let donation = conn
            .query_row(
                &format!("SELECT {} FROM donations WHERE id = ?1", DONATION_COLUMNS),
                [id],
                donation_from_row,
            )
            .optional()?;
        Ok(donation)
    }

    /// List a creator's live donations, newest first
    pub async fn list_by_creator(
        &self,
        creator_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<DonationModel>> {
        let conn = self.db.conn();
        let conn = conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM donations WHERE creator_id = ?1 ORDER BY created_at DESC LIMIT ?2 OFFSET ?3",
            DONATION_COLUMNS
        ))?;
        let donations = stmt
            .query_map(rusqlite::params![creator_id, limit, offset], donation_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(donations)
    }

    /// Count a creator's live donations
    pub async fn count_by_creator(&self, creator_id: &str) -> Result<u64> {
        let conn = self.db.conn();
        let conn = conn.lock().await;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM donations WHERE creator_id = ?1",
            [creator_id],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    /// Set the status of a live donation.
    ///
    /// Only applies when the stored status still equals `expected`, so two
    /// concurrent webhooks cannot both observe the same transition. Returns
    /// whether a row changed.
    pub async fn transition_status(
        &self,
        id: &str,
        expected: DonationStatus,
        status: DonationStatus,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let paid_at = (status == DonationStatus::Paid).then(|| timestamp(&now));
        let conn = self.db.conn();
        let conn = conn.lock().await;
        let changed = conn.execute(
            r#"
            UPDATE donations
            SET status = ?1, updated_at = ?2, paid_at = COALESCE(?3, paid_at)
            WHERE id = ?4 AND status = ?5
            "#,
            rusqlite::params![status, timestamp(&now), paid_at, id, expected],
        )?;
        info!(
            "DB: Donation status transition: id={}, {} -> {}, applied={}",
            id,
            expected,
            status,
            changed > 0
        );
        Ok(changed > 0)
    }

    /// List live PAID donations created before `cutoff`
    pub async fn list_archivable(&self, cutoff: DateTime<Utc>) -> Result<Vec<DonationModel>> {
        let conn = self.db.conn();
        let conn = conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM donations WHERE status = ?1 AND created_at < ?2 ORDER BY created_at ASC",
            DONATION_COLUMNS
        ))?;
        let donations = stmt
            .query_map(
                rusqlite::params![DonationStatus::Paid, timestamp(&cutoff)],
                donation_from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(donations)
    }

    /// Move a live donation into the history table.
    ///
    /// The copy and the delete run in one transaction; the history row is
    /// keyed by the donation ID, so a repeated call never duplicates it.
    /// Returns whether the live row was removed by this call.
    pub async fn archive(
        &self,
        donation: &DonationModel,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let conn = self.db.conn();
        let mut conn = conn.lock().await;
        let tx = conn.transaction()?;

        tx.execute(
            r#"
            INSERT OR IGNORE INTO donation_history (id, merchant_ref, donor_name, message, amount, status, creator_id, creator_username, media_video_url, media_start_seconds, media_duration_seconds, created_at, updated_at, paid_at, archive_reason, archived_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            "#,
            rusqlite::params![
                &donation.id,
                &donation.merchant_ref,
                &donation.donor_name,
                &donation.message,
                donation.amount,
                donation.status,
                &donation.creator_id,
                &donation.creator_username,
                donation.media.as_ref().map(|m| m.video_url.as_str()),
                donation.media.as_ref().map(|m| m.start_seconds),
                donation.media.as_ref().map(|m| m.duration_seconds),
                timestamp(&donation.created_at),
                timestamp(&donation.updated_at),
                donation.paid_at.as_ref().map(timestamp),
                reason,
                timestamp(&now),
            ],
        )?;

        let deleted = tx.execute("DELETE FROM donations WHERE id = ?1", [&donation.id])?;
        tx.commit()?;

        debug!("DB: Archived donation: id={}, removed_live={}", donation.id, deleted > 0);
        Ok(deleted > 0)
    }

    /// Get an archived donation by ID
    pub async fn get_history(&self, id: &str) -> Result<Option<DonationHistoryModel>> {
        let conn = self.db.conn();
        let conn = conn.lock().await;
        let history = conn
            .query_row(
                &format!(
                    "SELECT {}, archive_reason, archived_at FROM donation_history WHERE id = ?1",
                    DONATION_COLUMNS
                ),
                [id],
                history_from_row,
            )
            .optional()?;
        Ok(history)
    }

    /// PAID donations of a creator, live and archived, created in `[start, end)`
    pub async fn paid_in_range(
        &self,
        creator_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PaidDonationRow>> {
        let conn = self.db.conn();
        let conn = conn.lock().await;
        let mut stmt = conn.prepare(
            r#"
            SELECT donor_name, amount, created_at FROM donations
            WHERE creator_id = ?1 AND status = ?2 AND created_at >= ?3 AND created_at < ?4
            UNION ALL
            SELECT donor_name, amount, created_at FROM donation_history
            WHERE creator_id = ?1 AND status = ?2 AND created_at >= ?3 AND created_at < ?4
            ORDER BY created_at ASC
            "#,
        )?;
        let rows = stmt
            .query_map(
                rusqlite::params![
                    creator_id,
                    DonationStatus::Paid,
                    timestamp(&start),
                    timestamp(&end)
                ],
                |row| {
                    Ok(PaidDonationRow {
                        donor_name: row.get(0)?,
                        amount: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                },
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Sum of a creator's PAID donation amounts, live and archived
    pub async fn paid_total(&self, creator_id: &str) -> Result<i64> {
        let conn = self.db.conn();
        let conn = conn.lock().await;
        let total: i64 = conn.query_row(
            r#"
            SELECT
                (SELECT COALESCE(SUM(amount), 0) FROM donations WHERE creator_id = ?1 AND status = ?2)
              + (SELECT COALESCE(SUM(amount), 0) FROM donation_history WHERE creator_id = ?1 AND status = ?2)
            "#,
            rusqlite::params![creator_id, DonationStatus::Paid],
            |row| row.get(0),
        )?;
        Ok(total)
    }
}
