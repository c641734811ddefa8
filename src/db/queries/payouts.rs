//! Payout queries

use crate::db::{timestamp, BankDetails, Database, PayoutModel, PayoutStatus};
use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row};
use tracing::{info, warn};

const PAYOUT_COLUMNS: &str = "id, creator_id, creator_username, amount, bank_name, \
     bank_account_number, bank_account_holder, status, notes, requested_at, processed_at";

fn payout_from_row(row: &Row<'_>) -> rusqlite::Result<PayoutModel> {
    Ok(PayoutModel {
        id: row.get("id")?,
        creator_id: row.get("creator_id")?,
        creator_username: row.get("creator_username")?,
        amount: row.get("amount")?,
        bank: BankDetails {
            bank_name: row.get("bank_name")?,
            account_number: row.get("bank_account_number")?,
            account_holder: row.get("bank_account_holder")?,
        },
        status: row.get("status")?,
        notes: row.get("notes")?,
        requested_at: row.get("requested_at")?,
        processed_at: row.get("processed_at")?,
    })
}

/// Payout queries
pub struct PayoutQueries<'a> {
    db: &'a Database,
}

impl<'a> PayoutQueries<'a> {
    /// Create a new query instance
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Insert a PENDING payout unless the creator already has one.
    ///
    /// The check and the insert run in one transaction. Returns false (and
    /// writes nothing) when a PENDING payout exists.
    pub async fn insert_if_no_pending(&self, payout: &PayoutModel) -> Result<bool> {
        let conn = self.db.conn();
        let mut conn = conn.lock().await;
        let tx = conn.transaction()?;

        let pending: i64 = tx.query_row(
            "SELECT COUNT(*) FROM payouts WHERE creator_id = ?1 AND status = ?2",
            rusqlite::params![&payout.creator_id, PayoutStatus::Pending],
            |row| row.get(0),
        )?;
        if pending > 0 {
            warn!(
                "DB: Refusing payout insert, pending payout exists: creator={}",
                payout.creator_username
            );
            return Ok(false);
        }

        tx.execute(
            r#"
            INSERT INTO payouts (id, creator_id, creator_username, amount, bank_name, bank_account_number, bank_account_holder, status, notes, requested_at, processed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            rusqlite::params![
                &payout.id,
                &payout.creator_id,
                &payout.creator_username,
                payout.amount,
                &payout.bank.bank_name,
                &payout.bank.account_number,
                &payout.bank.account_holder,
                payout.status,
                payout.notes.as_deref(),
                timestamp(&payout.requested_at),
                payout.processed_at.as_ref().map(timestamp),
            ],
        )?;
        tx.commit()?;

        info!(
            "DB: Inserted payout: id={}, creator={}, amount={}",
            payout.id, payout.creator_username, payout.amount
        );
        Ok(true)
    }

    /// Get a payout by ID
    pub async fn get_by_id(&self, id: &str) -> Result<Option<PayoutModel>> {
        let conn = self.db.conn();
        let conn = conn.lock().await;
        let payout = conn
            .query_row(
                &format!("SELECT {} FROM payouts WHERE id = ?1", PAYOUT_COLUMNS),
                [id],
                payout_from_row,
            )
            .optional()?;
        Ok(payout)
    }

    /// List a creator's payouts, newest first
    pub async fn list_by_creator(&self, creator_id: &str) -> Result<Vec<PayoutModel>> {
        let conn = self.db.conn();
        let conn = conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM payouts WHERE creator_id = ?1 ORDER BY requested_at DESC",
            PAYOUT_COLUMNS
        ))?;
        let payouts = stmt
            .query_map([creator_id], payout_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(payouts)
    }

    /// List all payouts, optionally only those with the given status
    pub async fn list_all(&self, status: Option<PayoutStatus>) -> Result<Vec<PayoutModel>> {
        let conn = self.db.conn();
        let conn = conn.lock().await;
        let payouts = match status {
            Some(status) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM payouts WHERE status = ?1 ORDER BY requested_at DESC",
                    PAYOUT_COLUMNS
                ))?;
                let rows = stmt
                    .query_map([status], payout_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM payouts ORDER BY requested_at DESC",
                    PAYOUT_COLUMNS
                ))?;
                let rows = stmt
                    .query_map([], payout_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            }
        };
        Ok(payouts)
    }

    /// Count a creator's PENDING payouts
    pub async fn count_pending(&self, creator_id: &str) -> Result<i64> {
        let conn = self.db.conn();
        let conn = conn.lock().await;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM payouts WHERE creator_id = ?1 AND status = ?2",
            rusqlite::params![creator_id, PayoutStatus::Pending],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Sum of payouts that are pending or already paid out
    pub async fn committed_total(&self, creator_id: &str) -> Result<i64> {
        let conn = self.db.conn();
        let conn = conn.lock().await;
        let total = conn.query_row(
            r#"
            SELECT COALESCE(SUM(amount), 0) FROM payouts
            WHERE creator_id = ?1 AND status IN (?2, ?3, ?4)
            "#,
            rusqlite::params![
                creator_id,
                PayoutStatus::Pending,
                PayoutStatus::Approved,
                PayoutStatus::Processed
            ],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    /// Move a PENDING payout to a terminal status. Returns false if it was not PENDING.
    pub async fn process(
        &self,
        id: &str,
        status: PayoutStatus,
        notes: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let conn = self.db.conn();
        let conn = conn.lock().await;
        let changed = conn.execute(
            r#"
            UPDATE payouts
            SET status = ?1, notes = COALESCE(?2, notes), processed_at = ?3
            WHERE id = ?4 AND status = ?5
            "#,
            rusqlite::params![status, notes, timestamp(&now), id, PayoutStatus::Pending],
        )?;
        info!(
            "DB: Process payout: id={}, status={}, applied={}",
            id,
            status,
            changed > 0
        );
        Ok(changed > 0)
    }
}
