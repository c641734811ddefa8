//! Creator queries
//!
//! Owned records carry a denormalized `creator_username` display copy. A
//! rename rewrites only that column, including on history rows and finalized
//! leaderboards; their amounts, statuses and timestamps stay as recorded.

use super::Json;
use crate::db::{timestamp, CreatorModel, Database};
use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row};
use tracing::info;

const CREATOR_COLUMNS: &str = "id, username, display_name, email, bank_name, bank_account_number, \
     bank_account_holder, filtered_words, created_at, updated_at";

/// Tables carrying a denormalized `creator_username` copy
const USERNAME_TABLES: [&str; 6] = [
    "donations",
    "donation_history",
    "media_shares",
    "media_share_history",
    "monthly_leaderboards",
    "payouts",
];

fn creator_from_row(row: &Row<'_>) -> rusqlite::Result<CreatorModel> {
    Ok(CreatorModel {
        id: row.get("id")?,
        username: row.get("username")?,
        display_name: row.get("display_name")?,
        email: row.get("email")?,
        bank_name: row.get("bank_name")?,
        bank_account_number: row.get("bank_account_number")?,
        bank_account_holder: row.get("bank_account_holder")?,
        filtered_words: row.get::<_, Json<Vec<String>>>("filtered_words")?.0,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

/// Creator queries
pub struct CreatorQueries<'a> {
    db: &'a Database,
}

impl<'a> CreatorQueries<'a> {
    /// Create a new query instance
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Insert a new creator
    pub async fn insert(&self, creator: &CreatorModel) -> Result<()> {
        let filtered_words = serde_json::to_string(&creator.filtered_words)?;
        let conn = self.db.conn();
        let conn = conn.lock().await;
        conn.execute(
            r#"
            INSERT INTO creators (id, username, display_name, email, bank_name, bank_account_number, bank_account_holder, filtered_words, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            rusqlite::params![
                &creator.id,
                &creator.username,
                &creator.display_name,
                creator.email.as_deref(),
                creator.bank_name.as_deref(),
                creator.bank_account_number.as_deref(),
                creator.bank_account_holder.as_deref(),
                filtered_words,
                timestamp(&creator.created_at),
                timestamp(&creator.updated_at),
            ],
        )?;
        info!("DB: Inserted creator: id={}, username={}", creator.id, creator.username);
        Ok(())
    }

    /// Get a creator by username
    pub async fn get_by_username(&self, username: &str) -> Result<Option<CreatorModel>> {
        let conn = self.db.conn();
        let conn = conn.lock().await;
        let creator = conn
            .query_row(
                &format!("SELECT {} FROM creators WHERE username = ?1", CREATOR_COLUMNS),
                [username],
                creator_from_row,
            )
            .optional()?;
        Ok(creator)
    }

    /// Get a creator by ID
    pub async fn get_by_id(&self, id: &str) -> Result<Option<CreatorModel>> {
        let conn = self.db.conn();
        let conn = conn.lock().await;
        let creator = conn
            .query_row(
                &format!("SELECT {} FROM creators WHERE id = ?1", CREATOR_COLUMNS),
                [id],
                creator_from_row,
            )
            .optional()?;
        Ok(creator)
    }

    /// List all creators
    pub async fn list_all(&self) -> Result<Vec<CreatorModel>> {
        let conn = self.db.conn();
        let conn = conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM creators ORDER BY created_at ASC",
            CREATOR_COLUMNS
        ))?;
        let creators = stmt
            .query_map([], creator_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(creators)
    }

    /// Update profile fields and settings (everything but the username)
    pub async fn update_profile(&self, creator: &CreatorModel) -> Result<()> {
        let filtered_words = serde_json::to_string(&creator.filtered_words)?;
        let conn = self.db.conn();
        let conn = conn.lock().await;
        conn.execute(
            r#"
            UPDATE creators
            SET display_name = ?1, email = ?2, bank_name = ?3, bank_account_number = ?4,
                bank_account_holder = ?5, filtered_words = ?6, updated_at = ?7
            WHERE id = ?8
            "#,
            rusqlite::params![
                &creator.display_name,
                creator.email.as_deref(),
                creator.bank_name.as_deref(),
                creator.bank_account_number.as_deref(),
                creator.bank_account_holder.as_deref(),
                filtered_words,
                timestamp(&creator.updated_at),
                &creator.id,
            ],
        )?;
        info!("DB: Updated creator profile: id={}", creator.id);
        Ok(())
    }

    /// Rename a creator and rewrite every denormalized username copy.
    ///
    /// Only `creator_username` changes on owned rows. Runs in one transaction.
    /// Returns the number of owned rows rewritten.
    pub async fn rename(&self, id: &str, new_username: &str, now: DateTime<Utc>) -> Result<usize> {
        let conn = self.db.conn();
        let mut conn = conn.lock().await;
        let tx = conn.transaction()?;

        tx.execute(
            "UPDATE creators SET username = ?1, updated_at = ?2 WHERE id = ?3",
            rusqlite::params![new_username, timestamp(&now), id],
        )?;

        let mut rewritten = 0;
        for table in USERNAME_TABLES {
            rewritten += tx.execute(
                &format!("UPDATE {} SET creator_username = ?1 WHERE creator_id = ?2", table),
                rusqlite::params![new_username, id],
            )?;
        }

        tx.commit()?;
        info!(
            "DB: Renamed creator: id={}, username={}, rewritten_rows={}",
            id, new_username, rewritten
        );
        Ok(rewritten)
    }
}
