//! Monthly leaderboard queries

use super::Json;
use crate::db::{timestamp, Database, LeaderboardEntry, MonthlyLeaderboardModel};
use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row};
use tracing::info;

const LEADERBOARD_COLUMNS: &str = "id, creator_id, creator_username, year, month, top_donors, \
     total_amount, total_donations, unique_donors, average_donation, is_finalized, finalized_at, \
     updated_at";

fn leaderboard_from_row(row: &Row<'_>) -> rusqlite::Result<MonthlyLeaderboardModel> {
    Ok(MonthlyLeaderboardModel {
        id: row.get("id")?,
        creator_id: row.get("creator_id")?,
        creator_username: row.get("creator_username")?,
        year: row.get("year")?,
        month: row.get("month")?,
        top_donors: row.get::<_, Json<Vec<LeaderboardEntry>>>("top_donors")?.0,
        total_amount: row.get("total_amount")?,
        total_donations: row.get("total_donations")?,
        unique_donors: row.get("unique_donors")?,
        average_donation: row.get("average_donation")?,
        is_finalized: row.get("is_finalized")?,
        finalized_at: row.get("finalized_at")?,
        updated_at: row.get("updated_at")?,
    })
}

/// Monthly leaderboard queries
pub struct LeaderboardQueries<'a> {
    db: &'a Database,
}

impl<'a> LeaderboardQueries<'a> {
    /// Create a new query instance
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Get the leaderboard of a creator for one month
    pub async fn get(
        &self,
        creator_id: &str,
        year: i32,
        month: u32,
    ) -> Result<Option<MonthlyLeaderboardModel>> {
        let conn = self.db.conn();
        let conn = conn.lock().await;
        let board = conn
            .query_row(
                &format!(
                    "SELECT {} FROM monthly_leaderboards WHERE creator_id = ?1 AND year = ?2 AND month = ?3",
                    LEADERBOARD_COLUMNS
                ),
                rusqlite::params![creator_id, year, month],
                leaderboard_from_row,
            )
            .optional()?;
        Ok(board)
    }

    /// Insert or replace the computed figures of a leaderboard.
    ///
    /// A finalized row is left untouched. Returns whether a row was written.
    pub async fn upsert(&self, board: &MonthlyLeaderboardModel) -> Result<bool> {
        let top_donors = serde_json::to_string(&board.top_donors)?;
        let conn = self.db.conn();
        let conn = conn.lock().await;
        let written = conn.execute(
            r#"
            INSERT INTO monthly_leaderboards (id, creator_id, creator_username, year, month, top_donors, total_amount, total_donations, unique_donors, average_donation, is_finalized, finalized_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 0, NULL, ?11)
            ON CONFLICT (creator_id, year, month) DO UPDATE SET
                creator_username = excluded.creator_username,
                top_donors = excluded.top_donors,
                total_amount = excluded.total_amount,
                total_donations = excluded.total_donations,
                unique_donors = excluded.unique_donors,
                average_donation = excluded.average_donation,
                updated_at = excluded.updated_at
            WHERE monthly_leaderboards.is_finalized = 0
            "#,
            rusqlite::params![
                &board.id,
                &board.creator_id,
                &board.creator_username,
                board.year,
                board.month,
                top_donors,
                board.total_amount,
                board.total_donations,
                board.unique_donors,
                board.average_donation,
                timestamp(&board.updated_at),
            ],
        )?;
        info!(
            "DB: Upserted leaderboard: creator={}, period={}-{:02}, written={}",
            board.creator_username,
            board.year,
            board.month,
            written > 0
        );
        Ok(written > 0)
    }

    /// Mark a leaderboard as finalized. Returns false if it already was.
    pub async fn finalize(
        &self,
        creator_id: &str,
        year: i32,
        month: u32,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let conn = self.db.conn();
        let conn = conn.lock().await;
        let changed = conn.execute(
            r#"
            UPDATE monthly_leaderboards
            SET is_finalized = 1, finalized_at = ?1
            WHERE creator_id = ?2 AND year = ?3 AND month = ?4 AND is_finalized = 0
            "#,
            rusqlite::params![timestamp(&now), creator_id, year, month],
        )?;
        info!(
            "DB: Finalize leaderboard: creator_id={}, period={}-{:02}, applied={}",
            creator_id,
            year,
            month,
            changed > 0
        );
        Ok(changed > 0)
    }
}
