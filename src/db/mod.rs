//! Database module for donate-server
//!
//! This module handles persistent storage for:
//! - Creators and their settings
//! - Live donations and media shares, plus their archived history
//! - Monthly leaderboards
//! - Payout requests

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

mod models;
mod queries;

pub use models::*;
pub use queries::*;

/// Database connection pool
#[derive(Clone)]
pub struct Database {
    /// SQLite connection (wrapped in Arc<Mutex> for thread safety)
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Connect to the database
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        info!("Connecting to database at {}", database_url);

        let path = database_url.strip_prefix("sqlite:").unwrap_or(database_url);

        // Ensure the directory exists for file-based databases
        if path != ":memory:" {
            if let Some(parent) = Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }
        }

        let conn = Connection::open(path)?;

        Self::run_migrations(&conn)?;

        info!("Database connected successfully");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run database migrations
    fn run_migrations(conn: &Connection) -> anyhow::Result<()> {
        debug!("Running database migrations...");

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS creators (
                id TEXT PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                display_name TEXT NOT NULL,
                email TEXT,
                bank_name TEXT,
                bank_account_number TEXT,
                bank_account_holder TEXT,
                filtered_words TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS donations (
                id TEXT PRIMARY KEY,
                merchant_ref TEXT NOT NULL UNIQUE,
                donor_name TEXT NOT NULL,
                message TEXT NOT NULL DEFAULT '',
                amount INTEGER NOT NULL CHECK (amount > 0),
                status TEXT NOT NULL,
                creator_id TEXT NOT NULL,
                creator_username TEXT NOT NULL,
                media_video_url TEXT,
                media_start_seconds INTEGER,
                media_duration_seconds INTEGER,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                paid_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_donations_creator_status
                ON donations(creator_id, status);
            CREATE INDEX IF NOT EXISTS idx_donations_status_created
                ON donations(status, created_at);

            CREATE TABLE IF NOT EXISTS donation_history (
                id TEXT PRIMARY KEY,
                merchant_ref TEXT NOT NULL UNIQUE,
                donor_name TEXT NOT NULL,
                message TEXT NOT NULL DEFAULT '',
                amount INTEGER NOT NULL,
                status TEXT NOT NULL,
                creator_id TEXT NOT NULL,
                creator_username TEXT NOT NULL,
                media_video_url TEXT,
                media_start_seconds INTEGER,
                media_duration_seconds INTEGER,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                paid_at TEXT,
                archive_reason TEXT NOT NULL,
                archived_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_donation_history_creator
                ON donation_history(creator_id, status, created_at);

            CREATE TABLE IF NOT EXISTS media_shares (
                id TEXT PRIMARY KEY,
                donation_id TEXT NOT NULL UNIQUE,
                creator_id TEXT NOT NULL,
                creator_username TEXT NOT NULL,
                donor_name TEXT NOT NULL,
                message TEXT NOT NULL DEFAULT '',
                amount INTEGER NOT NULL,
                video_url TEXT NOT NULL,
                start_seconds INTEGER NOT NULL DEFAULT 0,
                duration_seconds INTEGER NOT NULL,
                queue_position INTEGER NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_media_shares_creator
                ON media_shares(creator_id, queue_position);

            CREATE TABLE IF NOT EXISTS media_share_history (
                id TEXT PRIMARY KEY,
                donation_id TEXT NOT NULL,
                creator_id TEXT NOT NULL,
                creator_username TEXT NOT NULL,
                donor_name TEXT NOT NULL,
                message TEXT NOT NULL DEFAULT '',
                amount INTEGER NOT NULL,
                video_url TEXT NOT NULL,
                start_seconds INTEGER NOT NULL DEFAULT 0,
                duration_seconds INTEGER NOT NULL,
                queue_position INTEGER NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                archive_reason TEXT NOT NULL,
                archived_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS monthly_leaderboards (
                id TEXT PRIMARY KEY,
                creator_id TEXT NOT NULL,
                creator_username TEXT NOT NULL,
                year INTEGER NOT NULL,
                month INTEGER NOT NULL,
                top_donors TEXT NOT NULL DEFAULT '[]',
                total_amount INTEGER NOT NULL DEFAULT 0,
                total_donations INTEGER NOT NULL DEFAULT 0,
                unique_donors INTEGER NOT NULL DEFAULT 0,
                average_donation INTEGER NOT NULL DEFAULT 0,
                is_finalized BOOLEAN NOT NULL DEFAULT 0,
                finalized_at TEXT,
                updated_at TEXT NOT NULL,
                UNIQUE (creator_id, year, month)
            );

            CREATE TABLE IF NOT EXISTS payouts (
                id TEXT PRIMARY KEY,
                creator_id TEXT NOT NULL,
                creator_username TEXT NOT NULL,
                amount INTEGER NOT NULL CHECK (amount > 0),
                bank_name TEXT NOT NULL,
                bank_account_number TEXT NOT NULL,
                bank_account_holder TEXT NOT NULL,
                status TEXT NOT NULL,
                notes TEXT,
                requested_at TEXT NOT NULL,
                processed_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_payouts_creator ON payouts(creator_id);
            CREATE UNIQUE INDEX IF NOT EXISTS idx_payouts_one_pending
                ON payouts(creator_id) WHERE status = 'PENDING';
            "#,
        )?;

        debug!("Database migrations completed");
        Ok(())
    }

    /// Get the database connection
    pub fn conn(&self) -> Arc<Mutex<Connection>> {
        self.conn.clone()
    }

    /// Check that the connection still answers queries
    pub async fn ping(&self) -> bool {
        let conn = self.conn.lock().await;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .is_ok()
    }

    /// Close the database connection
    pub async fn close(&self) {
        info!("Closing database connection...");
        // The connection will be closed when the Arc is dropped
        info!("Database connection closed");
    }
}

/// Format a timestamp the way every table stores it.
///
/// Fixed-width RFC 3339 in UTC with millisecond precision, so plain string
/// comparison in SQL orders timestamps correctly.
pub fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_database_connect() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        assert!(db.ping().await);

        let conn_lock = db.conn();
        let conn = conn_lock.lock().await;
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 7);
    }

    #[test]
    fn test_timestamp_is_fixed_width() {
        let a = "2026-01-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let b = a + chrono::Duration::milliseconds(1500);
        assert_eq!(timestamp(&a), "2026-01-01T00:00:00.000Z");
        assert_eq!(timestamp(&b), "2026-01-01T00:00:01.500Z");
        assert!(timestamp(&a) < timestamp(&b));
    }
}
