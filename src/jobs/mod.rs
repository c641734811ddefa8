//! Scheduled batch jobs
//!
//! Both jobs are triggered over HTTP by an external cron and are safe to run
//! concurrently with each other and with themselves. Per-record failures are
//! collected into the job report; only setup failures fail the whole run.

pub mod archive;
pub mod leaderboard;

pub use archive::{ArchiveReport, ArchiveService, ARCHIVE_REASON};
pub use leaderboard::{LeaderboardReport, LeaderboardService, LeaderboardUpdate};
