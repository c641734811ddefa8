//! Monthly donor leaderboards
//!
//! Months are calendar months in Western Indonesia Time (WIB, UTC+07:00,
//! no daylight saving). A board is recomputed from PAID donations, live and
//! archived, until it is finalized; after that it never changes.

use crate::{
    config::Config,
    creator::CreatorService,
    db::{
        CreatorModel, CreatorQueries, Database, DonationQueries, LeaderboardEntry,
        LeaderboardQueries, MonthlyLeaderboardModel, PaidDonationRow,
    },
    DonateError, DonateResult,
};
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};

/// WIB offset from UTC
const WIB_OFFSET_HOURS: i64 = 7;

/// Scheduled runs in the first days of a month also close the previous one
const FINALIZE_WINDOW_DAYS: u32 = 2;

/// WIB calendar (year, month) of an instant
pub fn wib_year_month(at: DateTime<Utc>) -> (i32, u32) {
    let local = at.naive_utc() + Duration::hours(WIB_OFFSET_HOURS);
    (local.year(), local.month())
}

fn wib_day(at: DateTime<Utc>) -> u32 {
    (at.naive_utc() + Duration::hours(WIB_OFFSET_HOURS)).day()
}

/// The month before `(year, month)`
pub fn previous_month(year: i32, month: u32) -> (i32, u32) {
    if month == 1 {
        (year - 1, 12)
    } else {
        (year, month - 1)
    }
}

fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}

fn month_start(year: i32, month: u32) -> Option<DateTime<Utc>> {
    let midnight = NaiveDate::from_ymd_opt(year, month, 1)?.and_hms_opt(0, 0, 0)?;
    Some(Utc.from_utc_datetime(&(midnight - Duration::hours(WIB_OFFSET_HOURS))))
}

/// UTC bounds `[start, end)` of a WIB calendar month
pub fn month_window(year: i32, month: u32) -> DonateResult<(DateTime<Utc>, DateTime<Utc>)> {
    let invalid = || DonateError::Validation(format!("Invalid month {}-{:02}", year, month));
    let start = month_start(year, month).ok_or_else(invalid)?;
    let (next_year, next) = next_month(year, month);
    let end = month_start(next_year, next).ok_or_else(invalid)?;
    Ok((start, end))
}

/// Aggregate figures of one month
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonthTotals {
    /// Sum of all amounts
    pub total_amount: i64,
    /// Number of donations
    pub total_donations: i64,
    /// Distinct donor names
    pub unique_donors: i64,
}

/// Group donations by donor and rank them, keeping the top `limit`.
///
/// Ties on total are broken by donation count (more first), then by the
/// earliest first donation, then by name.
pub fn rank_donors(rows: &[PaidDonationRow], limit: usize) -> (Vec<LeaderboardEntry>, MonthTotals) {
    let mut by_donor: HashMap<&str, LeaderboardEntry> = HashMap::new();
    let mut totals = MonthTotals::default();

    for row in rows {
        totals.total_amount += row.amount;
        totals.total_donations += 1;

        let name = row.donor_name.trim();
        let entry = by_donor.entry(name).or_insert_with(|| LeaderboardEntry {
            rank: 0,
            donor_name: name.to_string(),
            total_amount: 0,
            donation_count: 0,
            average_amount: 0,
            first_donation_at: row.created_at,
            last_donation_at: row.created_at,
        });
        entry.total_amount += row.amount;
        entry.donation_count += 1;
        entry.first_donation_at = entry.first_donation_at.min(row.created_at);
        entry.last_donation_at = entry.last_donation_at.max(row.created_at);
    }
    totals.unique_donors = by_donor.len() as i64;

    let mut entries: Vec<LeaderboardEntry> = by_donor.into_values().collect();
    entries.sort_by(|a, b| {
        b.total_amount
            .cmp(&a.total_amount)
            .then(b.donation_count.cmp(&a.donation_count))
            .then(a.first_donation_at.cmp(&b.first_donation_at))
            .then_with(|| a.donor_name.cmp(&b.donor_name))
    });
    entries.truncate(limit);

    for (i, entry) in entries.iter_mut().enumerate() {
        entry.rank = i as u32 + 1;
        entry.average_amount = entry.total_amount / entry.donation_count;
    }

    (entries, totals)
}

/// Result of recomputing one board
#[derive(Debug, Clone)]
pub enum LeaderboardUpdate {
    /// Board written with fresh figures
    Updated(MonthlyLeaderboardModel),
    /// Board already finalized; stored figures returned unchanged
    Frozen(MonthlyLeaderboardModel),
}

impl LeaderboardUpdate {
    /// The board, whichever way it went
    pub fn board(&self) -> &MonthlyLeaderboardModel {
        match self {
            Self::Updated(board) | Self::Frozen(board) => board,
        }
    }

    /// Whether new figures were written
    pub fn is_updated(&self) -> bool {
        matches!(self, Self::Updated(_))
    }
}

/// Result of one scheduled run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LeaderboardReport {
    /// Boards written
    pub updated: usize,
    /// Boards that could not be updated or finalized
    pub failed: usize,
    /// Boards finalized by this run
    pub finalized: usize,
    /// One message per failure
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

/// Service computing and freezing monthly leaderboards
pub struct LeaderboardService {
    config: Arc<Config>,
    db: Arc<Database>,
}

impl LeaderboardService {
    /// Create a new leaderboard service
    pub fn new(config: Arc<Config>, db: Arc<Database>) -> Self {
        Self { config, db }
    }

    async fn creator_by_id(&self, creator_id: &str) -> DonateResult<CreatorModel> {
        CreatorQueries::new(&self.db)
            .get_by_id(creator_id)
            .await
            .map_err(DonateError::database("Failed to look up creator"))?
            .ok_or_else(|| DonateError::NotFound(format!("Creator {} not found", creator_id)))
    }

    async fn stored(
        &self,
        creator_id: &str,
        year: i32,
        month: u32,
    ) -> DonateResult<Option<MonthlyLeaderboardModel>> {
        LeaderboardQueries::new(&self.db)
            .get(creator_id, year, month)
            .await
            .map_err(DonateError::database("Failed to load leaderboard"))
    }

    /// Recompute and store a creator's board for one month
    pub async fn update_monthly_data(
        &self,
        creator_id: &str,
        year: i32,
        month: u32,
    ) -> DonateResult<LeaderboardUpdate> {
        let creator = self.creator_by_id(creator_id).await?;
        self.update_for(&creator, year, month).await
    }

    async fn update_for(
        &self,
        creator: &CreatorModel,
        year: i32,
        month: u32,
    ) -> DonateResult<LeaderboardUpdate> {
        let (start, end) = month_window(year, month)?;

        let rows = DonationQueries::new(&self.db)
            .paid_in_range(&creator.id, start, end)
            .await
            .map_err(DonateError::database("Failed to load paid donations"))?;
        let (top_donors, totals) = rank_donors(&rows, self.config.leaderboard.top_donors);

        let board = MonthlyLeaderboardModel {
            id: uuid::Uuid::new_v4().to_string(),
            creator_id: creator.id.clone(),
            creator_username: creator.username.clone(),
            year,
            month,
            top_donors,
            total_amount: totals.total_amount,
            total_donations: totals.total_donations,
            unique_donors: totals.unique_donors,
            average_donation: if totals.total_donations > 0 {
                totals.total_amount / totals.total_donations
            } else {
                0
            },
            is_finalized: false,
            finalized_at: None,
            updated_at: Utc::now(),
        };

        let written = LeaderboardQueries::new(&self.db)
            .upsert(&board)
            .await
            .map_err(DonateError::database("Failed to store leaderboard"))?;

        let stored = self
            .stored(&creator.id, year, month)
            .await?
            .ok_or_else(|| {
                DonateError::Internal(format!(
                    "Leaderboard {}-{:02} of {} missing after upsert",
                    year, month, creator.username
                ))
            })?;

        if written {
            Ok(LeaderboardUpdate::Updated(stored))
        } else {
            info!(
                "Leaderboard {}-{:02} of {} is finalized, not updating",
                year, month, creator.username
            );
            Ok(LeaderboardUpdate::Frozen(stored))
        }
    }

    /// Freeze a creator's board for a month that has ended.
    ///
    /// Returns false if the board was already finalized.
    pub async fn finalize(&self, creator_id: &str, year: i32, month: u32) -> DonateResult<bool> {
        self.finalize_at(creator_id, year, month, Utc::now()).await
    }

    async fn finalize_at(
        &self,
        creator_id: &str,
        year: i32,
        month: u32,
        now: DateTime<Utc>,
    ) -> DonateResult<bool> {
        let (_, end) = month_window(year, month)?;
        if now < end {
            return Err(DonateError::Validation(format!(
                "Month {}-{:02} has not ended yet",
                year, month
            )));
        }

        if self.stored(creator_id, year, month).await?.is_none() {
            self.update_monthly_data(creator_id, year, month).await?;
        }

        LeaderboardQueries::new(&self.db)
            .finalize(creator_id, year, month, now)
            .await
            .map_err(DonateError::database("Failed to finalize leaderboard"))
    }

    /// Recompute a board by creator username
    pub async fn refresh(
        &self,
        username: &str,
        year: i32,
        month: u32,
    ) -> DonateResult<LeaderboardUpdate> {
        let creator = CreatorService::new(self.db.clone()).get(username).await?;
        self.update_for(&creator, year, month).await
    }

    /// Finalize a board by creator username
    pub async fn finalize_for(&self, username: &str, year: i32, month: u32) -> DonateResult<bool> {
        let creator = CreatorService::new(self.db.clone()).get(username).await?;
        self.finalize(&creator.id, year, month).await
    }

    /// Get a stored board
    pub async fn get_board(
        &self,
        username: &str,
        year: i32,
        month: u32,
    ) -> DonateResult<MonthlyLeaderboardModel> {
        let creator = CreatorService::new(self.db.clone()).get(username).await?;
        self.stored(&creator.id, year, month).await?.ok_or_else(|| {
            DonateError::NotFound(format!(
                "No leaderboard for {} in {}-{:02}",
                creator.username, year, month
            ))
        })
    }

    /// Get the current WIB month's board, computing it if none exists yet
    pub async fn current_board(&self, username: &str) -> DonateResult<MonthlyLeaderboardModel> {
        let creator = CreatorService::new(self.db.clone()).get(username).await?;
        let (year, month) = wib_year_month(Utc::now());

        match self.stored(&creator.id, year, month).await? {
            Some(board) => Ok(board),
            None => Ok(self.update_for(&creator, year, month).await?.board().clone()),
        }
    }

    /// Cron entry point: refresh every creator's current month, and close the
    /// previous month during the first days of a new one
    pub async fn run_scheduled(&self, now: DateTime<Utc>) -> DonateResult<LeaderboardReport> {
        let creators = CreatorQueries::new(&self.db)
            .list_all()
            .await
            .map_err(DonateError::database("Failed to list creators"))?;

        let (year, month) = wib_year_month(now);
        let closing = (wib_day(now) <= FINALIZE_WINDOW_DAYS).then(|| previous_month(year, month));

        info!(
            "Leaderboard run for {} creators: period={}-{:02}, closing={:?}",
            creators.len(),
            year,
            month,
            closing
        );

        let mut report = LeaderboardReport::default();

        for creator in &creators {
            match self.update_for(creator, year, month).await {
                Ok(update) => {
                    if update.is_updated() {
                        report.updated += 1;
                    }
                }
                Err(e) => {
                    error!(
                        "Leaderboard update failed for {} {}-{:02}: {}",
                        creator.username, year, month, e
                    );
                    report.failed += 1;
                    report
                        .errors
                        .push(format!("{} {}-{:02}: {}", creator.username, year, month, e));
                }
            }

            let Some((prev_year, prev_month)) = closing else {
                continue;
            };

            let closed = async {
                let update = self.update_for(creator, prev_year, prev_month).await?;
                let finalized = self
                    .finalize_at(&creator.id, prev_year, prev_month, now)
                    .await?;
                Ok::<_, DonateError>((update.is_updated(), finalized))
            };
            match closed.await {
                Ok((updated, finalized)) => {
                    if updated {
                        report.updated += 1;
                    }
                    if finalized {
                        report.finalized += 1;
                    }
                }
                Err(e) => {
                    warn!(
                        "Closing {}-{:02} failed for {}: {}",
                        prev_year, prev_month, creator.username, e
                    );
                    report.failed += 1;
                    report.errors.push(format!(
                        "{} {}-{:02}: {}",
                        creator.username, prev_year, prev_month, e
                    ));
                }
            }
        }

        info!(
            "Leaderboard run complete: updated={}, finalized={}, failed={}",
            report.updated, report.finalized, report.failed
        );

        Ok(report)
    }
}
