//! Archival of aged donations and media shares

use crate::{
    db::{Database, DonationQueries, MediaShareQueries},
    DonateError, DonateResult,
};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

/// Reason recorded on every history row written by this job
pub const ARCHIVE_REASON: &str = "aged";

/// Result of one archival run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArchiveReport {
    /// Records moved to history
    pub archived: usize,
    /// Records that could not be moved
    pub failed: usize,
    /// Donations among `archived`
    pub donations_archived: usize,
    /// Media shares among `archived`
    pub media_shares_archived: usize,
    /// One message per failed record
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

/// Moves aged terminal records into the history tables
pub struct ArchiveService {
    db: Arc<Database>,
}

impl ArchiveService {
    /// Create a new archive service
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Archive records older than `threshold_hours`
    pub async fn archive_aged(&self, threshold_hours: i64) -> DonateResult<ArchiveReport> {
        self.archive_aged_at(threshold_hours, Utc::now()).await
    }

    /// Archive records older than `threshold_hours` as seen from `now`
    pub async fn archive_aged_at(
        &self,
        threshold_hours: i64,
        now: DateTime<Utc>,
    ) -> DonateResult<ArchiveReport> {
        if threshold_hours < 0 {
            return Err(DonateError::Validation(
                "Archive threshold cannot be negative".to_string(),
            ));
        }
        let cutoff = Duration::try_hours(threshold_hours)
            .and_then(|age| now.checked_sub_signed(age))
            .ok_or_else(|| {
                DonateError::Validation(format!(
                    "Archive threshold of {} hours is out of range",
                    threshold_hours
                ))
            })?;
        info!("Archiving records created before {}", cutoff);

        let donations = DonationQueries::new(&self.db);
        let media_shares = MediaShareQueries::new(&self.db);

        let aged_donations = donations
            .list_archivable(cutoff)
            .await
            .map_err(DonateError::database("Failed to list archivable donations"))?;
        let aged_media_shares = media_shares
            .list_archivable(cutoff)
            .await
            .map_err(DonateError::database("Failed to list archivable media shares"))?;

        let mut report = ArchiveReport::default();

        for donation in &aged_donations {
            match donations.archive(donation, ARCHIVE_REASON, now).await {
                Ok(true) => {
                    report.archived += 1;
                    report.donations_archived += 1;
                }
                // Removed by an overlapping run
                Ok(false) => {}
                Err(e) => {
                    error!("Failed to archive donation {}: {}", donation.id, e);
                    report.failed += 1;
                    report.errors.push(format!("donation {}: {}", donation.id, e));
                }
            }
        }

        for media_share in &aged_media_shares {
            match media_shares.archive(media_share, ARCHIVE_REASON, now).await {
                Ok(true) => {
                    report.archived += 1;
                    report.media_shares_archived += 1;
                }
                Ok(false) => {}
                Err(e) => {
                    error!("Failed to archive media share {}: {}", media_share.id, e);
                    report.failed += 1;
                    report
                        .errors
                        .push(format!("media share {}: {}", media_share.id, e));
                }
            }
        }

        info!(
            "Archive run complete: archived={} (donations={}, media_shares={}), failed={}",
            report.archived, report.donations_archived, report.media_shares_archived, report.failed
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{DonationStatus, MediaRequest, MediaShareStatus};
    use crate::media::MediaShareService;
    use crate::test_support;

    #[tokio::test]
    async fn test_archives_aged_paid_donation_once() {
        let db = test_support::database().await;
        let service = ArchiveService::new(db.clone());
        let creator = test_support::creator(&db, "alice").await;

        let now = Utc::now();
        let aged = test_support::donation(
            &db,
            &creator,
            "Budi",
            10_000,
            DonationStatus::Paid,
            now - Duration::hours(100),
        )
        .await;
        let recent = test_support::donation(
            &db,
            &creator,
            "Sari",
            10_000,
            DonationStatus::Paid,
            now - Duration::hours(1),
        )
        .await;
        let pending = test_support::donation(
            &db,
            &creator,
            "Joko",
            10_000,
            DonationStatus::Pending,
            now - Duration::hours(100),
        )
        .await;

        let report = service.archive_aged_at(72, now).await.unwrap();
        assert_eq!(report.archived, 1);
        assert_eq!(report.donations_archived, 1);
        assert_eq!(report.failed, 0);

        let queries = DonationQueries::new(&db);
        assert!(queries.get_by_id(&aged.id).await.unwrap().is_none());
        let history = queries.get_history(&aged.id).await.unwrap().unwrap();
        assert_eq!(history.archive_reason, ARCHIVE_REASON);
        assert_eq!(history.donation.amount, 10_000);
        assert_eq!(history.archived_at.timestamp_millis(), now.timestamp_millis());

        assert!(queries.get_by_id(&recent.id).await.unwrap().is_some());
        assert!(queries.get_by_id(&pending.id).await.unwrap().is_some());

        let second = service.archive_aged_at(72, now).await.unwrap();
        assert_eq!(second.archived, 0);
        assert_eq!(second, ArchiveReport::default());
    }

    #[tokio::test]
    async fn test_archives_finished_media_shares() {
        let db = test_support::database().await;
        let service = ArchiveService::new(db.clone());
        let media = MediaShareService::new(db.clone());
        let creator = test_support::creator(&db, "alice").await;

        let mut donation =
            test_support::donation(&db, &creator, "Budi", 10_000, DonationStatus::Paid, Utc::now())
                .await;
        donation.media = Some(MediaRequest {
            video_url: "https://youtu.be/dQw4w9WgXcQ".to_string(),
            start_seconds: 0,
            duration_seconds: 15,
        });
        let played = media.enqueue_for_donation(&donation).await.unwrap().unwrap();
        media
            .update_status(&played.id, MediaShareStatus::Played)
            .await
            .unwrap();

        let mut other = donation.clone();
        other.id = uuid::Uuid::new_v4().to_string();
        let waiting = media.enqueue_for_donation(&other).await.unwrap().unwrap();

        let later = Utc::now() + Duration::hours(100);
        let report = service.archive_aged_at(72, later).await.unwrap();
        assert_eq!(report.media_shares_archived, 1);
        assert_eq!(report.donations_archived, 1);
        assert_eq!(report.archived, 2);

        let queries = MediaShareQueries::new(&db);
        assert!(queries.get_history(&played.id).await.unwrap().is_some());
        assert!(queries.get_by_id(&waiting.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_negative_threshold_is_rejected() {
        let db = test_support::database().await;
        let service = ArchiveService::new(db);
        let err = service.archive_aged(-1).await.unwrap_err();
        assert!(matches!(err, DonateError::Validation(_)));
    }

    #[tokio::test]
    async fn test_oversized_threshold_is_rejected() {
        let db = test_support::database().await;
        let service = ArchiveService::new(db);
        let err = service.archive_aged(i64::MAX).await.unwrap_err();
        assert!(matches!(err, DonateError::Validation(_)));

        // Three hundred thousand years back is before the earliest representable date
        let err = service.archive_aged(24 * 366 * 300_000).await.unwrap_err();
        assert!(matches!(err, DonateError::Validation(_)));
    }
}
