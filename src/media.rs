//! Media share queue
//!
//! A paid donation that carries a video request becomes a media share at
//! the end of its creator's queue. The overlay plays them in order and
//! reports progress back through `update_status`.

use crate::{
    creator::CreatorService,
    db::{Database, DonationModel, MediaShareModel, MediaShareQueries, MediaShareStatus},
    DonateError, DonateResult,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

/// Whether a playback status change is allowed
pub fn is_valid_transition(from: MediaShareStatus, to: MediaShareStatus) -> bool {
    use MediaShareStatus::*;
    matches!(
        (from, to),
        (Pending, Playing) | (Pending, Played) | (Pending, Skipped) | (Playing, Played) | (Playing, Skipped)
    )
}

/// Service for the media share queue
pub struct MediaShareService {
    db: Arc<Database>,
}

impl MediaShareService {
    /// Create a new media share service
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Queue the media request of a donation, if it has one.
    ///
    /// Returns `None` when the donation has no media request or was
    /// already queued.
    pub async fn enqueue_for_donation(
        &self,
        donation: &DonationModel,
    ) -> DonateResult<Option<MediaShareModel>> {
        let Some(media) = &donation.media else {
            return Ok(None);
        };

        let now = Utc::now();
        let media_share = MediaShareModel {
            id: uuid::Uuid::new_v4().to_string(),
            donation_id: donation.id.clone(),
            creator_id: donation.creator_id.clone(),
            creator_username: donation.creator_username.clone(),
            donor_name: donation.donor_name.clone(),
            message: donation.message.clone(),
            amount: donation.amount,
            video_url: media.video_url.clone(),
            start_seconds: media.start_seconds,
            duration_seconds: media.duration_seconds,
            queue_position: 0,
            status: MediaShareStatus::Pending,
            created_at: now,
            updated_at: now,
        };

        let queued = MediaShareQueries::new(&self.db)
            .enqueue(&media_share)
            .await
            .map_err(DonateError::database("Failed to enqueue media share"))?;

        if let Some(queued) = &queued {
            info!(
                "Queued media share {} for {} at position {}",
                queued.id, queued.creator_username, queued.queue_position
            );
        }

        Ok(queued)
    }

    /// Live media shares of a creator, in queue order
    pub async fn list_queue(&self, username: &str) -> DonateResult<Vec<MediaShareModel>> {
        let creator = CreatorService::new(self.db.clone()).get(username).await?;
        MediaShareQueries::new(&self.db)
            .list_by_creator(&creator.id)
            .await
            .map_err(DonateError::database("Failed to list media shares"))
    }

    /// Move a media share forward in its playback lifecycle
    pub async fn update_status(
        &self,
        id: &str,
        status: MediaShareStatus,
    ) -> DonateResult<MediaShareModel> {
        let queries = MediaShareQueries::new(&self.db);
        let media_share = queries
            .get_by_id(id)
            .await
            .map_err(DonateError::database("Failed to look up media share"))?
            .ok_or_else(|| DonateError::NotFound(format!("Media share {} not found", id)))?;

        if !is_valid_transition(media_share.status, status) {
            return Err(DonateError::Integrity(format!(
                "Cannot move media share from {} to {}",
                media_share.status, status
            )));
        }

        let now = Utc::now();
        let applied = queries
            .transition_status(id, media_share.status, status, now)
            .await
            .map_err(DonateError::database("Failed to update media share"))?;

        if !applied {
            return Err(DonateError::Integrity(format!(
                "Media share {} changed concurrently",
                id
            )));
        }

        Ok(MediaShareModel {
            status,
            updated_at: now,
            ..media_share
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{DonationStatus, MediaRequest};
    use crate::test_support;

    async fn paid_with_media(db: &Database, username: &str) -> DonationModel {
        let creator = match crate::db::CreatorQueries::new(db)
            .get_by_username(username)
            .await
            .unwrap()
        {
            Some(creator) => creator,
            None => test_support::creator(db, username).await,
        };
        let mut donation =
            test_support::donation(db, &creator, "Budi", 25_000, DonationStatus::Paid, Utc::now())
                .await;
        donation.media = Some(MediaRequest {
            video_url: "https://youtu.be/dQw4w9WgXcQ".to_string(),
            start_seconds: 10,
            duration_seconds: 30,
        });
        donation
    }

    #[test]
    fn test_transition_rules() {
        use MediaShareStatus::*;
        assert!(is_valid_transition(Pending, Playing));
        assert!(is_valid_transition(Playing, Skipped));
        assert!(!is_valid_transition(Playing, Pending));
        assert!(!is_valid_transition(Played, Playing));
        assert!(!is_valid_transition(Skipped, Played));
    }

    #[tokio::test]
    async fn test_enqueue_appends_and_is_once_per_donation() {
        let db = test_support::database().await;
        let service = MediaShareService::new(db.clone());

        let first = paid_with_media(&db, "alice").await;
        let second = paid_with_media(&db, "alice").await;

        let a = service.enqueue_for_donation(&first).await.unwrap().unwrap();
        let b = service.enqueue_for_donation(&second).await.unwrap().unwrap();
        assert_eq!(a.queue_position, 1);
        assert_eq!(b.queue_position, 2);

        assert!(service.enqueue_for_donation(&first).await.unwrap().is_none());

        let queue = service.list_queue("alice").await.unwrap();
        assert_eq!(queue.len(), 2);
        assert_eq!(queue[0].donation_id, first.id);
    }

    #[tokio::test]
    async fn test_donation_without_media_is_not_queued() {
        let db = test_support::database().await;
        let service = MediaShareService::new(db.clone());
        let mut donation = paid_with_media(&db, "alice").await;
        donation.media = None;

        assert!(service.enqueue_for_donation(&donation).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_status_rejects_going_backwards() {
        let db = test_support::database().await;
        let service = MediaShareService::new(db.clone());
        let donation = paid_with_media(&db, "alice").await;
        let queued = service.enqueue_for_donation(&donation).await.unwrap().unwrap();

        let playing = service
            .update_status(&queued.id, MediaShareStatus::Playing)
            .await
            .unwrap();
        assert_eq!(playing.status, MediaShareStatus::Playing);

        let err = service
            .update_status(&queued.id, MediaShareStatus::Pending)
            .await
            .unwrap_err();
        assert!(matches!(err, DonateError::Integrity(_)));

        service
            .update_status(&queued.id, MediaShareStatus::Played)
            .await
            .unwrap();
        let err = service
            .update_status(&queued.id, MediaShareStatus::Skipped)
            .await
            .unwrap_err();
        assert!(matches!(err, DonateError::Integrity(_)));
    }

    #[tokio::test]
    async fn test_update_unknown_media_share() {
        let db = test_support::database().await;
        let service = MediaShareService::new(db);
        let err = service
            .update_status("missing", MediaShareStatus::Played)
            .await
            .unwrap_err();
        assert!(matches!(err, DonateError::NotFound(_)));
    }
}
