//! Donation lifecycle
//!
//! Donations are created PENDING by the API and settled by the payment
//! gateway's webhook. The webhook is the only writer of payment status:
//!
//! ```text
//! PENDING ──capture/settlement──▶ PAID (sticky)
//!    │                             ▲
//!    └──expire/cancel/deny──▶ UNPAID
//! ```
//!
//! The transition into PAID happens at most once per donation, and only that
//! transition queues media and publishes a notification.

pub mod filter;
pub mod signature;

use crate::{
    config::Config,
    creator::CreatorService,
    db::{Database, DonationModel, DonationQueries, DonationStatus, MediaRequest},
    media::MediaShareService,
    notify::{DonationEvent, NotificationHub},
    DonateError, DonateResult,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Prefix of the merchant reference sent to the gateway as `order_id`
pub const MERCHANT_REF_PREFIX: &str = "DONATE-";

/// Donation creation input
#[derive(Debug, Clone, Deserialize)]
pub struct CreateDonation {
    /// Donor display name
    pub donor_name: String,
    /// Optional message
    #[serde(default)]
    pub message: Option<String>,
    /// Amount in whole currency units
    pub amount: i64,
    /// Optional video request
    #[serde(default)]
    pub media: Option<MediaRequest>,
}

/// Payment gateway notification body
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentWebhook {
    /// Merchant reference of the donation
    pub order_id: String,
    /// Gateway status vocabulary (`settlement`, `expire`, ...)
    pub transaction_status: String,
    /// Gateway status code, part of the signature
    pub status_code: String,
    /// Decimal amount string, e.g. `"50000.00"`
    pub gross_amount: String,
    /// Hex SHA-512 signature
    pub signature_key: String,
}

/// What a webhook did to the donation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WebhookOutcome {
    /// Status changed
    Updated {
        /// Previous status
        from: DonationStatus,
        /// New status
        to: DonationStatus,
    },
    /// Mapped status was redundant or blocked by a sticky PAID
    Unchanged {
        /// Current status
        status: DonationStatus,
    },
    /// Gateway status has no mapping
    Ignored {
        /// The unmapped gateway status
        transaction_status: String,
    },
}

/// Map the gateway status vocabulary onto donation statuses
pub fn map_transaction_status(transaction_status: &str) -> Option<DonationStatus> {
    match transaction_status {
        "capture" | "settlement" => Some(DonationStatus::Paid),
        "expire" | "cancel" | "deny" => Some(DonationStatus::Unpaid),
        _ => None,
    }
}

fn validate_media(media: &MediaRequest) -> DonateResult<()> {
    let url = media.video_url.trim();
    if !(url.starts_with("https://") || url.starts_with("http://")) {
        return Err(DonateError::Validation(
            "Media URL must be an http(s) URL".to_string(),
        ));
    }
    if media.duration_seconds <= 0 {
        return Err(DonateError::Validation(
            "Media duration must be positive".to_string(),
        ));
    }
    if media.start_seconds < 0 {
        return Err(DonateError::Validation(
            "Media start cannot be negative".to_string(),
        ));
    }
    Ok(())
}

/// Service for creating donations and applying gateway notifications
pub struct DonationService {
    config: Arc<Config>,
    db: Arc<Database>,
    notifier: Arc<NotificationHub>,
}

impl DonationService {
    /// Create a new donation service
    pub fn new(config: Arc<Config>, db: Arc<Database>, notifier: Arc<NotificationHub>) -> Self {
        Self {
            config,
            db,
            notifier,
        }
    }

    /// Create a PENDING donation for a creator
    pub async fn create_donation(
        &self,
        username: &str,
        input: CreateDonation,
    ) -> DonateResult<DonationModel> {
        let payment = &self.config.payment;

        let donor_name = input.donor_name.trim();
        if donor_name.is_empty() {
            return Err(DonateError::Validation(
                "Donor name is required".to_string(),
            ));
        }
        if input.amount < payment.min_donation.max(1) {
            return Err(DonateError::Validation(format!(
                "Amount must be at least {}",
                payment.min_donation.max(1)
            )));
        }
        let message = input.message.unwrap_or_default();
        if message.chars().count() > payment.max_message_len {
            return Err(DonateError::Validation(format!(
                "Message cannot exceed {} characters",
                payment.max_message_len
            )));
        }
        if let Some(media) = &input.media {
            validate_media(media)?;
        }

        let creator = CreatorService::new(self.db.clone()).get(username).await?;

        let now = Utc::now();
        let donation = DonationModel {
            id: uuid::Uuid::new_v4().to_string(),
            merchant_ref: format!("{}{}", MERCHANT_REF_PREFIX, uuid::Uuid::new_v4()),
            donor_name: filter::mask_filtered(donor_name, &creator.filtered_words),
            message: filter::mask_filtered(message.trim(), &creator.filtered_words),
            amount: input.amount,
            status: DonationStatus::Pending,
            creator_id: creator.id,
            creator_username: creator.username,
            media: input.media.map(|m| MediaRequest {
                video_url: m.video_url.trim().to_string(),
                ..m
            }),
            created_at: now,
            updated_at: now,
            paid_at: None,
        };

        DonationQueries::new(&self.db)
            .insert(&donation)
            .await
            .map_err(DonateError::database("Failed to insert donation"))?;

        info!(
            "Created donation {} for {}: amount={}",
            donation.merchant_ref, donation.creator_username, donation.amount
        );

        Ok(donation)
    }

    /// Get a live donation by merchant reference
    pub async fn get_by_merchant_ref(&self, merchant_ref: &str) -> DonateResult<DonationModel> {
        DonationQueries::new(&self.db)
            .get_by_merchant_ref(merchant_ref)
            .await
            .map_err(DonateError::database("Failed to look up donation"))?
            .ok_or_else(|| DonateError::NotFound(format!("Donation {} not found", merchant_ref)))
    }

    /// Live donations of a creator, newest first, with the total count
    pub async fn list_for_creator(
        &self,
        username: &str,
        limit: u32,
        offset: u32,
    ) -> DonateResult<(Vec<DonationModel>, u64)> {
        let creator = CreatorService::new(self.db.clone()).get(username).await?;
        let queries = DonationQueries::new(&self.db);

        let donations = queries
            .list_by_creator(&creator.id, limit, offset)
            .await
            .map_err(DonateError::database("Failed to list donations"))?;
        let total = queries
            .count_by_creator(&creator.id)
            .await
            .map_err(DonateError::database("Failed to count donations"))?;

        Ok((donations, total))
    }

    /// Apply a payment gateway notification
    pub async fn apply_webhook(&self, payload: PaymentWebhook) -> DonateResult<WebhookOutcome> {
        if !signature::verify(
            &payload.order_id,
            &payload.status_code,
            &payload.gross_amount,
            &self.config.payment.server_key,
            &payload.signature_key,
        ) {
            warn!("Rejected webhook for {}: invalid signature", payload.order_id);
            return Err(DonateError::Forbidden("Invalid signature".to_string()));
        }

        let donation = self.get_by_merchant_ref(&payload.order_id).await?;

        match signature::parse_gross_amount(&payload.gross_amount) {
            Some(amount) if amount == donation.amount => {}
            _ => {
                warn!(
                    "Rejected webhook for {}: gross_amount {} does not match {}",
                    donation.merchant_ref, payload.gross_amount, donation.amount
                );
                return Err(DonateError::Integrity(format!(
                    "Amount {} does not match donation amount {}",
                    payload.gross_amount, donation.amount
                )));
            }
        }

        let Some(target) = map_transaction_status(&payload.transaction_status) else {
            debug!(
                "Ignoring transaction_status {} for {}",
                payload.transaction_status, donation.merchant_ref
            );
            return Ok(WebhookOutcome::Ignored {
                transaction_status: payload.transaction_status,
            });
        };

        if donation.status == DonationStatus::Paid || donation.status == target {
            return Ok(WebhookOutcome::Unchanged {
                status: donation.status,
            });
        }

        let applied = DonationQueries::new(&self.db)
            .transition_status(&donation.id, donation.status, target, Utc::now())
            .await
            .map_err(DonateError::database("Failed to update donation status"))?;

        if !applied {
            // Another delivery won the race; report what it left behind.
            let current = self.get_by_merchant_ref(&donation.merchant_ref).await?;
            return Ok(WebhookOutcome::Unchanged {
                status: current.status,
            });
        }

        info!(
            "Donation {} moved {} -> {}",
            donation.merchant_ref, donation.status, target
        );

        if target == DonationStatus::Paid {
            self.on_paid(&donation).await;
        }

        Ok(WebhookOutcome::Updated {
            from: donation.status,
            to: target,
        })
    }

    async fn on_paid(&self, donation: &DonationModel) {
        // The PAID transition is already committed, so failures here are
        // logged only.
        if let Err(e) = MediaShareService::new(self.db.clone())
            .enqueue_for_donation(donation)
            .await
        {
            error!(
                "Failed to queue media share for {}: {}",
                donation.merchant_ref, e
            );
        }

        self.notifier.publish(DonationEvent {
            donation_id: donation.id.clone(),
            creator_username: donation.creator_username.clone(),
            name: donation.donor_name.clone(),
            amount: donation.amount,
            message: donation.message.clone(),
            created_at: donation.created_at,
        });
    }
}
