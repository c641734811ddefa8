//! Creator payouts
//!
//! A creator may hold at most one PENDING payout request. Admins move it to
//! APPROVED, PROCESSED or REJECTED; nothing moves it back.

use crate::{
    config::{BalancePolicy, Config},
    creator::CreatorService,
    db::{CreatorModel, Database, DonationQueries, PayoutModel, PayoutQueries, PayoutStatus},
    DonateError, DonateResult,
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Payable balance of a creator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Balance {
    /// Creator username
    pub creator_username: String,
    /// Sum of PAID donations, live and archived
    pub paid_total: i64,
    /// Payouts subtracted under the active policy
    pub committed: i64,
    /// What a payout request may draw on
    pub balance: i64,
    /// Minimum payout amount
    pub minimum_payout: i64,
    /// Policy used for the figures
    pub policy: BalancePolicy,
}

/// Service for balances and payout requests
pub struct PayoutService {
    config: Arc<Config>,
    db: Arc<Database>,
}

impl PayoutService {
    /// Create a new payout service
    pub fn new(config: Arc<Config>, db: Arc<Database>) -> Self {
        Self { config, db }
    }

    async fn balance_of(&self, creator: &CreatorModel) -> DonateResult<Balance> {
        let paid_total = DonationQueries::new(&self.db)
            .paid_total(&creator.id)
            .await
            .map_err(DonateError::database("Failed to sum paid donations"))?;

        let policy = self.config.payout.balance_policy;
        let committed = match policy {
            BalancePolicy::Gross => 0,
            BalancePolicy::Net => PayoutQueries::new(&self.db)
                .committed_total(&creator.id)
                .await
                .map_err(DonateError::database("Failed to sum payouts"))?,
        };

        Ok(Balance {
            creator_username: creator.username.clone(),
            paid_total,
            committed,
            balance: paid_total - committed,
            minimum_payout: self.config.payout.minimum_amount,
            policy,
        })
    }

    /// Payable balance of a creator
    pub async fn balance(&self, username: &str) -> DonateResult<Balance> {
        let creator = CreatorService::new(self.db.clone()).get(username).await?;
        self.balance_of(&creator).await
    }

    /// Request a payout; `None` draws the whole balance
    pub async fn request_payout(
        &self,
        username: &str,
        amount: Option<i64>,
    ) -> DonateResult<PayoutModel> {
        let creator = CreatorService::new(self.db.clone()).get(username).await?;
        let balance = self.balance_of(&creator).await?;
        let minimum = self.config.payout.minimum_amount;

        if balance.balance < minimum {
            return Err(DonateError::MinimumBalance {
                balance: balance.balance,
                minimum,
            });
        }

        let queries = PayoutQueries::new(&self.db);
        let pending = queries
            .count_pending(&creator.id)
            .await
            .map_err(DonateError::database("Failed to check pending payouts"))?;
        if pending > 0 {
            return Err(DonateError::Integrity(
                "A payout request is already pending".to_string(),
            ));
        }

        let amount = amount.unwrap_or(balance.balance);
        if amount < minimum {
            return Err(DonateError::Validation(format!(
                "Payout amount must be at least {}",
                minimum
            )));
        }
        if amount > balance.balance {
            return Err(DonateError::Validation(format!(
                "Payout amount {} exceeds balance {}",
                amount, balance.balance
            )));
        }

        let bank = creator.bank_details().ok_or_else(|| {
            DonateError::Validation("Bank details are required for payouts".to_string())
        })?;

        let payout = PayoutModel {
            id: uuid::Uuid::new_v4().to_string(),
            creator_id: creator.id.clone(),
            creator_username: creator.username.clone(),
            amount,
            bank,
            status: PayoutStatus::Pending,
            notes: None,
            requested_at: Utc::now(),
            processed_at: None,
        };

        let inserted = queries
            .insert_if_no_pending(&payout)
            .await
            .map_err(DonateError::database("Failed to insert payout"))?;
        if !inserted {
            warn!("Concurrent payout request for {} refused", creator.username);
            return Err(DonateError::Integrity(
                "A payout request is already pending".to_string(),
            ));
        }

        info!(
            "Payout {} requested by {}: amount={}",
            payout.id, payout.creator_username, payout.amount
        );
        Ok(payout)
    }

    /// Admin decision on a PENDING payout
    pub async fn process_payout(
        &self,
        id: &str,
        status: PayoutStatus,
        notes: Option<String>,
    ) -> DonateResult<PayoutModel> {
        if status == PayoutStatus::Pending {
            return Err(DonateError::Validation(
                "Target status must be APPROVED, PROCESSED or REJECTED".to_string(),
            ));
        }

        let queries = PayoutQueries::new(&self.db);
        let payout = queries
            .get_by_id(id)
            .await
            .map_err(DonateError::database("Failed to look up payout"))?
            .ok_or_else(|| DonateError::NotFound(format!("Payout {} not found", id)))?;

        if payout.status != PayoutStatus::Pending {
            return Err(DonateError::Integrity(format!(
                "Payout {} is already {}",
                id, payout.status
            )));
        }

        let applied = queries
            .process(id, status, notes.as_deref(), Utc::now())
            .await
            .map_err(DonateError::database("Failed to process payout"))?;
        if !applied {
            return Err(DonateError::Integrity(format!(
                "Payout {} was processed concurrently",
                id
            )));
        }

        info!("Payout {} of {} -> {}", id, payout.creator_username, status);

        queries
            .get_by_id(id)
            .await
            .map_err(DonateError::database("Failed to reload payout"))?
            .ok_or_else(|| DonateError::NotFound(format!("Payout {} not found", id)))
    }

    /// Payouts of one creator, newest first
    pub async fn list_for_creator(&self, username: &str) -> DonateResult<Vec<PayoutModel>> {
        let creator = CreatorService::new(self.db.clone()).get(username).await?;
        PayoutQueries::new(&self.db)
            .list_by_creator(&creator.id)
            .await
            .map_err(DonateError::database("Failed to list payouts"))
    }

    /// All payouts, optionally filtered by status
    pub async fn list_all(&self, status: Option<PayoutStatus>) -> DonateResult<Vec<PayoutModel>> {
        PayoutQueries::new(&self.db)
            .list_all(status)
            .await
            .map_err(DonateError::database("Failed to list payouts"))
    }
}
