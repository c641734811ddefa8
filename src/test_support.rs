//! Shared fixtures for unit tests

use crate::config::Config;
use crate::db::{
    CreatorModel, CreatorQueries, Database, DonationModel, DonationQueries, DonationStatus,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub const SERVER_KEY: &str = "SB-Mid-server-test";
pub const CRON_SECRET: &str = "cron-secret";
pub const ADMIN_TOKEN: &str = "admin-token";

pub fn config() -> Config {
    let mut config = Config::default();
    config.payment.server_key = SERVER_KEY.to_string();
    config.jobs.cron_secret = Some(CRON_SECRET.to_string());
    config.admin.token = Some(ADMIN_TOKEN.to_string());
    config
}

pub async fn database() -> Arc<Database> {
    Arc::new(Database::connect("sqlite::memory:").await.unwrap())
}

/// Insert a creator with complete bank details
pub async fn creator(db: &Database, username: &str) -> CreatorModel {
    let now = Utc::now();
    let creator = CreatorModel {
        id: uuid::Uuid::new_v4().to_string(),
        username: username.to_string(),
        display_name: username.to_string(),
        email: None,
        bank_name: Some("BCA".to_string()),
        bank_account_number: Some("1234567890".to_string()),
        bank_account_holder: Some(username.to_string()),
        filtered_words: Vec::new(),
        created_at: now,
        updated_at: now,
    };
    CreatorQueries::new(db).insert(&creator).await.unwrap();
    creator
}

/// Insert a live donation with a chosen status and creation time
pub async fn donation(
    db: &Database,
    creator: &CreatorModel,
    donor: &str,
    amount: i64,
    status: DonationStatus,
    created_at: DateTime<Utc>,
) -> DonationModel {
    let donation = DonationModel {
        id: uuid::Uuid::new_v4().to_string(),
        merchant_ref: format!("DONATE-{}", uuid::Uuid::new_v4()),
        donor_name: donor.to_string(),
        message: String::new(),
        amount,
        status,
        creator_id: creator.id.clone(),
        creator_username: creator.username.clone(),
        media: None,
        created_at,
        updated_at: created_at,
        paid_at: (status == DonationStatus::Paid).then_some(created_at),
    };
    DonationQueries::new(db).insert(&donation).await.unwrap();
    donation
}

/// Gateway signature for a webhook body
pub fn sign(order_id: &str, status_code: &str, gross_amount: &str) -> String {
    crate::donation::signature::compute(order_id, status_code, gross_amount, SERVER_KEY)
}
