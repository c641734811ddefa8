//! Creator registry
//!
//! Usernames are copied onto every record a creator owns, so renaming is a
//! store-wide operation rather than a single-row update.

use crate::{
    db::{CreatorModel, CreatorQueries, Database},
    DonateError, DonateResult,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

const USERNAME_MIN_LEN: usize = 3;
const USERNAME_MAX_LEN: usize = 32;

/// Registration input
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterCreator {
    /// Desired username
    pub username: String,
    /// Display name (defaults to the username)
    pub display_name: Option<String>,
    /// Contact email
    pub email: Option<String>,
}

/// Partial profile update; absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProfile {
    /// New display name
    pub display_name: Option<String>,
    /// New email
    pub email: Option<String>,
    /// New bank name
    pub bank_name: Option<String>,
    /// New bank account number
    pub bank_account_number: Option<String>,
    /// New bank account holder
    pub bank_account_holder: Option<String>,
    /// Replacement filtered word list
    pub filtered_words: Option<Vec<String>>,
}

/// Map a failed username write. The availability check and the write take
/// the connection separately, so a concurrent claim surfaces here as a
/// unique constraint hit.
fn username_write_error<'a>(
    username: &'a str,
    context: &'a str,
) -> impl FnOnce(anyhow::Error) -> DonateError + 'a {
    move |e| match e.downcast_ref::<rusqlite::Error>() {
        Some(rusqlite::Error::SqliteFailure(err, _))
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            DonateError::Conflict(format!("Username {} is already taken", username))
        }
        _ => DonateError::database(context)(e),
    }
}

/// Validate and normalize a username: 3-32 chars of `[a-z0-9_]`, lower-cased
pub fn normalize_username(raw: &str) -> DonateResult<String> {
    let username = raw.trim().to_ascii_lowercase();
    if username.len() < USERNAME_MIN_LEN || username.len() > USERNAME_MAX_LEN {
        return Err(DonateError::Validation(format!(
            "Username must be {} to {} characters",
            USERNAME_MIN_LEN, USERNAME_MAX_LEN
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        return Err(DonateError::Validation(
            "Username may only contain letters, digits and underscores".to_string(),
        ));
    }
    Ok(username)
}

/// Service for creator accounts
pub struct CreatorService {
    db: Arc<Database>,
}

impl CreatorService {
    /// Create a new creator service
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Register a new creator
    pub async fn register(&self, input: RegisterCreator) -> DonateResult<CreatorModel> {
        let username = normalize_username(&input.username)?;
        let queries = CreatorQueries::new(&self.db);

        if queries
            .get_by_username(&username)
            .await
            .map_err(DonateError::database("Failed to look up creator"))?
            .is_some()
        {
            return Err(DonateError::Conflict(format!(
                "Username {} is already taken",
                username
            )));
        }

        let now = Utc::now();
        let creator = CreatorModel {
            id: uuid::Uuid::new_v4().to_string(),
            display_name: input
                .display_name
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| username.clone()),
            username,
            email: input.email,
            bank_name: None,
            bank_account_number: None,
            bank_account_holder: None,
            filtered_words: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        queries
            .insert(&creator)
            .await
            .map_err(username_write_error(&creator.username, "Failed to insert creator"))?;

        info!("Registered creator {} ({})", creator.username, creator.id);
        Ok(creator)
    }

    /// Get a creator by username
    pub async fn get(&self, username: &str) -> DonateResult<CreatorModel> {
        CreatorQueries::new(&self.db)
            .get_by_username(&username.to_ascii_lowercase())
            .await
            .map_err(DonateError::database("Failed to look up creator"))?
            .ok_or_else(|| DonateError::NotFound(format!("Creator {} not found", username)))
    }

    /// Apply a partial profile/settings update
    pub async fn update_profile(
        &self,
        username: &str,
        update: UpdateProfile,
    ) -> DonateResult<CreatorModel> {
        let mut creator = self.get(username).await?;

        if let Some(display_name) = update.display_name {
            let display_name = display_name.trim().to_string();
            if display_name.is_empty() {
                return Err(DonateError::Validation(
                    "Display name cannot be empty".to_string(),
                ));
            }
            creator.display_name = display_name;
        }
        if let Some(email) = update.email {
            creator.email = Some(email);
        }
        if let Some(bank_name) = update.bank_name {
            creator.bank_name = Some(bank_name.trim().to_string());
        }
        if let Some(number) = update.bank_account_number {
            creator.bank_account_number = Some(number.trim().to_string());
        }
        if let Some(holder) = update.bank_account_holder {
            creator.bank_account_holder = Some(holder.trim().to_string());
        }
        if let Some(words) = update.filtered_words {
            creator.filtered_words = words
                .into_iter()
                .map(|w| w.trim().to_string())
                .filter(|w| !w.is_empty())
                .collect();
        }
        creator.updated_at = Utc::now();

        CreatorQueries::new(&self.db)
            .update_profile(&creator)
            .await
            .map_err(DonateError::database("Failed to update creator"))?;

        Ok(creator)
    }

    /// Rename a creator, propagating the new username to every owned record
    pub async fn rename(&self, username: &str, new_username: &str) -> DonateResult<CreatorModel> {
        let creator = self.get(username).await?;
        let new_username = normalize_username(new_username)?;

        if new_username == creator.username {
            return Ok(creator);
        }

        let queries = CreatorQueries::new(&self.db);
        if queries
            .get_by_username(&new_username)
            .await
            .map_err(DonateError::database("Failed to look up creator"))?
            .is_some()
        {
            return Err(DonateError::Conflict(format!(
                "Username {} is already taken",
                new_username
            )));
        }

        let now = Utc::now();
        let rewritten = queries
            .rename(&creator.id, &new_username, now)
            .await
            .map_err(username_write_error(&new_username, "Failed to rename creator"))?;

        info!(
            "Renamed creator {} -> {} ({} owned rows updated)",
            creator.username, new_username, rewritten
        );

        Ok(CreatorModel {
            username: new_username,
            updated_at: now,
            ..creator
        })
    }
}
