//! Database models

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Implements text storage and parsing for a status enum.
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Canonical upper-case name, as stored and serialized
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_ascii_uppercase().as_str() {
                    $($text => Ok(Self::$variant),)+
                    other => Err(format!("unknown {}: {}", stringify!($name), other)),
                }
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e: String| FromSqlError::Other(e.into()))
            }
        }
    };
}

/// Payment state of a donation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DonationStatus {
    /// Created, waiting for the gateway
    Pending,
    /// Settled by the gateway
    Paid,
    /// Expired, cancelled or denied
    Unpaid,
    /// Could not be handed to the gateway
    Failed,
}

text_enum!(DonationStatus {
    Pending => "PENDING",
    Paid => "PAID",
    Unpaid => "UNPAID",
    Failed => "FAILED",
});

/// Playback state of a media share
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MediaShareStatus {
    /// Waiting in the queue
    Pending,
    /// Currently on screen
    Playing,
    /// Played to the end
    Played,
    /// Skipped by the creator
    Skipped,
}

text_enum!(MediaShareStatus {
    Pending => "PENDING",
    Playing => "PLAYING",
    Played => "PLAYED",
    Skipped => "SKIPPED",
});

impl MediaShareStatus {
    /// Whether the media share can be archived
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Played | Self::Skipped)
    }
}

/// Disbursement state of a payout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PayoutStatus {
    /// Waiting for an admin
    Pending,
    /// Approved by an admin
    Approved,
    /// Money has been sent
    Processed,
    /// Refused by an admin
    Rejected,
}

text_enum!(PayoutStatus {
    Pending => "PENDING",
    Approved => "APPROVED",
    Processed => "PROCESSED",
    Rejected => "REJECTED",
});

/// Bank account a payout is sent to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankDetails {
    /// Bank name
    pub bank_name: String,
    /// Account number
    pub account_number: String,
    /// Account holder name
    pub account_holder: String,
}

/// Creator database model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatorModel {
    /// Creator ID
    pub id: String,
    /// Unique username
    pub username: String,
    /// Name shown on overlays and pages
    pub display_name: String,
    /// Contact email
    pub email: Option<String>,
    /// Bank name
    pub bank_name: Option<String>,
    /// Bank account number
    pub bank_account_number: Option<String>,
    /// Bank account holder
    pub bank_account_holder: Option<String>,
    /// Words masked in donor names and messages
    pub filtered_words: Vec<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last update time
    pub updated_at: DateTime<Utc>,
}

impl CreatorModel {
    /// Complete bank details, if every field is set
    pub fn bank_details(&self) -> Option<BankDetails> {
        match (
            &self.bank_name,
            &self.bank_account_number,
            &self.bank_account_holder,
        ) {
            (Some(name), Some(number), Some(holder))
                if !name.is_empty() && !number.is_empty() && !holder.is_empty() =>
            {
                Some(BankDetails {
                    bank_name: name.clone(),
                    account_number: number.clone(),
                    account_holder: holder.clone(),
                })
            }
            _ => None,
        }
    }
}

/// Video request embedded in a donation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRequest {
    /// Video URL
    pub video_url: String,
    /// Offset into the video, in seconds
    #[serde(default)]
    pub start_seconds: i64,
    /// Playback length, in seconds
    pub duration_seconds: i64,
}

/// Live donation database model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DonationModel {
    /// Donation ID
    pub id: String,
    /// Merchant reference (gateway order id)
    pub merchant_ref: String,
    /// Donor display name
    pub donor_name: String,
    /// Donor message
    pub message: String,
    /// Amount in the smallest currency unit
    pub amount: i64,
    /// Payment status
    pub status: DonationStatus,
    /// Owning creator ID
    pub creator_id: String,
    /// Owning creator username (denormalized)
    pub creator_username: String,
    /// Optional video request
    pub media: Option<MediaRequest>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last update time
    pub updated_at: DateTime<Utc>,
    /// Time the donation became PAID
    pub paid_at: Option<DateTime<Utc>>,
}

/// Archived donation database model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DonationHistoryModel {
    /// The donation as it was when archived
    #[serde(flatten)]
    pub donation: DonationModel,
    /// Why the donation was archived
    pub archive_reason: String,
    /// Archive time
    pub archived_at: DateTime<Utc>,
}

/// Live media share database model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaShareModel {
    /// Media share ID
    pub id: String,
    /// Donation that paid for it
    pub donation_id: String,
    /// Owning creator ID
    pub creator_id: String,
    /// Owning creator username (denormalized)
    pub creator_username: String,
    /// Donor display name
    pub donor_name: String,
    /// Donor message
    pub message: String,
    /// Donation amount
    pub amount: i64,
    /// Video URL
    pub video_url: String,
    /// Offset into the video, in seconds
    pub start_seconds: i64,
    /// Playback length, in seconds
    pub duration_seconds: i64,
    /// Position in the creator's queue
    pub queue_position: i64,
    /// Playback status
    pub status: MediaShareStatus,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last update time
    pub updated_at: DateTime<Utc>,
}

/// Archived media share database model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaShareHistoryModel {
    /// The media share as it was when archived
    #[serde(flatten)]
    pub media_share: MediaShareModel,
    /// Why the media share was archived
    pub archive_reason: String,
    /// Archive time
    pub archived_at: DateTime<Utc>,
}

/// One ranked donor on a monthly leaderboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    /// 1-based rank
    pub rank: u32,
    /// Donor name
    pub donor_name: String,
    /// Sum of the donor's donations this month
    pub total_amount: i64,
    /// Number of donations this month
    pub donation_count: i64,
    /// Floor of total / count
    pub average_amount: i64,
    /// Earliest donation this month
    pub first_donation_at: DateTime<Utc>,
    /// Latest donation this month
    pub last_donation_at: DateTime<Utc>,
}

/// Monthly leaderboard database model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyLeaderboardModel {
    /// Leaderboard ID
    pub id: String,
    /// Creator ID
    pub creator_id: String,
    /// Creator username (denormalized)
    pub creator_username: String,
    /// Calendar year (WIB)
    pub year: i32,
    /// Calendar month 1-12 (WIB)
    pub month: u32,
    /// Ranked top donors
    pub top_donors: Vec<LeaderboardEntry>,
    /// Sum of all PAID donations in the month
    pub total_amount: i64,
    /// Number of PAID donations in the month
    pub total_donations: i64,
    /// Number of distinct donor names
    pub unique_donors: i64,
    /// Floor of total_amount / total_donations
    pub average_donation: i64,
    /// Frozen against further updates
    pub is_finalized: bool,
    /// Finalization time
    pub finalized_at: Option<DateTime<Utc>>,
    /// Last recomputation time
    pub updated_at: DateTime<Utc>,
}

/// Payout database model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutModel {
    /// Payout ID
    pub id: String,
    /// Creator ID
    pub creator_id: String,
    /// Creator username (denormalized)
    pub creator_username: String,
    /// Requested amount
    pub amount: i64,
    /// Bank details at request time
    pub bank: BankDetails,
    /// Payout status
    pub status: PayoutStatus,
    /// Admin notes
    pub notes: Option<String>,
    /// Request time
    pub requested_at: DateTime<Utc>,
    /// Time an admin processed the request
    pub processed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parsing_is_case_insensitive() {
        assert_eq!("paid".parse::<DonationStatus>(), Ok(DonationStatus::Paid));
        assert_eq!("SKIPPED".parse::<MediaShareStatus>(), Ok(MediaShareStatus::Skipped));
        assert_eq!("Rejected".parse::<PayoutStatus>(), Ok(PayoutStatus::Rejected));
        assert!("settled".parse::<DonationStatus>().is_err());
    }

    #[test]
    fn test_status_serializes_uppercase() {
        let json = serde_json::to_string(&PayoutStatus::Processed).unwrap();
        assert_eq!(json, "\"PROCESSED\"");
    }

    #[test]
    fn test_bank_details_requires_all_fields() {
        let now = Utc::now();
        let mut creator = CreatorModel {
            id: "c1".to_string(),
            username: "alice".to_string(),
            display_name: "Alice".to_string(),
            email: None,
            bank_name: Some("BCA".to_string()),
            bank_account_number: Some("123".to_string()),
            bank_account_holder: None,
            filtered_words: vec![],
            created_at: now,
            updated_at: now,
        };
        assert!(creator.bank_details().is_none());

        creator.bank_account_holder = Some("Alice".to_string());
        assert_eq!(creator.bank_details().unwrap().account_number, "123");
    }
}
