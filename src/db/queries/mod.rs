//! Database queries

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ValueRef};
use serde::de::DeserializeOwned;

mod creators;
mod donations;
mod leaderboards;
mod media_shares;
mod payouts;

pub use creators::CreatorQueries;
pub use donations::{DonationQueries, PaidDonationRow};
pub use leaderboards::LeaderboardQueries;
pub use media_shares::MediaShareQueries;
pub use payouts::PayoutQueries;

/// JSON-encoded TEXT column
struct Json<T>(T);

impl<T: DeserializeOwned> FromSql for Json<T> {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        serde_json::from_str(value.as_str()?)
            .map(Json)
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}
