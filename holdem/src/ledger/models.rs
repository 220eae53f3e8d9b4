//! Ledger row models.

use crate::game::{Chips, PlayerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A `users` row: stable identifier, display name and chip balance.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct UserAccount {
    pub id: PlayerId,
    pub display_name: String,
    pub chips: Chips,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
