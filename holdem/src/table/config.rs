//! Table configuration.

use crate::game::table::{Blinds, TableRules};
use crate::game::{Chips, MAX_SEATS};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Registry-level table configuration; [`TableRules`] is the slice the
/// state machine consumes.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct TableConfig {
    pub name: String,
    pub max_seats: usize,
    pub small_blind: Chips,
    pub big_blind: Chips,
    #[serde(with = "duration_ms")]
    pub turn_timeout: Duration,
    #[serde(with = "duration_ms")]
    pub countdown: Duration,
    #[serde(with = "duration_ms")]
    pub payout_animation: Duration,
    #[serde(with = "duration_ms")]
    pub banter: Duration,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            name: "Table".to_string(),
            max_seats: MAX_SEATS,
            small_blind: 10,
            big_blind: 20,
            turn_timeout: Duration::from_secs(30),
            countdown: Duration::from_secs(3),
            payout_animation: Duration::from_secs(5),
            banter: Duration::from_secs(15),
        }
    }
}

impl TableConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.small_blind <= 0 {
            return Err("small blind must be positive".to_string());
        }
        if self.big_blind <= self.small_blind {
            return Err("big blind must exceed the small blind".to_string());
        }
        if self.max_seats < 2 || self.max_seats > MAX_SEATS {
            return Err(format!("seat count must be 2..={MAX_SEATS}"));
        }
        Ok(())
    }

    pub fn rules(&self) -> TableRules {
        TableRules {
            blinds: Blinds {
                small: self.small_blind,
                big: self.big_blind,
            },
            max_seats: self.max_seats,
            countdown: self.countdown,
            turn_timeout: self.turn_timeout,
            payout_animation: self.payout_animation,
            banter: self.banter,
        }
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
