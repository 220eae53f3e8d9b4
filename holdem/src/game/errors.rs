//! Table and protocol errors.
//!
//! Protocol violations never mutate state; they are converted to `ERROR`
//! events carrying a code from the closed [`ErrorCode`] set and delivered
//! only to the offending client.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable wire error codes. Messages are human-readable and may change;
/// these never do.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    AuthFailed,
    InvalidTicket,
    TableFull,
    SeatTaken,
    InvalidAction,
    NotYourTurn,
    InsufficientChips,
    AlreadyInTable,
    TableNotFound,
}

/// Errors raised by the table state machine in response to a client
/// request.
#[derive(Clone, Debug, Deserialize, Eq, Error, PartialEq, Serialize)]
pub enum TableError {
    #[error("seat is taken")]
    SeatTaken,
    #[error("table is full")]
    TableFull,
    #[error("already seated at a table")]
    AlreadySeated,
    #[error("not seated at this table")]
    NotSeated,
    #[error("not your turn")]
    NotYourTurn,
    #[error("invalid action: {0}")]
    InvalidAction(String),
    #[error("not enough chips")]
    InsufficientChips,
    #[error("table not found")]
    TableNotFound,
    /// Impossible transition or exhausted deck: a bug, not a user error.
    /// The owning table loop is torn down and recreated clean.
    #[error("internal table fault: {0}")]
    Internal(String),
}

impl TableError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::SeatTaken => ErrorCode::SeatTaken,
            Self::TableFull => ErrorCode::TableFull,
            Self::AlreadySeated => ErrorCode::AlreadyInTable,
            Self::NotSeated => ErrorCode::InvalidAction,
            Self::NotYourTurn => ErrorCode::NotYourTurn,
            Self::InvalidAction(_) => ErrorCode::InvalidAction,
            Self::InsufficientChips => ErrorCode::InsufficientChips,
            Self::TableNotFound => ErrorCode::TableNotFound,
            Self::Internal(_) => ErrorCode::InvalidAction,
        }
    }

    /// True for faults that should tear the table loop down.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Internal(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_serialize_screaming_snake() {
        let json = serde_json::to_string(&ErrorCode::NotYourTurn).unwrap();
        assert_eq!(json, "\"NOT_YOUR_TURN\"");
        let json = serde_json::to_string(&ErrorCode::AlreadyInTable).unwrap();
        assert_eq!(json, "\"ALREADY_IN_TABLE\"");
    }

    #[test]
    fn test_error_to_code_mapping() {
        assert_eq!(TableError::SeatTaken.code(), ErrorCode::SeatTaken);
        assert_eq!(TableError::AlreadySeated.code(), ErrorCode::AlreadyInTable);
        assert!(TableError::Internal("deck".into()).is_fatal());
        assert!(!TableError::NotYourTurn.is_fatal());
    }
}
