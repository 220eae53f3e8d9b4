//! Client/server message types.
//!
//! Every frame is a tagged record: `{"event": NAME, "payload": {...}}`.
//! Event names and payload fields are a stable wire contract; the structs
//! here are the single source of truth for them.

use crate::game::errors::{ErrorCode, TableError};
use crate::game::pot::Pot;
use crate::game::table::{PlayerAction, RecordedAction, WinnerSummary};
use crate::game::view::{TablePatch, TableSnapshot};
use crate::game::{Chips, PlayerId, SeatIndex, TableId};
use serde::{Deserialize, Serialize};

/// Betting action names on the wire. `RAISE` carries `amount`, the total
/// new bet to match.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionWire {
    Fold,
    Check,
    Call,
    Raise,
    AllIn,
}

/// Messages from clients. Untrusted input: everything is revalidated by
/// the table state machine.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "event", content = "payload")]
pub enum ClientEvent {
    #[serde(rename = "REQ_JOIN", rename_all = "camelCase")]
    Join {
        auth_ticket: String,
        table_id: TableId,
    },
    #[serde(rename = "REQ_RECONNECT", rename_all = "camelCase")]
    Reconnect {
        auth_ticket: String,
        table_id: TableId,
        last_sequence_id: u64,
    },
    #[serde(rename = "REQ_SIT", rename_all = "camelCase")]
    Sit {
        seat_index: SeatIndex,
        buy_in: Chips,
    },
    #[serde(rename = "REQ_READY")]
    Ready {},
    #[serde(rename = "REQ_ACTION", rename_all = "camelCase")]
    Action {
        #[serde(rename = "type")]
        action: ActionWire,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        amount: Option<Chips>,
    },
    #[serde(rename = "REQ_SOCIAL", rename_all = "camelCase")]
    Social {
        #[serde(rename = "type")]
        kind: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_seat: Option<SeatIndex>,
    },
    #[serde(rename = "REQ_LEAVE")]
    Leave {},
}

impl ClientEvent {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Translate a `REQ_ACTION` into a state-machine action. `RAISE`
    /// requires an amount.
    pub fn to_player_action(
        action: ActionWire,
        amount: Option<Chips>,
    ) -> Result<PlayerAction, TableError> {
        Ok(match action {
            ActionWire::Fold => PlayerAction::Fold,
            ActionWire::Check => PlayerAction::Check,
            ActionWire::Call => PlayerAction::Call,
            ActionWire::AllIn => PlayerAction::AllIn,
            ActionWire::Raise => {
                let total = amount
                    .ok_or_else(|| TableError::InvalidAction("raise requires amount".into()))?;
                PlayerAction::Raise(total)
            }
        })
    }
}

/// One entry on the social channel. Batched and flushed on a tick; never
/// routed through the table state machine.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialEvent {
    #[serde(rename = "steamId")]
    pub from: PlayerId,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_seat: Option<SeatIndex>,
}

/// Messages to clients.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "event", content = "payload")]
pub enum ServerEvent {
    #[serde(rename = "AUTH_SUCCESS", rename_all = "camelCase")]
    AuthSuccess {
        session_token: String,
        #[serde(rename = "steamId")]
        player: PlayerId,
        display_name: String,
    },
    #[serde(rename = "AUTH_FAILURE")]
    AuthFailure {
        code: ErrorCode,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    #[serde(rename = "GAME_SNAPSHOT")]
    Snapshot(TableSnapshot),
    #[serde(rename = "STATE_PATCH")]
    Patch(TablePatch),
    #[serde(rename = "PLAYER_ACTION", rename_all = "camelCase")]
    PlayerAction {
        #[serde(rename = "steamId")]
        player: PlayerId,
        action: ActionWire,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        amount: Option<Chips>,
        new_pot: Chips,
    },
    #[serde(rename = "HAND_RESULT")]
    HandResult {
        winners: Vec<WinnerSummary>,
        pots: Vec<Pot>,
    },
    #[serde(rename = "SOCIAL")]
    Social { events: Vec<SocialEvent> },
    #[serde(rename = "ERROR")]
    Error { code: ErrorCode, message: String },
}

impl ServerEvent {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            // Serialization of our own types cannot fail in practice.
            format!(
                r#"{{"event":"ERROR","payload":{{"code":"INVALID_ACTION","message":"{e}"}}}}"#
            )
        })
    }

    pub fn error(err: &TableError) -> Self {
        Self::Error {
            code: err.code(),
            message: err.to_string(),
        }
    }

    /// The public broadcast for a resolved action.
    pub fn player_action(player: PlayerId, action: &RecordedAction, new_pot: Chips) -> Self {
        let (wire, amount) = match action {
            RecordedAction::Fold | RecordedAction::TimeoutFold => (ActionWire::Fold, None),
            RecordedAction::Check => (ActionWire::Check, None),
            RecordedAction::Call { amount } => (ActionWire::Call, Some(*amount)),
            RecordedAction::Raise { to } => (ActionWire::Raise, Some(*to)),
            RecordedAction::AllIn { amount } => (ActionWire::AllIn, Some(*amount)),
            // Blinds are forced wagers; they surface in snapshots, and as
            // calls if a caller ever broadcasts them.
            RecordedAction::PostSmallBlind { amount }
            | RecordedAction::PostBigBlind { amount } => (ActionWire::Call, Some(*amount)),
        };
        Self::PlayerAction {
            player,
            action: wire,
            amount,
            new_pot,
        }
    }

    /// The sequence this event advances the recipient to, if any.
    pub fn sequence(&self) -> Option<u64> {
        match self {
            Self::Snapshot(snapshot) => Some(snapshot.sequence),
            Self::Patch(patch) => Some(patch.sequence),
            _ => None,
        }
    }
}
