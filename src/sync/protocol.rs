//! Sync Protocol
//!
//! Wire format for the per-room store channels. Everything is JSON for
//! debugging ease; each message kind occupies one store key and is
//! replaced wholesale on every write.

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::game::board::{Board, Mark};

/// Prefix shared by every room-scoped key.
pub const ROOM_KEY_PREFIX: &str = "room/";

/// Encode a message for a store slot. `None` only on serializer failure,
/// which callers treat as "nothing to publish".
pub fn encode<T: Serialize>(value: &T) -> Option<String> {
    serde_json::to_string(value).ok()
}

/// Decode a store slot. `None` for any undecodable payload, identical to
/// a missing key.
pub fn decode<T: DeserializeOwned>(raw: &str) -> Option<T> {
    serde_json::from_str(raw).ok()
}

/// The five logical channel keys for one room code.
///
/// The `state` channel is reserved in the namespace but unused by current
/// logic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoomKeys {
    code: String,
}

impl RoomKeys {
    /// Keys for `code` (expected uppercase).
    pub fn new(code: &str) -> Self {
        Self {
            code: code.to_string(),
        }
    }

    /// The room code these keys belong to.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Room record key.
    pub fn room(&self) -> String {
        format!("{ROOM_KEY_PREFIX}{}", self.code)
    }

    /// Latest-move key.
    pub fn moves(&self) -> String {
        format!("{ROOM_KEY_PREFIX}{}/move", self.code)
    }

    /// Reserved state key.
    pub fn state(&self) -> String {
        format!("{ROOM_KEY_PREFIX}{}/state", self.code)
    }

    /// Latest-signal key.
    pub fn signal(&self) -> String {
        format!("{ROOM_KEY_PREFIX}{}/signal", self.code)
    }

    /// Heartbeat slot key.
    pub fn heartbeat(&self) -> String {
        format!("{ROOM_KEY_PREFIX}{}/heartbeat", self.code)
    }

    /// All five keys, for teardown.
    pub fn all(&self) -> [String; 5] {
        [
            self.room(),
            self.moves(),
            self.state(),
            self.signal(),
            self.heartbeat(),
        ]
    }
}

/// Room lifecycle status as stored in the room record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    /// Host registered, no guest yet.
    Waiting,
    /// Both participants present.
    Active,
}

/// The rendezvous record under `room/{code}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomRecord {
    /// Host display name.
    pub host: String,
    /// The host's mark; always X.
    pub host_mark: Mark,
    /// Guest display name, once joined.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guest: Option<String>,
    /// The guest's mark, once joined; always O.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guest_mark: Option<Mark>,
    /// Current status.
    pub status: RoomStatus,
    /// Creation timestamp (ms); drives expiry.
    pub created: i64,
    /// Last-activity timestamp (ms).
    pub ts: i64,
}

/// One player's move, written to `room/{code}/move`.
///
/// Carries the full resulting board, not a delta: a receiver that missed
/// intermediate writes can still converge from the snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveMessage {
    /// The mark that moved.
    pub player: Mark,
    /// The cell that was marked.
    pub cell_index: usize,
    /// Board state after the move.
    pub board: Board,
    /// Monotonically increasing per-room sequence number.
    pub move_number: u64,
    /// Send timestamp (ms); staleness guard.
    pub ts: i64,
}

/// Out-of-band control events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignalKind {
    /// Start the next game, keeping scores.
    NewGame,
    /// Zero the scores and restart the match.
    ResetMatch,
    /// The sender is leaving the room.
    Leave,
}

/// A control event, written to `room/{code}/signal`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalMessage {
    /// What the initiator requested.
    #[serde(rename = "type")]
    pub kind: SignalKind,
    /// The mark that initiated it.
    pub initiator: Mark,
    /// Send timestamp (ms); staleness guard.
    pub ts: i64,
}

/// Liveness beacon, rewritten into `room/{code}/heartbeat`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatMessage {
    /// The beating mark.
    pub mark: Mark,
    /// Write timestamp (ms).
    pub ts: i64,
}

/// A change notification decoded at the transport boundary.
///
/// Closed set: the dispatcher matches key identity, decodes, and drops
/// anything else silently.
#[derive(Clone, Debug, PartialEq)]
pub enum Incoming {
    /// The room record changed (e.g. a guest joined).
    Room(RoomRecord),
    /// The opponent published a move.
    Move(MoveMessage),
    /// The opponent published a control signal.
    Signal(SignalMessage),
    /// A heartbeat slot rewrite.
    Heartbeat(HeartbeatMessage),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_namespace() {
        let keys = RoomKeys::new("AB12");
        assert_eq!(keys.room(), "room/AB12");
        assert_eq!(keys.moves(), "room/AB12/move");
        assert_eq!(keys.state(), "room/AB12/state");
        assert_eq!(keys.signal(), "room/AB12/signal");
        assert_eq!(keys.heartbeat(), "room/AB12/heartbeat");
    }

    #[test]
    fn test_signal_wire_format() {
        let signal = SignalMessage {
            kind: SignalKind::NewGame,
            initiator: Mark::X,
            ts: 42,
        };
        let raw = encode(&signal).unwrap();
        assert!(raw.contains("\"type\":\"new-game\""));
        assert_eq!(decode::<SignalMessage>(&raw), Some(signal));
    }

    #[test]
    fn test_malformed_payload_decodes_to_none() {
        assert_eq!(decode::<MoveMessage>("not json"), None);
        assert_eq!(decode::<RoomRecord>("{\"host\":42}"), None);
    }

    #[test]
    fn test_room_record_without_guest() {
        let record = RoomRecord {
            host: "Ada".into(),
            host_mark: Mark::X,
            guest: None,
            guest_mark: None,
            status: RoomStatus::Waiting,
            created: 1,
            ts: 1,
        };
        let raw = encode(&record).unwrap();
        assert!(!raw.contains("guest"));
        assert_eq!(decode::<RoomRecord>(&raw), Some(record));
    }
}
