//! Session Events
//!
//! Notifications the core hands to the UI layer. The UI renders these;
//! it never mutates core state through them.

use serde::{Deserialize, Serialize};

use crate::game::board::{GameResult, Mark};

/// A notification drained from a session after each operation or pump.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionEvent {
    /// A game concluded with the given result.
    GameOver(GameResult),

    /// A mark's tally changed.
    ScoreChanged {
        /// The mark that scored.
        mark: Mark,
        /// Its new total.
        score: u32,
    },

    /// A mark reached the winning threshold; the match is over.
    MatchWon(Mark),

    /// The opponent's liveness beacon is fresh again.
    OpponentConnected,

    /// The opponent was declared gone; the session is now terminal
    /// until the user leaves or starts over.
    OpponentDisconnected,

    /// A room was registered under this code; waiting for a guest.
    RoomCreated {
        /// The 4-character room code.
        code: String,
    },

    /// Joined an existing room as guest.
    RoomJoined {
        /// The host's display name.
        host: String,
    },

    /// A fresh game started (scores kept).
    NewGame,

    /// Scores were cleared and a fresh match started.
    MatchReset,

    /// One second elapsed on the post-win countdown.
    CountdownTick {
        /// Seconds remaining before the new-game prompt.
        seconds_left: u32,
    },

    /// The post-win countdown expired; prompt for a new game.
    NewGameReady,

    /// One second elapsed on the match-winner countdown.
    MatchCountdownTick {
        /// Seconds remaining before the match auto-restarts.
        seconds_left: u32,
    },
}
