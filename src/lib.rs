//! # Cross-Nought
//!
//! Two-player board game core with same-device, cross-context room sync.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       CROSS-NOUGHT                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  game/           - Deterministic game logic                  │
//! │  ├── board.rs    - 3x3 board, win/draw evaluation            │
//! │  ├── match_control.rs - Scores, first-to-5 match semantics   │
//! │  └── events.rs   - Notifications handed to the UI layer      │
//! │                                                              │
//! │  sync/           - Store-mediated session sync               │
//! │  ├── store.rs    - Shared key-value store + change feed      │
//! │  ├── clock.rs    - Injected time source                      │
//! │  ├── timer.rs    - Scoped interval/one-shot timers           │
//! │  ├── protocol.rs - Channel keys and wire messages (JSON)     │
//! │  ├── rooms.rs    - Room codes, create/join, expiry sweep     │
//! │  ├── transport.rs- Publish + notification dispatch           │
//! │  ├── heartbeat.rs- Liveness with timeout + grace window      │
//! │  └── session.rs  - Orchestrator state machine                │
//! │                                                              │
//! │  leaderboard.rs  - Store-backed match-win tally              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Coordination Model
//!
//! The two player sessions never share memory; they coordinate only
//! through the store's per-room channels, each a last-write-wins slot
//! observed via change notifications that fire in every context except
//! the writer's own. Delivery can skip history, so every consumed
//! message carries a timestamp (staleness guard) and moves carry the
//! full board snapshot (gap recovery). Within one session everything is
//! single-threaded and run-to-completion; timers are deadline fields
//! advanced by an explicit pump against the injected clock.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod game;
pub mod leaderboard;
pub mod sync;

// Re-export commonly used types
pub use game::board::{Board, GameResult, IllegalMove, Mark, CELL_COUNT, WIN_PATTERNS};
pub use game::events::SessionEvent;
pub use game::match_control::{MatchController, PlayError, Scores, WinRecord, WINNING_SCORE};
pub use leaderboard::{Leaderboard, LeaderboardEntry};
pub use sync::clock::{Clock, ManualClock, SystemClock};
pub use sync::session::{Role, Session, SessionConfig, SessionError, SessionStatus};
pub use sync::store::{ChangeEvent, MemoryStore, SharedStore, StoreHandle};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
