//! Leaderboard
//!
//! Device-local tally of match winners, persisted through the shared
//! store. Each session keeps its own working copy and rewrites the whole
//! list on update (last write wins, same as every other store slot).
//! Rendering is the UI layer's problem.

use std::cell::RefCell;
use std::rc::Rc;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::sync::protocol::{decode, encode};
use crate::sync::store::SharedStore;

/// Store key holding the serialized standings.
pub const LEADERBOARD_KEY: &str = "leaderboard";

/// One player's row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    /// Display name, as entered at the name form.
    pub name: String,
    /// Matches won.
    pub wins: u32,
    /// When the last win was recorded.
    pub date: DateTime<Utc>,
}

/// Store-backed win tally.
pub struct Leaderboard {
    store: Rc<dyn SharedStore>,
    entries: RefCell<Vec<LeaderboardEntry>>,
}

impl Leaderboard {
    /// Load the current standings, or start empty on a missing or
    /// undecodable slot.
    pub fn load(store: Rc<dyn SharedStore>) -> Self {
        let entries = store
            .get(LEADERBOARD_KEY)
            .and_then(|raw| decode(&raw))
            .unwrap_or_default();
        Self {
            store,
            entries: RefCell::new(entries),
        }
    }

    /// Credit a match win to `name` and persist.
    pub fn record_win(&self, name: &str, now_ms: i64) {
        let date = Utc
            .timestamp_millis_opt(now_ms)
            .single()
            .unwrap_or(DateTime::UNIX_EPOCH);

        let mut entries = self.entries.borrow_mut();
        match entries.iter_mut().find(|e| e.name == name) {
            Some(entry) => {
                entry.wins += 1;
                entry.date = date;
            }
            None => entries.push(LeaderboardEntry {
                name: name.to_string(),
                wins: 1,
                date,
            }),
        }

        if let Some(raw) = encode(&*entries) {
            self.store.set(LEADERBOARD_KEY, &raw);
        }
    }

    /// Standings sorted by wins, descending.
    pub fn standings(&self) -> Vec<LeaderboardEntry> {
        let mut entries = self.entries.borrow().clone();
        entries.sort_by(|a, b| b.wins.cmp(&a.wins));
        entries
    }

    /// The top `n` rows.
    pub fn top(&self, n: usize) -> Vec<LeaderboardEntry> {
        let mut standings = self.standings();
        standings.truncate(n);
        standings
    }
}
