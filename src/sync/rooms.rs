//! Room Registry
//!
//! Creates and joins rendezvous rooms in the shared store, and sweeps out
//! records left behind by dead sessions.

use std::rc::Rc;

use rand::Rng;
use tracing::{debug, info, warn};

use crate::game::board::Mark;
use crate::sync::protocol::{decode, encode, RoomKeys, RoomRecord, RoomStatus, ROOM_KEY_PREFIX};
use crate::sync::store::SharedStore;

/// Room code length.
pub const CODE_LEN: usize = 4;

/// Alphabet room codes draw from. Codes are case-insensitive on join and
/// normalized to this alphabet's case.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Rooms older than this (by creation timestamp) are stale.
pub const ROOM_TTL_MS: i64 = 600_000;

/// Store-backed room lifecycle operations.
pub struct RoomRegistry {
    store: Rc<dyn SharedStore>,
    ttl_ms: i64,
}

impl RoomRegistry {
    /// Registry over `store` with the default expiry window.
    pub fn new(store: Rc<dyn SharedStore>) -> Self {
        Self::with_ttl(store, ROOM_TTL_MS)
    }

    /// Registry with a custom expiry window.
    pub fn with_ttl(store: Rc<dyn SharedStore>, ttl_ms: i64) -> Self {
        Self { store, ttl_ms }
    }

    /// Draw a code not currently registered.
    ///
    /// The keyspace (36^4) makes collisions unlikely; the retry loop makes
    /// uniqueness exact against live rooms.
    pub fn generate_code<R: Rng>(&self, rng: &mut R) -> String {
        loop {
            let code: String = (0..CODE_LEN)
                .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
                .collect();
            if self.store.get(&RoomKeys::new(&code).room()).is_none() {
                return code;
            }
        }
    }

    /// Register a waiting room. The creating session is host, mark X.
    pub fn create_room(&self, code: &str, host_name: &str, now_ms: i64) -> RoomRecord {
        let record = RoomRecord {
            host: host_name.to_string(),
            host_mark: Mark::X,
            guest: None,
            guest_mark: None,
            status: RoomStatus::Waiting,
            created: now_ms,
            ts: now_ms,
        };
        if let Some(raw) = encode(&record) {
            self.store.set(&RoomKeys::new(code).room(), &raw);
        }
        info!(code, host = host_name, "room created");
        record
    }

    /// Join `code` as guest, mark O.
    ///
    /// Returns the updated record (whose `host` names the opponent), or
    /// `None` when no decodable record exists for the code.
    pub fn join_room(&self, code: &str, guest_name: &str, now_ms: i64) -> Option<RoomRecord> {
        let key = RoomKeys::new(code).room();
        let mut record: RoomRecord = decode(&self.store.get(&key)?)?;

        record.guest = Some(guest_name.to_string());
        record.guest_mark = Some(Mark::O);
        record.status = RoomStatus::Active;
        record.ts = now_ms;

        if let Some(raw) = encode(&record) {
            self.store.set(&key, &raw);
        }
        info!(code, guest = guest_name, host = %record.host, "room joined");
        Some(record)
    }

    /// Delete a room record and its channel keys.
    pub fn delete_room(&self, code: &str) {
        for key in RoomKeys::new(code).all() {
            self.store.remove(&key);
        }
    }

    /// Purge rooms past the expiry window, plus their channel keys and any
    /// channel keys orphaned by an already-missing record.
    ///
    /// Run at session start, independent of any active session. Safe to run
    /// repeatedly. Returns the number of codes purged.
    pub fn sweep_expired(&self, now_ms: i64) -> usize {
        let mut purged = 0;
        for key in self.store.keys() {
            let Some(rest) = key.strip_prefix(ROOM_KEY_PREFIX) else {
                continue;
            };
            // Channel sub-keys are handled through their room record.
            let Some(code) = rest.split('/').next().filter(|c| *c == rest) else {
                continue;
            };

            let stale = match self.store.get(&key).as_deref().map(decode::<RoomRecord>) {
                Some(Some(record)) => now_ms - record.created > self.ttl_ms,
                Some(None) => {
                    warn!(code, "undecodable room record, purging");
                    true
                }
                None => true,
            };
            if stale {
                self.delete_room(code);
                purged += 1;
            }
        }

        // Channel keys whose room record vanished serve no one.
        for key in self.store.keys() {
            if let Some(rest) = key.strip_prefix(ROOM_KEY_PREFIX) {
                if let Some((code, _)) = rest.split_once('/') {
                    if self.store.get(&RoomKeys::new(code).room()).is_none() {
                        self.store.remove(&key);
                    }
                }
            }
        }

        if purged > 0 {
            debug!(purged, "expired rooms swept");
        }
        purged
    }
}
