//! Sync Transport
//!
//! Publishes moves, signals and heartbeats into a room's store channels
//! and decodes change notifications back into typed messages. Writes are
//! fire-and-forget; delivery happens only through the other context's
//! notification feed.

use std::cell::Cell;
use std::rc::Rc;

use tracing::debug;

use crate::game::board::{Board, Mark};
use crate::sync::protocol::{
    decode, encode, HeartbeatMessage, Incoming, MoveMessage, RoomKeys, SignalKind, SignalMessage,
};
use crate::sync::store::{SharedStore, SubscriptionId};

/// One room session's view of the wire.
pub struct SyncTransport {
    store: Rc<dyn SharedStore>,
    keys: RoomKeys,
    local_mark: Mark,
    move_number: Cell<u64>,
    subscription: Cell<Option<SubscriptionId>>,
}

impl SyncTransport {
    /// Transport for `code`, publishing as `local_mark`.
    pub fn new(store: Rc<dyn SharedStore>, code: &str, local_mark: Mark) -> Self {
        Self {
            store,
            keys: RoomKeys::new(code),
            local_mark,
            move_number: Cell::new(0),
            subscription: Cell::new(None),
        }
    }

    /// The channel keys this transport writes.
    pub fn keys(&self) -> &RoomKeys {
        &self.keys
    }

    /// The current move sequence number.
    pub fn move_number(&self) -> u64 {
        self.move_number.get()
    }

    /// Adopt the sequence number of a consumed remote move so the next
    /// local publish continues the room-wide sequence.
    pub fn sync_move_number(&self, n: u64) {
        self.move_number.set(n);
    }

    /// Publish a move with the post-move board snapshot.
    pub fn publish_move(&self, cell_index: usize, board: Board, now_ms: i64) {
        let move_number = self.move_number.get() + 1;
        self.move_number.set(move_number);
        let message = MoveMessage {
            player: self.local_mark,
            cell_index,
            board,
            move_number,
            ts: now_ms,
        };
        if let Some(raw) = encode(&message) {
            self.store.set(&self.keys.moves(), &raw);
        }
    }

    /// Publish a control signal.
    pub fn publish_signal(&self, kind: SignalKind, now_ms: i64) {
        let message = SignalMessage {
            kind,
            initiator: self.local_mark,
            ts: now_ms,
        };
        if let Some(raw) = encode(&message) {
            self.store.set(&self.keys.signal(), &raw);
        }
    }

    /// Rewrite the heartbeat slot. Last write wins.
    pub fn publish_heartbeat(&self, now_ms: i64) {
        let message = HeartbeatMessage {
            mark: self.local_mark,
            ts: now_ms,
        };
        if let Some(raw) = encode(&message) {
            self.store.set(&self.keys.heartbeat(), &raw);
        }
    }

    /// Read the heartbeat slot, whichever mark wrote it last.
    pub fn read_heartbeat(&self) -> Option<HeartbeatMessage> {
        decode(&self.store.get(&self.keys.heartbeat())?)
    }

    /// Register the single dispatcher for this room's channels.
    ///
    /// The dispatcher decodes by key identity and invokes `handler` with a
    /// typed message; notifications for other rooms, removals, and
    /// undecodable payloads are dropped silently. Re-subscribing replaces
    /// any previous registration.
    pub fn subscribe(&self, handler: Rc<dyn Fn(Incoming)>) {
        self.unsubscribe();

        let keys = self.keys.clone();
        let id = self.store.subscribe(Rc::new(move |event| {
            // Removals carry no message; teardown handles key deletion.
            let Some(raw) = event.new_value.as_deref() else {
                return;
            };

            let incoming = if event.key == keys.room() {
                decode(raw).map(Incoming::Room)
            } else if event.key == keys.moves() {
                decode(raw).map(Incoming::Move)
            } else if event.key == keys.signal() {
                decode(raw).map(Incoming::Signal)
            } else if event.key == keys.heartbeat() {
                decode(raw).map(Incoming::Heartbeat)
            } else {
                return;
            };

            match incoming {
                Some(message) => handler(message),
                None => debug!(key = %event.key, "dropping undecodable payload"),
            }
        }));
        self.subscription.set(Some(id));
    }

    /// Drop the dispatcher registration, if any.
    pub fn unsubscribe(&self) {
        if let Some(id) = self.subscription.take() {
            self.store.unsubscribe(id);
        }
    }

    /// Remove every channel key for this room.
    pub fn clear_channels(&self) {
        for key in self.keys.all() {
            self.store.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::store::MemoryStore;
    use std::cell::RefCell;

    fn pair() -> (SyncTransport, SyncTransport) {
        let store = MemoryStore::new();
        let host = SyncTransport::new(Rc::new(store.handle()), "AB12", Mark::X);
        let guest = SyncTransport::new(Rc::new(store.handle()), "AB12", Mark::O);
        (host, guest)
    }

    fn collect(transport: &SyncTransport) -> Rc<RefCell<Vec<Incoming>>> {
        let seen: Rc<RefCell<Vec<Incoming>>> = Rc::default();
        let sink = Rc::clone(&seen);
        transport.subscribe(Rc::new(move |m| sink.borrow_mut().push(m)));
        seen
    }

    #[test]
    fn test_move_reaches_other_context_only() {
        let (host, guest) = pair();
        let host_seen = collect(&host);
        let guest_seen = collect(&guest);

        let mut board = Board::new();
        board.apply_move(4, Mark::X).unwrap();
        host.publish_move(4, board.clone(), 1_000);

        assert!(host_seen.borrow().is_empty());
        let seen = guest_seen.borrow();
        match seen.as_slice() {
            [Incoming::Move(m)] => {
                assert_eq!(m.player, Mark::X);
                assert_eq!(m.cell_index, 4);
                assert_eq!(m.board, board);
                assert_eq!(m.move_number, 1);
                assert_eq!(m.ts, 1_000);
            }
            other => panic!("unexpected messages: {other:?}"),
        }
    }

    #[test]
    fn test_move_numbers_continue_after_sync() {
        let (host, _guest) = pair();
        host.publish_move(0, Board::new(), 1);
        assert_eq!(host.move_number(), 1);

        host.sync_move_number(5);
        host.publish_move(1, Board::new(), 2);
        assert_eq!(host.move_number(), 6);
    }

    #[test]
    fn test_dispatch_ignores_other_rooms_and_garbage() {
        let store = MemoryStore::new();
        let writer = store.handle();
        let transport = SyncTransport::new(Rc::new(store.handle()), "AB12", Mark::X);
        let seen = collect(&transport);

        writer.set("room/ZZ99/move", "{\"player\":\"O\"}");
        writer.set(&transport.keys().moves(), "garbage");
        writer.set(&transport.keys().signal(), "{\"wrong\":true}");
        assert!(seen.borrow().is_empty());

        writer.set(
            &transport.keys().signal(),
            "{\"type\":\"leave\",\"initiator\":\"O\",\"ts\":9}",
        );
        assert_eq!(
            seen.borrow().as_slice(),
            &[Incoming::Signal(SignalMessage {
                kind: SignalKind::Leave,
                initiator: Mark::O,
                ts: 9,
            })]
        );
    }

    #[test]
    fn test_heartbeat_slot_last_write_wins() {
        let (host, guest) = pair();
        host.publish_heartbeat(10);
        guest.publish_heartbeat(20);

        let slot = host.read_heartbeat().unwrap();
        assert_eq!(slot.mark, Mark::O);
        assert_eq!(slot.ts, 20);
    }

    #[test]
    fn test_clear_channels_removes_all_keys() {
        let store = MemoryStore::new();
        let handle = store.handle();
        let transport = SyncTransport::new(Rc::new(handle.clone()), "AB12", Mark::X);

        transport.publish_move(0, Board::new(), 1);
        transport.publish_signal(SignalKind::NewGame, 2);
        transport.publish_heartbeat(3);
        handle.set(&transport.keys().room(), "{}");

        transport.clear_channels();
        assert!(handle.keys().is_empty());
    }
}
