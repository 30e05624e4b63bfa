//! Session Orchestrator
//!
//! Composes board, match, rooms, transport and heartbeat into one
//! per-session state machine: `Idle -> Waiting -> Active -> Disconnected`.
//! Local play needs no room at all; remote play routes every move and
//! reset through the shared store.
//!
//! Everything runs cooperatively on one thread. Handlers and timer polls
//! run to completion; the only cross-context coupling is the store. All
//! state lives on an explicit context object (no ambient globals) and
//! every timer is a field with start/stop bound to the session lifecycle.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, info};

use crate::game::board::{Board, GameResult, Mark};
use crate::game::events::SessionEvent;
use crate::game::match_control::{MatchController, PlayError, Scores, WinRecord, WINNING_SCORE};
use crate::leaderboard::Leaderboard;
use crate::sync::clock::Clock;
use crate::sync::heartbeat::{
    HeartbeatMonitor, Verdict, HEARTBEAT_GRACE_MS, HEARTBEAT_INTERVAL_MS, HEARTBEAT_TIMEOUT_MS,
};
use crate::sync::protocol::{
    HeartbeatMessage, Incoming, MoveMessage, RoomRecord, RoomStatus, SignalKind, SignalMessage,
};
use crate::sync::rooms::RoomRegistry;
use crate::sync::store::SharedStore;
use crate::sync::timer::IntervalTimer;
use crate::sync::transport::SyncTransport;

/// Seconds counted down after a won game before prompting for the next.
pub const WIN_COUNTDOWN_SECS: u32 = 5;

/// Seconds counted down after a won match before it auto-restarts.
pub const MATCH_COUNTDOWN_SECS: u32 = 10;

/// Tunable session thresholds.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Games needed to win a match.
    pub winning_score: u32,
    /// Heartbeat write/poll interval (ms).
    pub heartbeat_interval_ms: i64,
    /// Heartbeat silence tolerated before the grace window (ms).
    pub heartbeat_timeout_ms: i64,
    /// Grace window before declaring disconnect (ms).
    pub heartbeat_grace_ms: i64,
    /// Post-win countdown length (s).
    pub win_countdown_secs: u32,
    /// Match-winner countdown length (s).
    pub match_countdown_secs: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            winning_score: WINNING_SCORE,
            heartbeat_interval_ms: HEARTBEAT_INTERVAL_MS,
            heartbeat_timeout_ms: HEARTBEAT_TIMEOUT_MS,
            heartbeat_grace_ms: HEARTBEAT_GRACE_MS,
            win_countdown_secs: WIN_COUNTDOWN_SECS,
            match_countdown_secs: MATCH_COUNTDOWN_SECS,
        }
    }
}

/// Where the session stands in the room lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    /// No room; local play only.
    Idle,
    /// Room registered, waiting for a guest.
    Waiting,
    /// Both participants present.
    Active,
    /// Opponent declared gone; terminal until the user acts.
    Disconnected,
}

/// This session's part in the room.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    /// Created the room; plays X.
    Host,
    /// Joined the room; plays O.
    Guest,
}

/// Why a session operation was rejected. Never mutates state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// No decodable room record for the code.
    #[error("Room not found")]
    RoomNotFound,

    /// The session is already attached to a room.
    #[error("Already in a room")]
    AlreadyInRoom,

    /// The room is not in a playable state.
    #[error("No active opponent session")]
    RoomNotActive,

    /// The match controller rejected the play.
    #[error(transparent)]
    Play(#[from] PlayError),
}

/// Display names for the two marks.
#[derive(Clone, Debug)]
struct PlayerNames {
    x: String,
    o: String,
}

impl Default for PlayerNames {
    fn default() -> Self {
        Self {
            x: "Player X".to_string(),
            o: "Player O".to_string(),
        }
    }
}

impl PlayerNames {
    fn get(&self, mark: Mark) -> &str {
        match mark {
            Mark::X => &self.x,
            Mark::O => &self.o,
        }
    }
}

/// Second-granularity countdown driven by the pump.
struct Countdown {
    timer: IntervalTimer,
    remaining: u32,
}

impl Countdown {
    fn new() -> Self {
        Self {
            timer: IntervalTimer::new(1_000),
            remaining: 0,
        }
    }

    /// (Re)start; any previous schedule is replaced.
    fn start(&mut self, now_ms: i64, secs: u32) {
        self.remaining = secs;
        self.timer.start(now_ms);
    }

    fn cancel(&mut self) {
        self.timer.stop();
        self.remaining = 0;
    }

    /// Remaining-seconds values for each second elapsed; self-stops at zero.
    fn poll(&mut self, now_ms: i64) -> Vec<u32> {
        let fires = self.timer.poll(now_ms);
        let mut out = Vec::new();
        for _ in 0..fires {
            if self.remaining == 0 {
                break;
            }
            self.remaining -= 1;
            out.push(self.remaining);
            if self.remaining == 0 {
                self.timer.stop();
                break;
            }
        }
        out
    }
}

/// Everything that only exists while attached to a room.
struct OnlineState {
    role: Role,
    my_mark: Mark,
    phase: SessionStatus,
    opponent_name: Option<String>,
    opponent_connected: bool,
    /// Timestamp of the last applied remote move; the staleness guard for
    /// both moves and signals.
    last_move_ts: i64,
    monitor: HeartbeatMonitor,
    transport: SyncTransport,
}

/// Mutable session context shared with the store dispatcher.
struct SessionCore {
    control: MatchController,
    names: PlayerNames,
    leaderboard: Leaderboard,
    online: Option<OnlineState>,
    win_countdown: Countdown,
    match_countdown: Countdown,
    events: Vec<SessionEvent>,
}

/// One player's session: the public surface the UI layer drives.
pub struct Session {
    store: Rc<dyn SharedStore>,
    clock: Rc<dyn Clock>,
    config: SessionConfig,
    core: Rc<RefCell<SessionCore>>,
}

impl Session {
    /// Session with default thresholds. Sweeps expired rooms from the
    /// store as part of startup.
    pub fn new(store: Rc<dyn SharedStore>, clock: Rc<dyn Clock>) -> Self {
        Self::with_config(store, clock, SessionConfig::default())
    }

    /// Session with custom thresholds.
    pub fn with_config(
        store: Rc<dyn SharedStore>,
        clock: Rc<dyn Clock>,
        config: SessionConfig,
    ) -> Self {
        RoomRegistry::new(Rc::clone(&store)).sweep_expired(clock.now_ms());

        let core = SessionCore {
            control: MatchController::new(config.winning_score),
            names: PlayerNames::default(),
            leaderboard: Leaderboard::load(Rc::clone(&store)),
            online: None,
            win_countdown: Countdown::new(),
            match_countdown: Countdown::new(),
            events: Vec::new(),
        };

        Self {
            store,
            clock,
            config,
            core: Rc::new(RefCell::new(core)),
        }
    }

    // -------------------------------------------------------------------
    // ROOM LIFECYCLE
    // -------------------------------------------------------------------

    /// Register a room and wait for a guest. The session becomes host,
    /// playing X. Returns the generated code.
    pub fn create_room(&self, host_name: &str) -> Result<String, SessionError> {
        if self.core.borrow().online.is_some() {
            return Err(SessionError::AlreadyInRoom);
        }
        let now = self.clock.now_ms();

        let registry = RoomRegistry::new(Rc::clone(&self.store));
        let code = registry.generate_code(&mut rand::thread_rng());
        registry.create_room(&code, host_name, now);

        let transport = SyncTransport::new(Rc::clone(&self.store), &code, Mark::X);
        transport.subscribe(self.dispatcher());

        let mut core = self.core.borrow_mut();
        core.control = MatchController::new(self.config.winning_score);
        core.names.x = display_name(host_name, Mark::X);
        core.online = Some(OnlineState {
            role: Role::Host,
            my_mark: Mark::X,
            phase: SessionStatus::Waiting,
            opponent_name: None,
            opponent_connected: false,
            last_move_ts: 0,
            monitor: self.monitor_for(Mark::X),
            transport,
        });
        core.events.push(SessionEvent::RoomCreated { code: code.clone() });
        Ok(code)
    }

    /// Join an existing room as guest, playing O. The code is
    /// case-insensitive. Returns the host's name.
    pub fn join_room(&self, code: &str, guest_name: &str) -> Result<String, SessionError> {
        if self.core.borrow().online.is_some() {
            return Err(SessionError::AlreadyInRoom);
        }
        let now = self.clock.now_ms();
        let code = code.trim().to_uppercase();

        let registry = RoomRegistry::new(Rc::clone(&self.store));
        let record = registry
            .join_room(&code, guest_name, now)
            .ok_or(SessionError::RoomNotFound)?;

        let transport = SyncTransport::new(Rc::clone(&self.store), &code, Mark::O);
        transport.subscribe(self.dispatcher());
        let mut monitor = self.monitor_for(Mark::O);
        monitor.start(now);

        let mut core = self.core.borrow_mut();
        core.control = MatchController::new(self.config.winning_score);
        core.names.x = record.host.clone();
        core.names.o = display_name(guest_name, Mark::O);
        core.online = Some(OnlineState {
            role: Role::Guest,
            my_mark: Mark::O,
            phase: SessionStatus::Active,
            opponent_name: Some(record.host.clone()),
            opponent_connected: true,
            last_move_ts: 0,
            monitor,
            transport,
        });
        core.events.push(SessionEvent::RoomJoined {
            host: record.host.clone(),
        });
        core.events.push(SessionEvent::OpponentConnected);
        Ok(record.host)
    }

    /// Tear the room down: publish `leave` if the opponent is still
    /// there, drop the subscription, delete every channel key, and return
    /// to `Idle`. A no-op without a room.
    pub fn leave_room(&self) {
        let now = self.clock.now_ms();
        let mut core = self.core.borrow_mut();
        let Some(online) = core.online.take() else {
            return;
        };

        if online.phase == SessionStatus::Active {
            online.transport.publish_signal(SignalKind::Leave, now);
        }
        online.transport.unsubscribe();
        online.transport.clear_channels();
        core.win_countdown.cancel();
        core.match_countdown.cancel();
        info!(code = online.transport.keys().code(), "room torn down");
    }

    // -------------------------------------------------------------------
    // PLAY
    // -------------------------------------------------------------------

    /// Make the local player's move at `cell`.
    ///
    /// Local mode moves for whoever's turn it is. Remote mode additionally
    /// requires an active room and the local mark's turn, and publishes
    /// the applied move.
    pub fn play(&self, cell: usize) -> Result<GameResult, SessionError> {
        let now = self.clock.now_ms();
        let mut guard = self.core.borrow_mut();
        let core = &mut *guard;

        let result = match core.online.as_ref() {
            None => {
                let mark = core.control.current_player();
                core.control.play(cell, mark)?
            }
            Some(online) => {
                if online.phase != SessionStatus::Active {
                    return Err(SessionError::RoomNotActive);
                }
                if core.control.current_player() != online.my_mark {
                    return Err(PlayError::NotYourTurn(online.my_mark).into());
                }
                let result = core.control.play(cell, online.my_mark)?;
                online
                    .transport
                    .publish_move(cell, core.control.board().clone(), now);
                result
            }
        };

        conclude(core, &self.config, now, result);
        Ok(result)
    }

    /// Start the next game. Remote-active sessions publish the request as
    /// a signal *and* apply it, so both peers transition.
    pub fn request_new_game(&self) {
        let now = self.clock.now_ms();
        let mut guard = self.core.borrow_mut();
        let core = &mut *guard;

        if let Some(online) = core.online.as_ref() {
            if online.phase == SessionStatus::Active {
                online.transport.publish_signal(SignalKind::NewGame, now);
            }
        }
        apply_new_game(core);
    }

    /// Reset scores and start a fresh match; same routing as
    /// [`request_new_game`](Self::request_new_game).
    pub fn request_match_reset(&self) {
        let now = self.clock.now_ms();
        let mut guard = self.core.borrow_mut();
        let core = &mut *guard;

        if let Some(online) = core.online.as_ref() {
            if online.phase == SessionStatus::Active {
                online.transport.publish_signal(SignalKind::ResetMatch, now);
            }
        }
        apply_new_match(core);
    }

    /// Set both display names for local play. Blank names fall back to
    /// the defaults.
    pub fn set_player_names(&self, x: &str, o: &str) {
        let mut core = self.core.borrow_mut();
        core.names.x = display_name(x, Mark::X);
        core.names.o = display_name(o, Mark::O);
    }

    // -------------------------------------------------------------------
    // PUMP
    // -------------------------------------------------------------------

    /// Advance every session timer to the clock's current instant:
    /// heartbeat send/check, the post-win countdown, and the match-winner
    /// countdown (which auto-starts a new match on expiry).
    pub fn pump(&self) {
        let now = self.clock.now_ms();
        let mut guard = self.core.borrow_mut();
        let core = &mut *guard;

        let mut lost = false;
        if let Some(online) = core.online.as_mut() {
            if online.phase == SessionStatus::Active {
                let transport = &online.transport;
                let outcome = online.monitor.on_pump(now, || transport.read_heartbeat());
                if outcome.beacon_due {
                    online.transport.publish_heartbeat(now);
                }
                match outcome.verdict {
                    Some(Verdict::OpponentAlive) => {
                        if !online.opponent_connected {
                            online.opponent_connected = true;
                            core.events.push(SessionEvent::OpponentConnected);
                        }
                    }
                    Some(Verdict::OpponentLost) => lost = true,
                    None => {}
                }
            }
        }
        if lost {
            declare_disconnected(core);
        }

        for remaining in core.win_countdown.poll(now) {
            if remaining > 0 {
                core.events.push(SessionEvent::CountdownTick {
                    seconds_left: remaining,
                });
            } else {
                core.events.push(SessionEvent::NewGameReady);
            }
        }

        let mut auto_reset = false;
        for remaining in core.match_countdown.poll(now) {
            if remaining > 0 {
                core.events.push(SessionEvent::MatchCountdownTick {
                    seconds_left: remaining,
                });
            } else {
                auto_reset = true;
            }
        }
        if auto_reset {
            // Each peer runs its own countdown off the same match result,
            // so both converge without a signal.
            apply_new_match(core);
        }
    }

    /// Take all pending UI notifications, oldest first.
    pub fn drain_events(&self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.core.borrow_mut().events)
    }

    // -------------------------------------------------------------------
    // ACCESSORS
    // -------------------------------------------------------------------

    /// Current lifecycle status.
    pub fn status(&self) -> SessionStatus {
        self.core
            .borrow()
            .online
            .as_ref()
            .map_or(SessionStatus::Idle, |o| o.phase)
    }

    /// The room code, while attached.
    pub fn room_code(&self) -> Option<String> {
        self.core
            .borrow()
            .online
            .as_ref()
            .map(|o| o.transport.keys().code().to_string())
    }

    /// The mark this session controls in remote mode.
    pub fn my_mark(&self) -> Option<Mark> {
        self.core.borrow().online.as_ref().map(|o| o.my_mark)
    }

    /// The opponent's display name, once known.
    pub fn opponent_name(&self) -> Option<String> {
        self.core
            .borrow()
            .online
            .as_ref()
            .and_then(|o| o.opponent_name.clone())
    }

    /// Snapshot of the board.
    pub fn board(&self) -> Board {
        self.core.borrow().control.board().clone()
    }

    /// Whose turn it is.
    pub fn current_player(&self) -> Mark {
        self.core.borrow().control.current_player()
    }

    /// Current tally.
    pub fn scores(&self) -> Scores {
        self.core.borrow().control.scores()
    }

    /// Whether the current game accepts moves.
    pub fn is_game_active(&self) -> bool {
        self.core.borrow().control.is_game_active()
    }

    /// Whether the match is still running.
    pub fn is_match_active(&self) -> bool {
        self.core.borrow().control.is_match_active()
    }

    /// Leaderboard standings, best first.
    pub fn leaderboard(&self) -> Vec<crate::leaderboard::LeaderboardEntry> {
        self.core.borrow().leaderboard.standings()
    }

    // -------------------------------------------------------------------
    // INTERNAL
    // -------------------------------------------------------------------

    fn monitor_for(&self, mark: Mark) -> HeartbeatMonitor {
        HeartbeatMonitor::with_windows(
            mark,
            self.config.heartbeat_interval_ms,
            self.config.heartbeat_timeout_ms,
            self.config.heartbeat_grace_ms,
        )
    }

    /// The single store dispatcher for this session's room channels.
    fn dispatcher(&self) -> Rc<dyn Fn(Incoming)> {
        let core = Rc::downgrade(&self.core);
        let clock = Rc::clone(&self.clock);
        let config = self.config.clone();
        Rc::new(move |incoming| {
            if let Some(core) = core.upgrade() {
                let mut guard = core.borrow_mut();
                handle_incoming(&mut guard, clock.as_ref(), &config, incoming);
            }
        })
    }
}

/// Blank-tolerant display name.
fn display_name(raw: &str, mark: Mark) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        match mark {
            Mark::X => "Player X".to_string(),
            Mark::O => "Player O".to_string(),
        }
    } else {
        trimmed.to_string()
    }
}

/// Route one decoded notification into the session.
fn handle_incoming(
    core: &mut SessionCore,
    clock: &dyn Clock,
    config: &SessionConfig,
    incoming: Incoming,
) {
    match incoming {
        Incoming::Room(record) => on_room_changed(core, clock, record),
        Incoming::Move(message) => on_move_received(core, clock, config, message),
        Incoming::Signal(signal) => on_signal_received(core, signal),
        Incoming::Heartbeat(beacon) => on_heartbeat_seen(core, clock, beacon),
    }
}

/// Host side: a guest appearing in the room record starts the game.
fn on_room_changed(core: &mut SessionCore, clock: &dyn Clock, record: RoomRecord) {
    let Some(online) = core.online.as_mut() else {
        return;
    };
    if online.role != Role::Host
        || record.status != RoomStatus::Active
        || online.opponent_name.is_some()
    {
        return;
    }

    let guest = record.guest.unwrap_or_else(|| "Player O".to_string());
    info!(guest = %guest, "guest joined, session active");

    online.opponent_name = Some(guest.clone());
    online.phase = SessionStatus::Active;
    online.opponent_connected = true;
    online.monitor.start(clock.now_ms());
    core.names.o = guest;
    core.events.push(SessionEvent::OpponentConnected);
}

fn on_move_received(
    core: &mut SessionCore,
    clock: &dyn Clock,
    config: &SessionConfig,
    message: MoveMessage,
) {
    let Some(online) = core.online.as_mut() else {
        return;
    };
    if online.phase == SessionStatus::Disconnected {
        return;
    }
    if message.player == online.my_mark {
        debug!("dropping echoed own move");
        return;
    }
    if message.ts <= online.last_move_ts {
        debug!(ts = message.ts, last = online.last_move_ts, "dropping stale move");
        return;
    }
    online.last_move_ts = message.ts;

    let expected = online.transport.move_number() + 1;
    online.transport.sync_move_number(message.move_number);

    // In sequence: identical pipeline to a local move, so both peers
    // converge on equal results. A gap means intermediate writes were
    // lost; the cumulative snapshot recovers the board.
    let result = if message.move_number == expected {
        match core.control.play(message.cell_index, message.player) {
            Ok(result) => result,
            Err(err) => {
                debug!(%err, "remote move out of step, adopting snapshot");
                core.control.install_snapshot(message.board, message.player)
            }
        }
    } else {
        debug!(
            expected,
            got = message.move_number,
            "move sequence gap, adopting snapshot"
        );
        core.control.install_snapshot(message.board, message.player)
    };

    conclude(core, config, clock.now_ms(), result);
}

fn on_signal_received(core: &mut SessionCore, signal: SignalMessage) {
    let Some(online) = core.online.as_mut() else {
        return;
    };
    if online.phase == SessionStatus::Disconnected {
        return;
    }
    if signal.initiator == online.my_mark {
        return;
    }
    if signal.ts <= online.last_move_ts {
        debug!(kind = ?signal.kind, "dropping stale signal");
        return;
    }

    match signal.kind {
        SignalKind::NewGame => apply_new_game(core),
        SignalKind::ResetMatch => apply_new_match(core),
        SignalKind::Leave => declare_disconnected(core),
    }
}

fn on_heartbeat_seen(core: &mut SessionCore, clock: &dyn Clock, beacon: HeartbeatMessage) {
    let Some(online) = core.online.as_mut() else {
        return;
    };
    if online.phase != SessionStatus::Active {
        return;
    }
    if online.monitor.note_beacon(&beacon, clock.now_ms()) && !online.opponent_connected {
        online.opponent_connected = true;
        core.events.push(SessionEvent::OpponentConnected);
    }
}

/// Shared end-of-move handling: result event, scoring, countdowns.
fn conclude(core: &mut SessionCore, config: &SessionConfig, now_ms: i64, result: GameResult) {
    match result {
        GameResult::InProgress => {}
        GameResult::Draw => core.events.push(SessionEvent::GameOver(result)),
        GameResult::Won { mark, .. } => {
            core.events.push(SessionEvent::GameOver(result));
            match core.control.record_win(mark) {
                WinRecord::Ignored => {}
                WinRecord::Scored(score) => {
                    core.events.push(SessionEvent::ScoreChanged { mark, score });
                    core.win_countdown.start(now_ms, config.win_countdown_secs);
                }
                WinRecord::MatchWon(score) => {
                    core.events.push(SessionEvent::ScoreChanged { mark, score });
                    core.events.push(SessionEvent::MatchWon(mark));
                    let winner = core.names.get(mark).to_string();
                    core.leaderboard.record_win(&winner, now_ms);
                    core.match_countdown
                        .start(now_ms, config.match_countdown_secs);
                }
            }
        }
    }
}

/// Start the next game if the match allows it.
fn apply_new_game(core: &mut SessionCore) {
    if core.control.new_game() {
        core.win_countdown.cancel();
        core.events.push(SessionEvent::NewGame);
    }
}

/// Reset the match unconditionally.
fn apply_new_match(core: &mut SessionCore) {
    core.win_countdown.cancel();
    core.match_countdown.cancel();
    core.control.new_match();
    core.events.push(SessionEvent::MatchReset);
}

/// The single disconnect transition. Guarded by the current phase, so a
/// second report (timer race, duplicate leave) is a no-op.
fn declare_disconnected(core: &mut SessionCore) {
    let Some(online) = core.online.as_mut() else {
        return;
    };
    if online.phase == SessionStatus::Disconnected {
        return;
    }
    info!("opponent disconnected");
    online.phase = SessionStatus::Disconnected;
    online.opponent_connected = false;
    online.monitor.stop();
    core.events.push(SessionEvent::OpponentDisconnected);
}
