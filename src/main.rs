//! Cross-Nought Demo
//!
//! Drives two in-process sessions against one shared in-memory store:
//! room handshake, a full game exchanged through the move channel, an
//! explicit leave, and a simulated-time heartbeat disconnect.

use std::rc::Rc;
use std::time::Duration;

use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use cross_nought::{
    Clock, GameResult, ManualClock, MemoryStore, Session, SessionEvent, SystemClock, VERSION,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    info!("Cross-Nought demo v{}", VERSION);

    demo_online_game().await?;
    demo_heartbeat_disconnect();

    Ok(())
}

fn log_events(who: &str, session: &Session) {
    for event in session.drain_events() {
        info!(who, ?event);
    }
}

/// Two sessions handshake through the store and exchange a full game,
/// then the guest leaves and the host observes it.
async fn demo_online_game() -> anyhow::Result<()> {
    info!("=== Online Game ===");

    let store = MemoryStore::new();
    let clock = Rc::new(SystemClock);

    let host = Session::new(Rc::new(store.handle()), clock.clone());
    let guest = Session::new(Rc::new(store.handle()), clock.clone());

    let code = host.create_room("Ada")?;
    info!(code = %code, "host created room");

    let host_name = guest.join_room(&code, "Grace")?;
    info!(host = %host_name, "guest joined");
    log_events("host", &host);
    log_events("guest", &guest);

    // X takes the top row while O answers in the middle row.
    for (turn, cell) in [0, 3, 1, 4, 2].into_iter().enumerate() {
        let result = if turn % 2 == 0 {
            host.play(cell)?
        } else {
            guest.play(cell)?
        };
        info!(turn, cell, ?result, "move applied");
        // Distinct send timestamps, like any real exchange.
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let scores = host.scores();
    info!(x = scores.x, o = scores.o, "scores after game");
    match host.board().evaluate() {
        GameResult::Won { mark, line } => info!(%mark, ?line, "game decided"),
        other => info!(?other, "unexpected terminal state"),
    }
    log_events("host", &host);
    log_events("guest", &guest);

    guest.leave_room();
    log_events("host", &host);
    info!(status = ?host.status(), "host status after guest left");
    host.leave_room();

    Ok(())
}

/// A vanished opponent (no leave signal, no heartbeats) is detected
/// through the timeout + grace path, exactly once, under simulated time.
fn demo_heartbeat_disconnect() {
    info!("=== Heartbeat Disconnect ===");

    let store = MemoryStore::new();
    let clock = ManualClock::starting_at(0);

    let host = Session::new(Rc::new(store.handle()), Rc::new(clock.clone()));
    let guest = Session::new(Rc::new(store.handle()), Rc::new(clock.clone()));

    let code = host.create_room("Ada").expect("fresh session has no room");
    guest
        .join_room(&code, "Grace")
        .expect("room was just created");
    host.drain_events();

    // The guest's tab dies silently: only the host keeps pumping.
    let mut disconnect_events = 0;
    for _ in 0..20 {
        clock.advance(1_000);
        host.pump();
        for event in host.drain_events() {
            if event == SessionEvent::OpponentDisconnected {
                disconnect_events += 1;
            }
            info!(second = clock.now_ms() / 1_000, ?event);
        }
    }

    info!(
        status = ?host.status(),
        disconnect_events,
        "host after 20s of silence"
    );
    if disconnect_events == 1 {
        info!("DISCONNECT DECLARED EXACTLY ONCE");
    } else {
        info!("UNEXPECTED DISCONNECT COUNT: {}", disconnect_events);
    }
    host.leave_room();
}
