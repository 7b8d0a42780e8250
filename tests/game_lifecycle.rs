//! End-to-end scenarios over scripted clients: the matcher pairs waiters into
//! real games, the games enforce clocks and rules, and teardown closes every
//! outbound queue.

use std::time::Duration;

use tokio::sync::mpsc;

use blitz::chess::Color;
use blitz::game::Game;
use blitz::matcher::Matcher;
use blitz::proto::Frame;
use blitz::session::Player;
use blitz::testing::scripted_player;

const PROBE_TIMEOUT: Duration = Duration::from_millis(500);

/// One scripted client: its feed, its outbound queue and nothing else.
struct Client {
    feed: mpsc::UnboundedSender<Frame>,
    out: mpsc::Receiver<Frame>,
}

/// Spawn a matcher that runs every matched pair as a real game.
fn spawn_matcher(time_limit: Duration) -> mpsc::Sender<Player> {
    let (waiting_tx, waiting_rx) = mpsc::channel(100);
    let matcher = Matcher::new(waiting_rx, PROBE_TIMEOUT);
    tokio::spawn(matcher.run(move |a, b| {
        tokio::spawn(Game::new(a, b, time_limit).run());
    }));
    waiting_tx
}

/// Connect a scripted client through the waiting pool, with a `pong` queued
/// up for the liveness probe.
async fn connect(waiting: &mpsc::Sender<Player>) -> Client {
    let (player, feed, out) = scripted_player(32);
    feed.send(Frame::Pong).expect("feed open");
    waiting.send(player).await.expect("pool open");
    Client { feed, out }
}

/// The next frame that is not a liveness probe.
async fn next_frame(client: &mut Client) -> Option<Frame> {
    loop {
        match client.out.recv().await? {
            Frame::Ping => continue,
            frame => return Some(frame),
        }
    }
}

/// Wait for the game to start and return the assigned color.
async fn wait_start(client: &mut Client) -> (Color, Duration, Duration) {
    match next_frame(client).await {
        Some(Frame::Start {
            color,
            remaining_a,
            remaining_b,
            ..
        }) => (color, remaining_a, remaining_b),
        other => panic!("expected start frame, got {other:?}"),
    }
}

fn client_move(turn: u32, from: (u8, u8), to: (u8, u8), white: bool) -> Frame {
    Frame::Move {
        turn,
        ax: from.0,
        ay: from.1,
        bx: to.0,
        by: to.1,
        white,
        history: String::new(),
        remaining_a: Duration::ZERO,
        remaining_b: Duration::ZERO,
    }
}

#[tokio::test]
async fn even_number_of_waiters_all_get_paired() {
    let waiting = spawn_matcher(Duration::from_secs(300));

    let mut clients = Vec::new();
    for _ in 0..8 {
        clients.push(connect(&waiting).await);
    }

    // every client ends up in a game; colors come in pairs
    let mut whites = 0;
    let mut blacks = 0;
    for client in &mut clients {
        let (color, remaining_a, remaining_b) = wait_start(client).await;
        assert_eq!(remaining_a, Duration::from_secs(300));
        assert_eq!(remaining_b, Duration::from_secs(300));
        match color {
            Color::White => whites += 1,
            Color::Black => blacks += 1,
        }
    }
    assert_eq!(whites, 4);
    assert_eq!(blacks, 4);
}

#[tokio::test]
async fn stalled_game_resolves_on_time() {
    // nobody ever moves, so whoever holds white flags: black wins
    let waiting = spawn_matcher(Duration::from_millis(200));
    let mut a = connect(&waiting).await;
    let mut b = connect(&waiting).await;

    wait_start(&mut a).await;
    wait_start(&mut b).await;

    let deadline = Duration::from_secs(5);
    for client in [&mut a, &mut b] {
        let verdict = tokio::time::timeout(deadline, next_frame(client))
            .await
            .expect("verdict in time");
        assert_eq!(
            verdict,
            Some(Frame::Msg {
                text: "Out of time: Black wins!".to_string()
            })
        );
        // the queue closes right after the verdict
        let closed = tokio::time::timeout(deadline, client.out.recv())
            .await
            .expect("teardown in time");
        assert_eq!(closed, None);
    }
}

#[tokio::test]
async fn full_game_through_the_matcher() {
    let waiting = spawn_matcher(Duration::from_secs(300));
    let mut a = connect(&waiting).await;
    let mut b = connect(&waiting).await;

    let (color_a, ..) = wait_start(&mut a).await;
    let (color_b, ..) = wait_start(&mut b).await;
    assert_eq!(color_b, color_a.opposite());

    let (mut white, mut black) = if color_a == Color::White { (a, b) } else { (b, a) };

    // 1. e4 g5 2. d4 f6 3. Qh5#
    let script = [
        ((4u8, 1u8), (4u8, 3u8), true),
        ((6, 6), (6, 4), false),
        ((3, 1), (3, 3), true),
        ((5, 6), (5, 5), false),
        ((3, 0), (7, 4), true),
    ];
    let mut last_history = String::new();
    for (turn, (from, to, is_white)) in (1u32..).zip(script) {
        let feed = if is_white { &white.feed } else { &black.feed };
        feed.send(client_move(turn, from, to, is_white))
            .expect("feed open");

        for client in [&mut white, &mut black] {
            match next_frame(client).await {
                Some(Frame::Move {
                    turn: echoed,
                    history,
                    ..
                }) => {
                    assert_eq!(echoed, turn);
                    last_history = history;
                }
                other => panic!("expected move echo, got {other:?}"),
            }
        }
    }
    assert_eq!(last_history, "Qh5#");

    // mate ends the chess, not the session: the game runs on until the
    // mated side leaves or flags
    let Client {
        feed: _white_feed,
        out: mut white_out,
    } = white;
    let Client {
        feed: black_feed,
        out: mut black_out,
    } = black;
    drop(black_feed);
    for out in [&mut white_out, &mut black_out] {
        assert_eq!(
            out.recv().await,
            Some(Frame::Msg {
                text: "Opponent quit... Reload?".to_string()
            })
        );
        assert_eq!(out.recv().await, None);
    }
}

#[tokio::test]
async fn dead_waiter_is_dropped_and_replaced() {
    let waiting = spawn_matcher(Duration::from_millis(100));

    // first waiter disconnects while waiting: its feed closes
    let (ghost, ghost_feed, mut ghost_out) = scripted_player(32);
    drop(ghost_feed);
    waiting.send(ghost).await.expect("pool open");

    let mut b = connect(&waiting).await;
    let mut c = connect(&waiting).await;

    // the ghost's session is torn down once a candidate shows up
    while ghost_out.recv().await.is_some() {}

    // the two live players still get their game
    let (color_b, ..) = wait_start(&mut b).await;
    let (color_c, ..) = wait_start(&mut c).await;
    assert_eq!(color_c, color_b.opposite());
}
