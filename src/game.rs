//! The per-game coordinator.
//!
//! One task owns both players and the board for the whole game, reading from
//! whichever side is to move and broadcasting the outcome of every accepted
//! move. Clocks are authoritative on the server: the read deadline for a move
//! is the mover's remaining time, and remaining time only shrinks when a move
//! is accepted, so a client spamming rejected frames cannot pause its clock.

use std::time::Duration;

use tokio::time::Instant;

use crate::chess::{Board, Color, Square};
use crate::error::ServerError;
use crate::proto::{Frame, Pos};
use crate::session::Player;

/// Clock floor after an accepted move. A move that arrived in time but used
/// the clock up to the nanosecond must not read as a flag fall.
const MIN_REMAINING: Duration = Duration::from_millis(10);

/// A running game: two players, one board, one pair of clocks.
pub struct Game {
    /// Indexed white, then black.
    players: [Player; 2],
    board: Board,
}

impl Game {
    /// Pair two players with fair color assignment: a coin flip decides who
    /// takes white. Both clocks start at `time_limit`.
    #[must_use]
    pub fn new(a: Player, b: Player, time_limit: Duration) -> Self {
        if rand::random() {
            Self::with_colors(b, a, time_limit)
        } else {
            Self::with_colors(a, b, time_limit)
        }
    }

    /// Pair two players with fixed colors, white first.
    #[must_use]
    pub fn with_colors(mut white: Player, mut black: Player, time_limit: Duration) -> Self {
        white.color = Color::White;
        black.color = Color::Black;
        white.remaining = time_limit;
        black.remaining = time_limit;
        Self {
            players: [white, black],
            board: Board::new(),
        }
    }

    /// Play the game to its end. Both outbound queues are closed on return,
    /// whatever the exit path, which tears both sessions down.
    pub async fn run(mut self) {
        tracing::info!("starting new game");
        if self.send_start().await.is_err() {
            return;
        }
        let reason = self.play().await;
        tracing::info!(reason, "game over");
    }

    /// Tell both players the game is on. Each start frame carries the
    /// recipient's color and its own clock first.
    async fn send_start(&self) -> Result<(), ServerError> {
        let turn = self.board.turn();
        let [white, black] = &self.players;
        for (me, other) in [(white, black), (black, white)] {
            me.send(Frame::Start {
                color: me.color,
                turn,
                remaining_a: me.remaining,
                remaining_b: other.remaining,
            })
            .await?;
        }
        Ok(())
    }

    /// The move loop. Only a read timeout or a read error ends it; terminal
    /// board positions are relayed like any other accepted move (the SAN
    /// entry carries the `#` suffix) and the mated side's clock keeps
    /// running. Returns a short description of why the game ended, for the
    /// log.
    async fn play(&mut self) -> &'static str {
        let mut start = Instant::now();
        loop {
            let side = self.board.side_to_move();
            let turn = self.board.turn();
            let [white, black] = &mut self.players;
            let (mover, waiter) = match side {
                Color::White => (&mut *white, &mut *black),
                Color::Black => (&mut *black, &mut *white),
            };

            let frame = match mover.recv_deadline(start + mover.remaining).await {
                Ok(frame) => frame,
                Err(ServerError::ReadTimeout(_)) => {
                    mover.remaining = Duration::ZERO;
                    let text = format!("Out of time: {} wins!", waiter.color);
                    broadcast(mover, waiter, Frame::Msg { text }).await;
                    return "flag fell";
                }
                Err(_) => {
                    let text = "Opponent quit... Reload?".to_string();
                    broadcast(mover, waiter, Frame::Msg { text }).await;
                    return "player disconnected";
                }
            };

            match frame {
                Frame::Select {
                    turn: t,
                    ax,
                    ay,
                    white: w,
                    ..
                } if t == turn && w == side.is_white() => {
                    let moves = Square::new(ax, ay)
                        .map(|src| {
                            self.board
                                .candidate_moves(src)
                                .into_iter()
                                .map(Pos::from)
                                .collect()
                        })
                        .unwrap_or_default();
                    let reply = Frame::Select {
                        turn: t,
                        ax,
                        ay,
                        white: w,
                        moves,
                    };
                    // a dead session surfaces as a read error on a later turn
                    let _ = mover.send(reply).await;
                }

                Frame::Move {
                    turn: t,
                    ax,
                    ay,
                    bx,
                    by,
                    white: w,
                    ..
                } if t == turn && w == side.is_white() => {
                    let (Some(src), Some(dst)) = (Square::new(ax, ay), Square::new(bx, by))
                    else {
                        continue;
                    };
                    if !self.board.make_move(src, dst) {
                        continue;
                    }

                    // the clock only advances on accepted moves
                    let now = Instant::now();
                    mover.remaining = mover
                        .remaining
                        .saturating_sub(now.duration_since(start))
                        .max(MIN_REMAINING);
                    start = now;

                    let history = self.board.last_move().to_string();
                    for (me, other) in [(&*mover, &*waiter), (&*waiter, &*mover)] {
                        let echo = Frame::Move {
                            turn: t,
                            ax,
                            ay,
                            bx,
                            by,
                            white: w,
                            history: history.clone(),
                            remaining_a: me.remaining,
                            remaining_b: other.remaining,
                        };
                        let _ = me.send(echo).await;
                    }
                }

                // anything else (wrong turn, wrong color, pongs, chatter) is
                // ignored and the mover's clock keeps running
                _ => {}
            }
        }
    }
}

/// Send the same frame to both players, ignoring individual failures: a dead
/// peer is torn down by its own sender task.
async fn broadcast(a: &Player, b: &Player, frame: Frame) {
    let _ = a.send(frame.clone()).await;
    let _ = b.send(frame).await;
}
