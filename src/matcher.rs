//! Pairing of waiting players.
//!
//! The matcher holds the oldest waiter and, whenever a second player shows
//! up, probes the holder for liveness. A live holder and the newcomer become
//! a game; a dead holder is discarded and the newcomer takes its place. The
//! probe is only paid when a candidate exists, which amortizes its cost and
//! keeps players who navigated away from eating a real opponent's time.

use std::time::Duration;

use tokio::sync::mpsc;

use crate::session::Player;

/// The pairing loop. Owns the receiving end of the waiting pool; the
/// WebSocket handlers own senders into it.
pub struct Matcher {
    waiting: mpsc::Receiver<Player>,
    probe_timeout: Duration,
}

impl Matcher {
    /// Create a matcher draining the given waiting pool.
    #[must_use]
    pub fn new(waiting: mpsc::Receiver<Player>, probe_timeout: Duration) -> Self {
        Self {
            waiting,
            probe_timeout,
        }
    }

    /// Run until the waiting pool closes. Every matched pair is handed to
    /// `start_game`; the caller decides how to spawn the game.
    pub async fn run<F>(mut self, mut start_game: F)
    where
        F: FnMut(Player, Player),
    {
        let Some(mut hold) = self.waiting.recv().await else {
            return;
        };
        loop {
            let Some(candidate) = self.waiting.recv().await else {
                return;
            };
            if hold.alive(self.probe_timeout).await {
                start_game(hold, candidate);
                match self.waiting.recv().await {
                    Some(next) => hold = next,
                    None => return,
                }
            } else {
                // the holder navigated away while waiting; closing its queue
                // tears the session down
                tracing::debug!("discarding dead waiter");
                drop(hold);
                hold = candidate;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::Frame;
    use crate::testing::scripted_player;

    #[tokio::test]
    async fn pairs_live_players() {
        let (waiting_tx, waiting_rx) = mpsc::channel(16);
        let (games_tx, mut games_rx) = mpsc::unbounded_channel();
        let matcher = Matcher::new(waiting_rx, Duration::from_millis(200));
        let handle = tokio::spawn(matcher.run(move |a, b| {
            let _ = games_tx.send((a, b));
        }));

        let mut feeds = Vec::new();
        let mut outs = Vec::new();
        for _ in 0..6 {
            let (player, feed, out) = scripted_player(8);
            // answer the liveness probe up front
            feed.send(Frame::Pong).unwrap();
            feeds.push(feed);
            outs.push(out);
            waiting_tx.send(player).await.unwrap();
        }
        drop(waiting_tx);
        handle.await.unwrap();

        let mut games = 0;
        while games_rx.try_recv().is_ok() {
            games += 1;
        }
        assert_eq!(games, 3);
    }

    #[tokio::test]
    async fn discards_dead_holder() {
        let (waiting_tx, waiting_rx) = mpsc::channel(16);
        let (games_tx, mut games_rx) = mpsc::unbounded_channel();
        let matcher = Matcher::new(waiting_rx, Duration::from_millis(50));
        let handle = tokio::spawn(matcher.run(move |a, b| {
            let _ = games_tx.send((a, b));
        }));

        // the first player is already gone: its feed is closed
        let (dead, dead_feed, mut dead_out) = scripted_player(8);
        drop(dead_feed);
        waiting_tx.send(dead).await.unwrap();

        let (second, second_feed, _second_out) = scripted_player(8);
        second_feed.send(Frame::Pong).unwrap();
        waiting_tx.send(second).await.unwrap();

        let (third, _third_feed, _third_out) = scripted_player(8);
        waiting_tx.send(third).await.unwrap();
        drop(waiting_tx);
        handle.await.unwrap();

        // the dead holder was discarded and its queue closed...
        loop {
            match dead_out.recv().await {
                Some(_) => {}
                None => break,
            }
        }
        // ...and the remaining two players were paired
        assert!(games_rx.try_recv().is_ok());
        assert!(games_rx.try_recv().is_err());
    }
}
