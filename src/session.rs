//! Per-connection player session.
//!
//! A [`Player`] owns the read half of a connection plus a bounded outbound
//! frame queue. A dedicated sender task drains the queue into the socket;
//! dropping the player closes the queue, which ends the sender and tears the
//! session down. That closure is the single teardown trigger for a session.

use std::time::Duration;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitStream;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::chess::Color;
use crate::error::ServerError;
use crate::proto::Frame;
use crate::stats::PlayerCounter;

/// The read half of a frame connection.
///
/// Implementations yield one in-band frame per call and surface the peer
/// going away as [`ServerError::ConnectionClosed`]. Frames that do not parse
/// are not part of the protocol and are skipped, per the rule that protocol
/// violations never end a game on their own.
#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn recv(&mut self) -> Result<Frame, ServerError>;
}

/// [`FrameSource`] over the read half of a WebSocket.
pub struct WsFrameSource {
    stream: SplitStream<WebSocket>,
}

impl WsFrameSource {
    #[must_use]
    pub fn new(stream: SplitStream<WebSocket>) -> Self {
        Self { stream }
    }
}

#[async_trait]
impl FrameSource for WsFrameSource {
    async fn recv(&mut self) -> Result<Frame, ServerError> {
        while let Some(message) = self.stream.next().await {
            let message = message.map_err(|_| ServerError::ConnectionClosed)?;
            match message {
                Message::Text(text) => match serde_json::from_str(text.as_str()) {
                    Ok(frame) => return Ok(frame),
                    Err(err) => {
                        tracing::debug!(error = %err, "skipping malformed frame");
                    }
                },
                Message::Close(_) => return Err(ServerError::ConnectionClosed),
                // binary payloads and transport-level ping/pong are not part
                // of the protocol
                _ => {}
            }
        }
        Err(ServerError::ConnectionClosed)
    }
}

/// A connected player.
///
/// Before pairing the color and clock are placeholders; the game runner
/// assigns both. The waiting pool and the runner own the player exclusively,
/// so reads never race.
pub struct Player {
    source: Box<dyn FrameSource>,
    out: mpsc::Sender<Frame>,
    /// Assigned color; meaningful only once a game starts.
    pub color: Color,
    /// Remaining clock, sudden death.
    pub remaining: Duration,
}

impl Player {
    /// Wrap a frame source and an outbound queue into a waiting player.
    #[must_use]
    pub fn new(source: Box<dyn FrameSource>, out: mpsc::Sender<Frame>) -> Self {
        Self {
            source,
            out,
            color: Color::White,
            remaining: Duration::ZERO,
        }
    }

    /// Queue a frame for delivery. Fails once the sender task is gone.
    pub async fn send(&self, frame: Frame) -> Result<(), ServerError> {
        self.out
            .send(frame)
            .await
            .map_err(|_| ServerError::ConnectionClosed)
    }

    /// Read the next frame.
    pub async fn recv(&mut self) -> Result<Frame, ServerError> {
        self.source.recv().await
    }

    /// Read the next frame, giving up at `deadline`.
    pub async fn recv_deadline(&mut self, deadline: Instant) -> Result<Frame, ServerError> {
        let now = Instant::now();
        match tokio::time::timeout_at(deadline, self.source.recv()).await {
            Ok(result) => result,
            Err(_) => Err(ServerError::ReadTimeout(
                deadline.saturating_duration_since(now),
            )),
        }
    }

    /// Probe whether the peer is still there: push a `ping` and expect a
    /// `pong` as the very next frame within `timeout`.
    pub async fn alive(&mut self, timeout: Duration) -> bool {
        if self.send(Frame::Ping).await.is_err() {
            return false;
        }
        matches!(
            self.recv_deadline(Instant::now() + timeout).await,
            Ok(Frame::Pong)
        )
    }
}

impl std::fmt::Debug for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Player")
            .field("color", &self.color)
            .field("remaining", &self.remaining)
            .finish_non_exhaustive()
    }
}

/// Drain a player's outbound queue into the socket, multiplexing the periodic
/// `stat` push so one task is the only writer. Runs until the queue closes
/// (session teardown) or a write fails; either way the socket is closed.
pub async fn run_sender(
    mut sink: futures::stream::SplitSink<WebSocket, Message>,
    mut out: mpsc::Receiver<Frame>,
    counter: PlayerCounter,
    stats_interval: Duration,
) {
    let mut ticker = tokio::time::interval(stats_interval);
    loop {
        let frame = tokio::select! {
            queued = out.recv() => match queued {
                Some(frame) => frame,
                None => break,
            },
            _ = ticker.tick() => counter.stat_frame(),
        };
        let text = match serde_json::to_string(&frame) {
            Ok(text) => text,
            Err(err) => {
                tracing::error!(error = %err, "failed to encode frame");
                continue;
            }
        };
        if let Err(err) = sink.send(Message::Text(text.into())).await {
            tracing::warn!(error = %err, "write failed, closing session");
            break;
        }
    }
    let _ = sink.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scripted_player() -> (Player, mpsc::UnboundedSender<Frame>, mpsc::Receiver<Frame>) {
        crate::testing::scripted_player(8)
    }

    #[tokio::test]
    async fn recv_deadline_times_out() {
        let (mut player, _feed, _out) = scripted_player();
        let deadline = Instant::now() + Duration::from_millis(20);
        let err = player.recv_deadline(deadline).await.unwrap_err();
        assert!(matches!(err, ServerError::ReadTimeout(_)));
    }

    #[tokio::test]
    async fn recv_surfaces_disconnect() {
        let (mut player, feed, _out) = scripted_player();
        drop(feed);
        let err = player.recv().await.unwrap_err();
        assert!(matches!(err, ServerError::ConnectionClosed));
    }

    #[tokio::test]
    async fn alive_requires_pong() {
        let (mut player, feed, mut out) = scripted_player();
        feed.send(Frame::Pong).unwrap();
        assert!(player.alive(Duration::from_millis(100)).await);
        // the probe itself went out
        assert_eq!(out.recv().await, Some(Frame::Ping));

        let (mut player, feed, _out) = scripted_player();
        feed.send(Frame::Msg {
            text: "hello".to_string(),
        })
        .unwrap();
        assert!(!player.alive(Duration::from_millis(100)).await);
    }

    #[tokio::test]
    async fn alive_fails_on_silence() {
        let (mut player, _feed, _out) = scripted_player();
        assert!(!player.alive(Duration::from_millis(20)).await);
    }

    #[tokio::test]
    async fn send_fails_after_receiver_drops() {
        let (player, _feed, out) = scripted_player();
        drop(out);
        assert!(player.send(Frame::Ping).await.is_err());
    }
}
