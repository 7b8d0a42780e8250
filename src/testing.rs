//! Test utilities: scripted in-process clients.
//!
//! Scenario tests drive the matcher and game runner without sockets by
//! backing a [`Player`] with channels: the test feeds inbound frames through
//! one channel and observes outbound frames on the other.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::ServerError;
use crate::proto::Frame;
use crate::session::{FrameSource, Player};

/// A frame source fed from a channel. Closing the feed looks like the peer
/// disconnecting.
pub struct ScriptSource(mpsc::UnboundedReceiver<Frame>);

#[async_trait]
impl FrameSource for ScriptSource {
    async fn recv(&mut self) -> Result<Frame, ServerError> {
        self.0.recv().await.ok_or(ServerError::ConnectionClosed)
    }
}

/// A scripted player plus the two test-side channel ends: the feed for
/// frames the "client" sends and the outbound queue the server writes to.
#[must_use]
pub fn scripted_player(
    out_capacity: usize,
) -> (Player, mpsc::UnboundedSender<Frame>, mpsc::Receiver<Frame>) {
    let (feed_tx, feed_rx) = mpsc::unbounded_channel();
    let (out_tx, out_rx) = mpsc::channel(out_capacity);
    let player = Player::new(Box::new(ScriptSource(feed_rx)), out_tx);
    (player, feed_tx, out_rx)
}
