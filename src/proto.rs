//! The JSON frame schema spoken over the WebSocket.
//!
//! Every frame is a single JSON object tagged by its `cmd` field. Clients
//! only ever populate the coordinate fields of `move` and `select` (plus
//! `turn` and `white`); the server echoes them back enriched with the SAN
//! history entry and both clocks. Durations cross the wire as integer
//! nanoseconds.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::chess::{Color, Square};

/// A protocol frame, tagged by the `cmd` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "lowercase")]
pub enum Frame {
    /// Game start (server to client): the recipient's color and both clocks.
    Start {
        color: Color,
        turn: u32,
        #[serde(rename = "remainingA", with = "duration_nanos")]
        remaining_a: Duration,
        #[serde(rename = "remainingB", with = "duration_nanos")]
        remaining_b: Duration,
    },

    /// A half-move from `(ax, ay)` to `(bx, by)`. The client sends the bare
    /// coordinates; the server broadcast carries the SAN entry and clocks.
    Move {
        turn: u32,
        ax: u8,
        ay: u8,
        bx: u8,
        by: u8,
        white: bool,
        #[serde(default)]
        history: String,
        #[serde(rename = "remainingA", default, with = "duration_nanos")]
        remaining_a: Duration,
        #[serde(rename = "remainingB", default, with = "duration_nanos")]
        remaining_b: Duration,
    },

    /// "What can the piece at `(ax, ay)` do?" The reply repeats the request
    /// with the legal destinations filled in.
    Select {
        turn: u32,
        ax: u8,
        ay: u8,
        white: bool,
        #[serde(default)]
        moves: Vec<Pos>,
    },

    /// Human-readable announcement (server to client).
    Msg { text: String },

    /// Liveness probe (server to client).
    Ping,

    /// Liveness reply (client to server).
    Pong,

    /// Periodic statistics push (server to client).
    Stat {
        #[serde(rename = "numPlayers")]
        num_players: i64,
    },
}

/// A board coordinate as the client sees it: file `x`, rank `y`, both 0-7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pos {
    pub x: u8,
    pub y: u8,
}

impl From<Square> for Pos {
    fn from(sq: Square) -> Self {
        Self {
            x: sq.file(),
            y: sq.rank(),
        }
    }
}

/// Duration as integer nanoseconds on the wire.
mod duration_nanos {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_nanos().try_into().unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_nanos)
    }
}
