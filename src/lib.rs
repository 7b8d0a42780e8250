//! Real-time two-player chess over WebSockets.
//!
//! A connecting client becomes a waiting [`session::Player`]. The
//! [`matcher::Matcher`] pairs two live waiters and hands them to a
//! [`game::Game`], which owns the [`chess::Board`], relays validated moves
//! between the peers and enforces the sudden-death clocks with authoritative
//! server-side timing. Rules, SAN formatting and candidate move generation
//! live entirely in [`chess`].

pub mod chess;
pub mod config;
pub mod error;
pub mod game;
pub mod matcher;
pub mod proto;
pub mod server;
pub mod session;
pub mod stats;
pub mod testing;
