//! Tower Duel Server - authoritative round server for two-player lockstep tower defense
//!
//! The server owns gold, lives, tower placement and the per-round wave queue.
//! Every round it freezes that state into a snapshot, broadcasts it so both
//! clients can replay combat locally, resolves the same combat with the
//! deterministic engine in [`game::simulation`], and reveals the authoritative
//! result once both clients have acknowledged (or the ack wait times out).

pub mod app;
pub mod config;
pub mod game;
pub mod http;
pub mod matchmaking;
pub mod server;
pub mod util;
pub mod ws;
