//! Matchmaking: waiting queue and pairing loop

pub mod queue;
pub mod service;

pub use queue::MatchmakingQueue;
pub use service::MatchmakingService;
