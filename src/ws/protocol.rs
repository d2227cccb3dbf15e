//! WebSocket protocol message definitions
//! These are the wire types for client-server communication, plus the
//! simulation snapshot shapes both sides run the deterministic replay from.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The two seats of a match. Serialized as the literal strings "A" and "B".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PlayerId {
    /// Left side of the map
    #[serde(rename = "A")]
    A,
    /// Right side of the map
    #[serde(rename = "B")]
    B,
}

impl PlayerId {
    pub const ALL: [PlayerId; 2] = [PlayerId::A, PlayerId::B];

    /// The other seat
    pub fn opponent(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }

    /// Stable array index (A = 0, B = 1)
    pub fn index(self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
        }
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tower captured into a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TowerSpec {
    pub player_id: PlayerId,
    /// Key into the tower stats table
    pub tower_type: String,
    /// Pixel-space centre X
    pub position_x: f64,
    /// Pixel-space centre Y
    pub position_y: f64,
    pub level: u32,
}

/// A unit queued to spawn in the next combat
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSpec {
    pub player_id: PlayerId,
    /// Key into the unit stats table
    pub unit_type: String,
    /// Route number (>= 1)
    pub route: u32,
    /// Tick the unit enters the map. Zero means "not yet scheduled".
    #[serde(default)]
    pub spawn_tick: u32,
}

/// Immutable input for one round of combat
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationData {
    pub tick_rate: u32,
    pub towers: Vec<TowerSpec>,
    pub units: Vec<UnitSpec>,
}

/// A single entry of a SendUnits request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitRequest {
    pub unit_type: String,
    pub route: u32,
}

/// Per-player deltas produced by one round of combat
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundResult {
    pub round_number: u32,
    pub lives_lost_player_a: u32,
    pub lives_lost_player_b: u32,
    pub gold_earned_player_a: u32,
    pub gold_earned_player_b: u32,
}

impl RoundResult {
    pub fn lives_lost(&self, player: PlayerId) -> u32 {
        match player {
            PlayerId::A => self.lives_lost_player_a,
            PlayerId::B => self.lives_lost_player_b,
        }
    }

    pub fn gold_earned(&self, player: PlayerId) -> u32 {
        match player {
            PlayerId::A => self.gold_earned_player_a,
            PlayerId::B => self.gold_earned_player_b,
        }
    }
}

/// Authoritative economy totals, sent so clients can correct drift
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerTotals {
    pub gold_player_a: u32,
    pub gold_player_b: u32,
    pub lives_player_a: u32,
    pub lives_player_b: u32,
}

impl PlayerTotals {
    pub fn gold(&self, player: PlayerId) -> u32 {
        match player {
            PlayerId::A => self.gold_player_a,
            PlayerId::B => self.gold_player_b,
        }
    }

    pub fn lives(&self, player: PlayerId) -> u32 {
        match player {
            PlayerId::A => self.lives_player_a,
            PlayerId::B => self.lives_player_b,
        }
    }
}

/// Round lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundPhase {
    /// Builds and unit sends are accepted
    Preparation,
    /// Deterministic combat is being resolved
    Combat,
    /// Waiting for both clients to finish their local replay
    AwaitingAcks,
    /// Authoritative result is being revealed
    ResultBroadcast,
}

/// Messages sent from client to server over the match stream
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },

    /// Leave the queue or forfeit the current match
    Leave,
}

/// Messages sent from server to client over the match stream
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome {
        client_id: Uuid,
        server_time: u64,
    },

    /// Matchmaking progress
    QueueUpdate {
        message: String,
    },

    /// Paired with an opponent
    MatchFound {
        match_id: Uuid,
        /// Seat assigned to the receiving client
        player_id: PlayerId,
        opponent_name: String,
        /// Initial (empty) snapshot carrying the tick rate and castles
        snapshot: SimulationData,
        totals: PlayerTotals,
    },

    /// Round lifecycle transition
    PhaseChanged {
        phase: RoundPhase,
        round_number: u32,
    },

    /// Combat begins; clients replay this snapshot locally
    RoundStart {
        round_number: u32,
        snapshot: SimulationData,
    },

    /// The opponent placed a tower
    TowerPlaced {
        tower: TowerSpec,
    },

    /// Authoritative outcome of a round
    RoundResult {
        result: RoundResult,
        totals: PlayerTotals,
    },

    /// The opponent left; the receiver wins
    OpponentDisconnected {
        winner: PlayerId,
        message: String,
    },

    /// A player ran out of lives
    GameOver {
        winner: Option<PlayerId>,
        reason: String,
    },

    /// Error message
    Error {
        code: String,
        message: String,
    },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}
