//! Game simulation modules

pub mod economy;
pub mod entities;
pub mod manager;
pub mod map;
pub mod r#match;
pub mod placement;
pub mod round;
pub mod simulation;
pub mod snapshot;
pub mod stats;
pub mod wave;

pub use manager::{ActionError, EconomySettings, GameStateManager};
pub use r#match::{ClientHandle, DisconnectOutcome, MatchRegistry};
pub use round::{RoundManager, RoundOutcome, RoundSettings};
pub use simulation::{CombatTiming, GameState, SimulationError, SimulationOutcome};
