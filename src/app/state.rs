//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::{GameStateManager, MatchRegistry, RoundManager};
use crate::matchmaking::MatchmakingService;
use crate::util::rate_limit::ActionRateLimiter;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub game: Arc<GameStateManager>,
    pub match_registry: Arc<MatchRegistry>,
    pub rounds: Arc<RoundManager>,
    pub matchmaking: Arc<MatchmakingService>,
    pub action_limiter: ActionRateLimiter,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        // Single authoritative game for the process
        let game = Arc::new(GameStateManager::new(config.game.economy()));
        let match_registry = Arc::new(MatchRegistry::new());

        // Round loop is started lazily by the first match
        let rounds = Arc::new(RoundManager::new(
            game.clone(),
            match_registry.clone(),
            config.game.rounds(),
        ));

        let matchmaking = Arc::new(MatchmakingService::new(
            game.clone(),
            match_registry.clone(),
            rounds.clone(),
        ));

        Self {
            config,
            game,
            match_registry,
            rounds,
            matchmaking,
            action_limiter: ActionRateLimiter::default(),
        }
    }
}
