//! Per-player gold and lives counters
//!
//! The ledger has no lock of its own. It is only ever touched through the
//! [`GameStateManager`](super::manager::GameStateManager), which holds its
//! mutex for every call.

use crate::ws::protocol::{PlayerId, PlayerTotals, RoundResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EconomyLedger {
    gold: [u32; 2],
    lives: [u32; 2],
}

impl EconomyLedger {
    pub fn new(starting_gold: u32, starting_lives: u32) -> Self {
        Self {
            gold: [starting_gold; 2],
            lives: [starting_lives; 2],
        }
    }

    pub fn get_gold(&self, player: PlayerId) -> u32 {
        self.gold[player.index()]
    }

    pub fn get_lives(&self, player: PlayerId) -> u32 {
        self.lives[player.index()]
    }

    /// Deduct gold. Fails without touching the balance when funds are short.
    pub fn spend_gold(&mut self, player: PlayerId, amount: u32) -> bool {
        let balance = &mut self.gold[player.index()];
        if amount > *balance {
            return false;
        }
        *balance -= amount;
        true
    }

    pub fn add_gold(&mut self, player: PlayerId, amount: u32) {
        let balance = &mut self.gold[player.index()];
        *balance = balance.saturating_add(amount);
    }

    /// Remove lives, clamping at zero
    pub fn lose_lives(&mut self, player: PlayerId, amount: u32) {
        let lives = &mut self.lives[player.index()];
        *lives = lives.saturating_sub(amount);
    }

    /// Apply all four deltas of a round in one step
    pub fn apply_round_result(&mut self, result: &RoundResult) {
        for player in PlayerId::ALL {
            self.lose_lives(player, result.lives_lost(player));
            self.add_gold(player, result.gold_earned(player));
        }
    }

    pub fn totals(&self) -> PlayerTotals {
        PlayerTotals {
            gold_player_a: self.get_gold(PlayerId::A),
            gold_player_b: self.get_gold(PlayerId::B),
            lives_player_a: self.get_lives(PlayerId::A),
            lives_player_b: self.get_lives(PlayerId::B),
        }
    }
}
