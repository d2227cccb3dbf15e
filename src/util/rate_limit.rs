//! Per-player action rate limiting

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

use crate::ws::protocol::PlayerId;

pub type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Action RPCs allowed per player per second
pub const ACTION_RATE_LIMIT: u32 = 30;

pub fn create_limiter(requests_per_second: u32) -> Arc<Limiter> {
    let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::direct(quota))
}

/// One limiter per seat, shared by every action endpoint
#[derive(Clone)]
pub struct ActionRateLimiter {
    seats: [Arc<Limiter>; 2],
}

impl ActionRateLimiter {
    pub fn new(requests_per_second: u32) -> Self {
        Self {
            seats: [
                create_limiter(requests_per_second),
                create_limiter(requests_per_second),
            ],
        }
    }

    /// True if `player` may issue another action now
    pub fn check(&self, player: PlayerId) -> bool {
        self.seats[player.index()].check().is_ok()
    }
}

impl Default for ActionRateLimiter {
    fn default() -> Self {
        Self::new(ACTION_RATE_LIMIT)
    }
}
