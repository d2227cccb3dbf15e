//! End-to-end round scenarios against the library target

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio_test::{assert_err, assert_ok};

use tower_duel_server::game::{
    ClientHandle, CombatTiming, EconomySettings, GameState, GameStateManager, MatchRegistry,
    RoundManager, RoundOutcome, RoundSettings,
};
use tower_duel_server::ws::protocol::{PlayerId, ServerMsg, SimulationData, UnitRequest};

const MAX_TICKS: u32 = 20 * 300;

fn manager() -> Arc<GameStateManager> {
    Arc::new(GameStateManager::new(EconomySettings {
        starting_gold: 200,
        starting_lives: 20,
        tick_rate: 20,
    }))
}

fn units(unit_type: &str, route: u32, count: usize) -> Vec<UnitRequest> {
    (0..count)
        .map(|_| UnitRequest {
            unit_type: unit_type.to_string(),
            route,
        })
        .collect()
}

/// What a client does with a RoundStart snapshot
fn replay(snapshot: &SimulationData) -> GameState {
    let timing = CombatTiming::from_secs(snapshot.tick_rate, 3.0, 1.0);
    let mut state = GameState::new(snapshot, timing).unwrap();
    state.run_to_completion(MAX_TICKS);
    state
}

#[test]
fn defended_lane_kills_the_attacker() {
    let game = manager();
    assert_ok!(game.build_tower(PlayerId::A, "standard", 4, 15, 1));
    assert_ok!(game.add_units_to_wave(PlayerId::B, &units("basic", 1, 1)));

    let state = replay(&game.get_current_state_snapshot());
    assert!(state.is_simulation_complete());
    assert_eq!(state.lives_lost(PlayerId::A), 0);
    assert_eq!(state.kills_by(PlayerId::A), 1);
    assert_eq!(state.gold_earned(PlayerId::A), 5);
    assert_eq!(state.gold_earned(PlayerId::B), 0);
}

#[test]
fn replays_of_the_same_snapshot_agree() {
    let game = manager();
    assert_ok!(game.build_tower(PlayerId::A, "rapid", 2, 10, 1));
    assert_ok!(game.build_tower(PlayerId::B, "sniper", 9, 30, 1));
    assert_ok!(game.add_units_to_wave(PlayerId::A, &units("fast", 2, 3)));
    assert_ok!(game.add_units_to_wave(PlayerId::B, &units("basic", 3, 4)));
    let snapshot = game.get_current_state_snapshot();

    let first = replay(&snapshot);
    let second = replay(&snapshot);
    assert_eq!(first.outcome(false), second.outcome(false));
    assert_eq!(first.current_tick(), second.current_tick());
    for (a, b) in first.units().iter().zip(second.units()) {
        assert_eq!(a.entity_id, b.entity_id);
        assert_eq!(a.x.to_bits(), b.x.to_bits());
        assert_eq!(a.y.to_bits(), b.y.to_bits());
        assert_eq!(a.health.to_bits(), b.health.to_bits());
    }
}

#[test]
fn concurrent_builds_on_one_tile_admit_exactly_one() {
    let game = manager();
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let game = game.clone();
            thread::spawn(move || game.build_tower(PlayerId::A, "standard", 5, 12, 1).is_ok())
        })
        .collect();
    let built = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();

    assert_eq!(built, 1);
    assert_eq!(game.gold(PlayerId::A), 150);
    // Two castles plus the one tower
    assert_eq!(game.get_current_state_snapshot().towers.len(), 3);
}

#[test]
fn rejected_builds_leave_gold_untouched() {
    let game = manager();
    assert_err!(game.build_tower(PlayerId::A, "standard", 11, 9, 1));
    assert_err!(game.build_tower(PlayerId::A, "standard", 5, 30, 1));
    assert_err!(game.build_tower(PlayerId::B, "standard", 8, 25, 1));
    assert_eq!(game.gold(PlayerId::A), 200);
    assert_eq!(game.gold(PlayerId::B), 200);
}

async fn next_round_start(rx: &mut UnboundedReceiver<ServerMsg>) -> (u32, SimulationData) {
    loop {
        match rx.recv().await {
            Some(ServerMsg::RoundStart {
                round_number,
                snapshot,
            }) => return (round_number, snapshot),
            Some(_) => continue,
            None => panic!("stream closed before round start"),
        }
    }
}

#[tokio::test]
async fn server_result_matches_the_client_replay() {
    let game = manager();
    let registry = Arc::new(MatchRegistry::new());
    let rounds = Arc::new(RoundManager::new(
        game.clone(),
        registry.clone(),
        RoundSettings {
            preparation: Duration::from_millis(50),
            ack_timeout: Duration::from_secs(10),
            round_income: 50,
            min_combat_secs: 3.0,
            post_combat_delay_secs: 1.0,
            max_combat_secs: 300.0,
        },
    ));

    let (a, mut rx_a) = ClientHandle::new("alice".to_string());
    let (b, mut rx_b) = ClientHandle::new("bob".to_string());
    registry.activate(a, b).unwrap();

    assert_ok!(game.build_tower(PlayerId::A, "standard", 4, 15, 1));
    assert_ok!(game.add_units_to_wave(PlayerId::B, &units("basic", 1, 1)));

    let runner = {
        let rounds = rounds.clone();
        tokio::spawn(async move { rounds.run_round().await })
    };

    let (round_a, snapshot_a) = next_round_start(&mut rx_a).await;
    let (round_b, snapshot_b) = next_round_start(&mut rx_b).await;
    assert_eq!(round_a, round_b);
    assert_eq!(snapshot_a, snapshot_b);

    let local = replay(&snapshot_a).outcome(false);
    assert!(rounds.record_ack(PlayerId::A, round_a));
    assert!(rounds.record_ack(PlayerId::B, round_b));

    let result = match runner.await.unwrap() {
        RoundOutcome::Completed(result) => result,
        other => panic!("round did not complete: {other:?}"),
    };
    assert_eq!(result.lives_lost_player_a, local.lives_lost_player_a);
    assert_eq!(result.lives_lost_player_a, 0);
    assert_eq!(result.gold_earned_player_a, local.gold_earned_player_a + 50);
    assert!(result.gold_earned_player_a > 0);

    // 200 - 50 for the tower, + 5 bounty + 50 income
    assert_eq!(game.gold(PlayerId::A), 205);
    assert_eq!(game.queued_units(), 0);
}
