//! HTTP route definitions

use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;
use uuid::Uuid;

use crate::app::AppState;
use crate::game::ActionError;
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;
use crate::ws::protocol::{
    PlayerId, PlayerTotals, RoundPhase, ServerMsg, SimulationData, TowerSpec, UnitRequest, UnitSpec,
};

/// Ceiling on a single action request
const ACTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // CORS configuration - comma-separated origins in CLIENT_ORIGIN, permissive when unset
    let cors = match state.config.client_origin.as_deref() {
        Some(origins) => {
            let allowed_origins: Vec<header::HeaderValue> = origins
                .split(',')
                .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(allowed_origins))
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE])
        }
        None => CorsLayer::permissive(),
    };

    let public_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/state", get(state_handler))
        .route("/ws", get(ws_handler));

    // Unary game actions run on a bounded number of concurrent workers
    let action_routes = Router::new()
        .route("/actions/build_tower", post(build_tower_handler))
        .route("/actions/send_units", post(send_units_handler))
        .route("/actions/round_ack", post(round_ack_handler))
        .layer(TimeoutLayer::new(ACTION_TIMEOUT))
        .layer(ConcurrencyLimitLayer::new(state.config.max_workers));

    Router::new()
        .merge(public_routes)
        .merge(action_routes)
        .fallback(not_found_handler)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Health and state endpoints
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    connected_clients: usize,
    queue_size: usize,
    match_active: bool,
    round_number: u32,
    phase: RoundPhase,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let queue_size = state.matchmaking.queue_size().await;
    let (phase, round_number) = state.rounds.current_phase();

    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        connected_clients: state.matchmaking.connected_clients(),
        queue_size,
        match_active: state.match_registry.is_active(),
        round_number,
        phase,
    })
}

#[derive(Serialize)]
struct StateResponse {
    match_id: Option<Uuid>,
    round_number: u32,
    phase: RoundPhase,
    accepting_actions: bool,
    snapshot: SimulationData,
    totals: PlayerTotals,
}

async fn state_handler(State(state): State<AppState>) -> Json<StateResponse> {
    let (phase, round_number) = state.rounds.current_phase();
    Json(StateResponse {
        match_id: state.match_registry.match_id(),
        round_number,
        phase,
        accepting_actions: state.game.is_accepting_actions(),
        snapshot: state.game.get_current_state_snapshot(),
        totals: state.game.totals(),
    })
}

// ============================================================================
// Action endpoints
// ============================================================================

/// Shared reply shape; validation rejections are `success: false`, not HTTP errors
#[derive(Debug, Serialize)]
struct ActionResponse {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    gold: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tower: Option<TowerSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    units: Option<Vec<UnitSpec>>,
}

impl ActionResponse {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            code: None,
            gold: None,
            tower: None,
            units: None,
        }
    }

    fn rejected(player: PlayerId, err: ActionError) -> Self {
        info!(player = %player, code = err.code(), reason = %err, "Action rejected");
        Self {
            success: false,
            message: err.to_string(),
            code: Some(err.code()),
            ..Self::ok("")
        }
    }
}

/// Rate limit, active match and phase, in that order.
///
/// The phase read here is advisory; the manager re-checks its gate under its own lock.
fn admit(state: &AppState, player: PlayerId) -> Result<(), ActionError> {
    if !state.action_limiter.check(player) {
        return Err(ActionError::RateLimited);
    }
    if !state.match_registry.is_active() {
        return Err(ActionError::NoActiveMatch);
    }
    if !state.rounds.is_in_preparation() {
        return Err(ActionError::WrongPhase);
    }
    Ok(())
}

fn default_level() -> u32 {
    1
}

#[derive(Deserialize)]
struct BuildTowerRequest {
    player_id: PlayerId,
    tower_type: String,
    row: i32,
    col: i32,
    #[serde(default = "default_level")]
    level: u32,
}

async fn build_tower_handler(
    State(state): State<AppState>,
    payload: Result<Json<BuildTowerRequest>, JsonRejection>,
) -> Result<Json<ActionResponse>, AppError> {
    let Json(req) = payload?;
    let player = req.player_id;

    let built = admit(&state, player).and_then(|()| {
        state
            .game
            .build_tower(player, &req.tower_type, req.row, req.col, req.level)
    });

    match built {
        Ok(tower) => {
            state
                .match_registry
                .send_to(player.opponent(), ServerMsg::TowerPlaced { tower: tower.clone() });
            Ok(Json(ActionResponse {
                gold: Some(state.game.gold(player)),
                tower: Some(tower),
                ..ActionResponse::ok("Tower built")
            }))
        }
        Err(e) => Ok(Json(ActionResponse::rejected(player, e))),
    }
}

#[derive(Deserialize)]
struct SendUnitsRequest {
    player_id: PlayerId,
    units: Vec<UnitRequest>,
}

async fn send_units_handler(
    State(state): State<AppState>,
    payload: Result<Json<SendUnitsRequest>, JsonRejection>,
) -> Result<Json<ActionResponse>, AppError> {
    let Json(req) = payload?;
    let player = req.player_id;

    let sent = admit(&state, player)
        .and_then(|()| state.game.add_units_to_wave(player, &req.units));

    match sent {
        Ok(units) => Ok(Json(ActionResponse {
            gold: Some(state.game.gold(player)),
            message: format!("{} unit(s) queued", units.len()),
            units: Some(units),
            ..ActionResponse::ok("")
        })),
        Err(e) => Ok(Json(ActionResponse::rejected(player, e))),
    }
}

#[derive(Deserialize)]
struct RoundAckRequest {
    player_id: PlayerId,
    round_number: u32,
}

async fn round_ack_handler(
    State(state): State<AppState>,
    payload: Result<Json<RoundAckRequest>, JsonRejection>,
) -> Result<Json<ActionResponse>, AppError> {
    let Json(req) = payload?;
    if !state.action_limiter.check(req.player_id) {
        return Ok(Json(ActionResponse::rejected(
            req.player_id,
            ActionError::RateLimited,
        )));
    }

    let response = if state.rounds.record_ack(req.player_id, req.round_number) {
        ActionResponse::ok("Ack recorded")
    } else {
        ActionResponse {
            success: false,
            message: format!("Round {} is not awaiting acks", req.round_number),
            code: Some("stale_round"),
            ..ActionResponse::ok("")
        }
    };
    Ok(Json(response))
}

async fn not_found_handler() -> AppError {
    AppError::NotFound("No such route".to_string())
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}
