//! HTTP request handlers over the move authorizer.
//!
//! Thin consumers of [`MoveAuthorizer`]: every handler resolves input,
//! delegates, and maps the protocol error taxonomy onto status codes.
//! Forged links and unknown records are deliberately indistinguishable
//! in the response.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};

use crate::authorizer::{MoveAuthorizer, MoveRequest};
use crate::db::GameStore;
use crate::error::ProtocolError;
use crate::link::ClaimedState;
use crate::rules::GameResult;
use crate::state::GameState;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    /// The move authorizer.
    pub authorizer: Arc<MoveAuthorizer>,
    /// The persisted-mode record store.
    pub store: GameStore,
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/games", post(create_game))
        .route("/games/{id}", get(view_game))
        .route("/games/{id}/moves", post(submit_game_move))
        .route("/play", post(create_play))
        .route(
            "/play/{id}/{move_count}/{white}/{black}/{stamp}/{position}",
            get(view_play),
        )
        .route("/play/moves", post(submit_play_move))
        .with_state(state)
}

/// API error: a status code and a client-safe message.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<ProtocolError> for ApiError {
    fn from(err: ProtocolError) -> Self {
        let status = match &err {
            ProtocolError::MalformedPosition => StatusCode::BAD_REQUEST,
            ProtocolError::TamperedLink
            | ProtocolError::NotFound
            | ProtocolError::IllegalMove => StatusCode::NOT_FOUND,
            ProtocolError::MissingToken => StatusCode::UNAUTHORIZED,
            ProtocolError::UnauthorizedToken => StatusCode::FORBIDDEN,
            ProtocolError::GameOver
            | ProtocolError::DrawNotClaimable
            | ProtocolError::ConcurrencyConflict => StatusCode::CONFLICT,
            ProtocolError::Engine(_) | ProtocolError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        // One opaque message for everything a forger could probe with,
        // and for internals the client has no business seeing.
        let message = if err.is_unresolvable() {
            "game not found".to_string()
        } else if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %err, "Internal failure in authorization path");
            "internal error".to_string()
        } else {
            err.to_string()
        };
        Self { status, message }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

/// Request to create a game.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateGameRequest {
    /// White player identity (notification recipient).
    pub white: String,
    /// Black player identity (notification recipient).
    pub black: String,
}

/// Response to game creation.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedGame {
    /// URL of the fresh game.
    pub url: String,
    /// White's capability token; black's arrives after white's first move.
    pub white_token: String,
    /// The initial state.
    pub state: GameState,
}

/// A move submission body.
#[derive(Debug, Clone, Deserialize)]
pub struct MoveSubmission {
    /// Capability token for the side to move.
    pub token: Option<String>,
    /// Move in canonical notation.
    #[serde(rename = "move")]
    pub notation: Option<String>,
    /// Claim the currently available draw instead of moving.
    #[serde(default)]
    pub claim_draw: bool,
}

impl MoveSubmission {
    fn to_request(&self) -> Result<MoveRequest, ApiError> {
        match (&self.notation, self.claim_draw) {
            (Some(notation), false) => Ok(MoveRequest::Move(notation.clone())),
            (None, true) => Ok(MoveRequest::ClaimDraw),
            _ => Err(ApiError::bad_request(
                "supply exactly one of 'move' or 'claim_draw'",
            )),
        }
    }
}

/// Move submission against a stateless link.
#[derive(Debug, Clone, Deserialize)]
pub struct LinkMoveSubmission {
    /// The current link, as previously minted.
    pub link: String,
    /// The move itself.
    #[serde(flatten)]
    pub submission: MoveSubmission,
}

/// Response to an accepted move.
#[derive(Debug, Clone, Serialize)]
pub struct MoveAccepted {
    /// URL of the successor snapshot.
    pub url: String,
    /// The successor state.
    pub state: GameState,
    /// Final result, present when this move ended the game.
    pub result: Option<GameResult>,
}

/// One playable successor of a stateless snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct SuccessorView {
    /// Move in canonical notation.
    #[serde(rename = "move")]
    pub notation: String,
    /// Ready-made link applying it.
    pub url: String,
}

/// Read-only view of a persisted game.
#[derive(Debug, Clone, Serialize)]
pub struct GameView {
    /// Current state.
    pub state: GameState,
    /// Final result, if over.
    pub result: Option<GameResult>,
    /// Legal moves in enumeration order.
    pub moves: Vec<String>,
    /// Whether a draw claim is currently available.
    pub draw_claimable: bool,
}

/// Read-only view of a stateless snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct PlayView {
    /// Verified state.
    pub state: GameState,
    /// Final result, if over.
    pub result: Option<GameResult>,
    /// Successor links in enumeration order.
    pub moves: Vec<SuccessorView>,
    /// Whether a draw claim is currently available.
    pub draw_claimable: bool,
}

#[instrument(skip(state, req), fields(white = %req.white, black = %req.black))]
async fn create_game(
    State(state): State<AppState>,
    Json(req): Json<CreateGameRequest>,
) -> Result<(StatusCode, Json<CreatedGame>), ApiError> {
    info!("Creating persisted game");
    let (record, token) = state
        .authorizer
        .create_persisted(&state.store, req.white, req.black)?;
    let response = CreatedGame {
        url: state.authorizer.links().record_url(*record.id()),
        white_token: token.to_string(),
        state: record.to_state()?,
    };
    Ok((StatusCode::CREATED, Json(response)))
}

#[instrument(skip(state))]
async fn view_game(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<GameView>, ApiError> {
    let record = state
        .store
        .get(id)
        .map_err(ProtocolError::Storage)?
        .ok_or(ProtocolError::NotFound)?;
    let game = record.to_state()?;
    let (moves, draw_claimable) = state.authorizer.available_moves(&game)?;
    let result = state.authorizer.result(&game)?;
    Ok(Json(GameView {
        state: game,
        result,
        moves,
        draw_claimable,
    }))
}

#[instrument(skip(state, req))]
async fn submit_game_move(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(req): Json<MoveSubmission>,
) -> Result<Json<MoveAccepted>, ApiError> {
    let request = req.to_request()?;
    let outcome =
        state
            .authorizer
            .submit_persisted(&state.store, id, req.token.as_deref(), &request)?;
    Ok(Json(MoveAccepted {
        url: state.authorizer.links().record_url(id),
        state: outcome.state().clone(),
        result: *outcome.result(),
    }))
}

#[instrument(skip(state, req), fields(white = %req.white, black = %req.black))]
async fn create_play(
    State(state): State<AppState>,
    Json(req): Json<CreateGameRequest>,
) -> Result<(StatusCode, Json<CreatedGame>), ApiError> {
    info!("Creating stateless game");
    let (game, link, token) = state.authorizer.create_stateless(req.white, req.black);
    Ok((
        StatusCode::CREATED,
        Json(CreatedGame {
            url: link.url().clone(),
            white_token: token.to_string(),
            state: game,
        }),
    ))
}

#[instrument(skip_all)]
async fn view_play(
    State(state): State<AppState>,
    Path(segments): Path<(String, String, String, String, String, String)>,
) -> Result<Json<PlayView>, ApiError> {
    let (id, move_count, white, black, stamp, position) = segments;
    let claim = ClaimedState::from_segments(id, move_count, white, black, stamp, position);
    let game = state.authorizer.resolve_stateless(&claim)?;
    let successors = state.authorizer.successors(&game)?;
    let result = state.authorizer.result(&game)?;
    Ok(Json(PlayView {
        moves: successors
            .moves()
            .iter()
            .map(|s| SuccessorView {
                notation: s.notation().clone(),
                url: s.link().url().clone(),
            })
            .collect(),
        draw_claimable: *successors.draw_claimable(),
        state: game,
        result,
    }))
}

#[instrument(skip_all)]
async fn submit_play_move(
    State(state): State<AppState>,
    Json(req): Json<LinkMoveSubmission>,
) -> Result<Json<MoveAccepted>, ApiError> {
    let request = req.submission.to_request()?;
    let claim = state.authorizer.links().parse_url(&req.link)?;
    let outcome =
        state
            .authorizer
            .submit_stateless(&claim, req.submission.token.as_deref(), &request)?;
    let url = outcome
        .link()
        .as_ref()
        .map(|l| l.url().clone())
        .unwrap_or_default();
    Ok(Json(MoveAccepted {
        url,
        state: outcome.state().clone(),
        result: *outcome.result(),
    }))
}
