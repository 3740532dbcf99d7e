//! Chat turn HTTP handlers.
//!
//! Endpoints:
//! - POST /chat            - Submit a turn, returns the full transcript
//! - GET  /chat/{chat_id}  - Read a transcript

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;

use entangle_types::chat::{ChatId, Transcript};
use entangle_types::error::TurnError;
use entangle_types::turn::TurnInput;

use crate::http::error::AppError;
use crate::http::extractors::auth::Caller;
use crate::state::AppState;

/// POST /chat - Submit one turn.
///
/// An upstream failure leaves the user message stored; the error body names
/// the chat so the caller can re-read it.
pub async fn submit_turn(
    State(state): State<AppState>,
    caller: Caller,
    body: Result<Json<TurnInput>, JsonRejection>,
) -> Result<Json<Transcript>, AppError> {
    let Json(input) = body.map_err(|rejection| AppError::InvalidBody(rejection.body_text()))?;

    if !caller.may_send_as(&input.sender_id) {
        return Err(AppError::Forbidden(format!(
            "API key may not send as '{}'",
            input.sender_id
        )));
    }

    let transcript = state.orchestrator.submit_turn(input).await?;
    Ok(Json(transcript))
}

/// GET /chat/{chat_id} - Read a chat's transcript.
pub async fn get_transcript(
    State(state): State<AppState>,
    _caller: Caller,
    Path(chat_id): Path<String>,
) -> Result<Json<Transcript>, AppError> {
    let chat_id = ChatId::parse(chat_id).map_err(TurnError::from)?;
    let transcript = state.orchestrator.transcript(&chat_id).await?;
    Ok(Json(transcript))
}
