//! Reveal session endpoints
//!
//! A session is created per page load. Loading failures are reported in the
//! returned view (`phase: "error"`), not as HTTP errors; invalid triggers
//! answer 409 and leave the phase unchanged.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::Result;
use crate::session::{RevealSession, SessionView};
use crate::share::{log_share_failure, ShareMessage};
use crate::AppState;
use regalo_common::RevealPhase;

/// Body of POST /api/sessions
#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionRequest {
    /// Identity token kept by the browser from a previous visit
    #[serde(default)]
    pub identity: Option<String>,
}

/// Response to a phase trigger
#[derive(Debug, Serialize)]
pub struct TransitionResponse {
    pub from: RevealPhase,
    pub to: RevealPhase,
    pub view: SessionView,
}

/// Body of POST /api/sessions/:id/share
#[derive(Debug, Deserialize)]
pub struct ShareRequest {
    pub url: String,
}

/// Body of POST /api/sessions/:id/share-failed
#[derive(Debug, Deserialize)]
pub struct ShareFailureReport {
    #[serde(default)]
    pub reason: String,
}

/// POST /api/sessions
///
/// Starts a session and runs it out of `Loading`.
pub async fn create_session(
    State(state): State<AppState>,
    body: Option<Json<CreateSessionRequest>>,
) -> Json<SessionView> {
    let request = body.map(|Json(r)| r).unwrap_or_default();

    let session = RevealSession::new(
        state.settings.gate,
        state.timing(),
        state.events.clone(),
        state.clock.clone(),
    );
    state.sessions.insert(session.clone()).await;

    session
        .load(
            state.identities.as_ref(),
            state.engine.as_ref(),
            request.identity.as_deref(),
        )
        .await;

    let view = session.view().await;
    info!("Session {} started in phase {}", view.session_id, view.phase);
    Json(view)
}

/// GET /api/sessions/:id
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionView>> {
    let session = state.sessions.get(session_id).await?;
    Ok(Json(session.view().await))
}

/// POST /api/sessions/:id/open
pub async fn open_gift(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<TransitionResponse>> {
    let session = state.sessions.get(session_id).await?;
    let transition = session.open().await?;

    Ok(Json(TransitionResponse {
        from: transition.from,
        to: transition.to,
        view: session.view().await,
    }))
}

/// POST /api/sessions/:id/video-ended
pub async fn video_ended(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<TransitionResponse>> {
    let session = state.sessions.get(session_id).await?;
    let transition = session.video_ended().await?;

    Ok(Json(TransitionResponse {
        from: transition.from,
        to: transition.to,
        view: session.view().await,
    }))
}

/// POST /api/sessions/:id/share
pub async fn share_phrase(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<ShareRequest>,
) -> Result<Json<ShareMessage>> {
    let session = state.sessions.get(session_id).await?;
    Ok(Json(session.share(&request.url).await?))
}

/// POST /api/sessions/:id/share-failed
pub async fn report_share_failure(
    Path(session_id): Path<Uuid>,
    Json(report): Json<ShareFailureReport>,
) -> StatusCode {
    log_share_failure(session_id, &report.reason);
    StatusCode::NO_CONTENT
}

/// DELETE /api/sessions/:id
pub async fn end_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<StatusCode> {
    state.sessions.remove(session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
