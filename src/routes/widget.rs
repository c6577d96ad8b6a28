use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tokio_stream::StreamExt;

use crate::errors::AppError;
use crate::middleware::session::SessionContext;
use crate::services::conversation::{self, is_usable_credential};
use crate::services::session::Message;
use crate::state::AppState;

#[derive(Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct WidgetConfigResponse {
    pub widget_title: String,
    pub greeting_message: String,
    pub locations: Vec<String>,
    pub default_location: String,
    /// When false the widget must ask the visitor for an API key.
    pub credential_configured: bool,
}

#[cfg_attr(feature = "openapi", utoipa::path(get, path = "/api/widget/config", tag = "Widget", responses((status = 200, body = WidgetConfigResponse))))]
pub async fn get_config(State(state): State<AppState>) -> Json<WidgetConfigResponse> {
    Json(WidgetConfigResponse {
        widget_title: state.config.widget.title.clone(),
        greeting_message: state.config.widget.greeting_message.clone(),
        locations: state
            .library
            .locations()
            .iter()
            .map(|l| l.name.clone())
            .collect(),
        default_location: state.library.default_location().to_string(),
        credential_configured: state.turn_settings.configured_credential.is_some(),
    })
}

#[derive(Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TranscriptResponse {
    pub session_id: String,
    pub location: String,
    pub messages: Vec<Message>,
}

#[cfg_attr(feature = "openapi", utoipa::path(get, path = "/api/widget/messages", tag = "Widget", responses((status = 200, body = TranscriptResponse))))]
pub async fn get_messages(ctx: SessionContext) -> Json<TranscriptResponse> {
    let session = ctx.session.lock().await;
    Json(TranscriptResponse {
        session_id: ctx.session_id.clone(),
        location: session.location.clone(),
        messages: session.transcript.messages().to_vec(),
    })
}

#[derive(Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SendMessageRequest {
    pub message: String,
}

#[cfg_attr(feature = "openapi", utoipa::path(post, path = "/api/widget/messages", tag = "Widget", request_body = SendMessageRequest, responses((status = 200, description = "SSE stream of the assistant reply"), (status = 401, body = crate::errors::ErrorResponse))))]
pub async fn send_message(
    State(state): State<AppState>,
    ctx: SessionContext,
    Json(payload): Json<SendMessageRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    if payload.message.trim().is_empty() {
        return Err(AppError::Validation("Message cannot be empty".to_string()));
    }

    // Held across the remote call so a second turn of this session waits.
    let mut session = ctx.session.lock().await;
    let response = conversation::take_turn(
        &mut session,
        &payload.message,
        &state.turn_settings,
        state.chat.as_ref(),
    )
    .await?;
    drop(session);

    // Stream response as SSE
    let words: Vec<String> = response
        .split_inclusive(' ')
        .map(|s| s.to_string())
        .collect();

    let stream = tokio_stream::iter(words)
        .throttle(std::time::Duration::from_millis(20))
        .map(|word| Ok(Event::default().data(word)))
        .chain(tokio_stream::once(Ok(Event::default().data("[DONE]"))));

    Ok(Sse::new(stream))
}

#[derive(Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct LocationResponse {
    pub location: String,
    pub chunk_count: usize,
}

#[cfg_attr(feature = "openapi", utoipa::path(get, path = "/api/widget/location", tag = "Widget", responses((status = 200, body = LocationResponse))))]
pub async fn get_location(ctx: SessionContext) -> Json<LocationResponse> {
    let session = ctx.session.lock().await;
    Json(LocationResponse {
        location: session.location.clone(),
        chunk_count: session.chunks.len(),
    })
}

#[derive(Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SelectLocationRequest {
    pub location: String,
}

#[cfg_attr(feature = "openapi", utoipa::path(put, path = "/api/widget/location", tag = "Widget", request_body = SelectLocationRequest, responses((status = 200, body = LocationResponse))))]
pub async fn select_location(
    State(state): State<AppState>,
    ctx: SessionContext,
    Json(payload): Json<SelectLocationRequest>,
) -> Result<Json<LocationResponse>, AppError> {
    // Load before locking so an in-flight turn is not held up by extraction.
    let schedule = state.library.load(&payload.location).await?;

    let mut session = ctx.session.lock().await;
    session.switch_schedule(schedule);

    Ok(Json(LocationResponse {
        location: session.location.clone(),
        chunk_count: session.chunks.len(),
    }))
}

#[derive(Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SetCredentialRequest {
    pub api_key: String,
}

#[cfg_attr(feature = "openapi", utoipa::path(put, path = "/api/widget/credential", tag = "Widget", request_body = SetCredentialRequest, responses((status = 204))))]
pub async fn set_credential(
    ctx: SessionContext,
    Json(payload): Json<SetCredentialRequest>,
) -> Result<StatusCode, AppError> {
    if !is_usable_credential(&payload.api_key) {
        return Err(AppError::Validation("API key cannot be empty".to_string()));
    }

    ctx.session.lock().await.credential = Some(payload.api_key.trim().to_string());
    tracing::info!("Session {} supplied an API key", ctx.session_id);

    Ok(StatusCode::NO_CONTENT)
}

#[cfg_attr(feature = "openapi", utoipa::path(delete, path = "/api/widget/session", tag = "Widget", responses((status = 204))))]
pub async fn end_session(State(state): State<AppState>, ctx: SessionContext) -> StatusCode {
    state.sessions.remove(&ctx.session_id).await;
    tracing::info!("Ended widget session {}", ctx.session_id);
    StatusCode::NO_CONTENT
}
