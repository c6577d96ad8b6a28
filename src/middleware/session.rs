use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderValue, StatusCode, request::Parts},
    middleware::Next,
    response::Response,
};

use crate::errors::AppError;
use crate::services::session::{Session, SessionHandle};
use crate::state::AppState;

pub const SESSION_HEADER: &str = "x-session-id";

#[derive(Clone)]
pub struct SessionContext {
    pub session_id: String,
    pub session: SessionHandle,
}

impl<S: Send + Sync> FromRequestParts<S> for SessionContext {
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionContext>()
            .cloned()
            .ok_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

/// Attach the caller's session to the request, starting a new one when the
/// `x-session-id` header is missing or unknown. The id in use is echoed back
/// in the same response header.
pub async fn session_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let requested = req
        .headers()
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    let existing = match &requested {
        Some(id) => state.sessions.get(id).await.map(|h| (id.clone(), h)),
        None => None,
    };

    let (session_id, session) = match existing {
        Some(found) => found,
        None => {
            let session_id = uuid::Uuid::new_v4().to_string();
            let schedule = state.library.load(state.library.default_location()).await?;
            let handle = state
                .sessions
                .insert(Session::new(
                    session_id.clone(),
                    &state.config.widget.greeting_message,
                    schedule,
                ))
                .await;
            tracing::info!("Started widget session {session_id}");
            (session_id, handle)
        }
    };

    req.extensions_mut().insert(SessionContext {
        session_id: session_id.clone(),
        session,
    });

    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&session_id) {
        response.headers_mut().insert(SESSION_HEADER, value);
    }

    Ok(response)
}
