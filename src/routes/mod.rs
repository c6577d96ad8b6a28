pub mod health;
pub mod widget;

use axum::http::HeaderName;
use axum::{Router, middleware as axum_mw, routing::get};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::middleware::session::{SESSION_HEADER, session_middleware};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([HeaderName::from_static(SESSION_HEADER)]);

    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/widget/config", get(widget::get_config));

    let session_routes = Router::new()
        .route(
            "/api/widget/messages",
            get(widget::get_messages).post(widget::send_message),
        )
        .route(
            "/api/widget/location",
            get(widget::get_location).put(widget::select_location),
        )
        .route(
            "/api/widget/credential",
            axum::routing::put(widget::set_credential),
        )
        .route(
            "/api/widget/session",
            axum::routing::delete(widget::end_session),
        )
        .layer(axum_mw::from_fn_with_state(
            state.clone(),
            session_middleware,
        ));

    let router = Router::new().merge(public_routes).merge(session_routes);

    #[cfg(feature = "openapi")]
    let router = {
        use utoipa::OpenApi;
        use utoipa_redoc::{Redoc, Servable};
        router.merge(Redoc::with_url("/api/docs", crate::openapi::ApiDoc::openapi()))
    };

    router
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
