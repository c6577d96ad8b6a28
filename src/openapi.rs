use utoipa::OpenApi;

use crate::errors::ErrorResponse;
use crate::routes::health::HealthResponse;
use crate::routes::widget::{
    LocationResponse, SelectLocationRequest, SendMessageRequest, SetCredentialRequest,
    TranscriptResponse, WidgetConfigResponse,
};
use crate::services::session::{Message, Role};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Bus Helper API",
        version = "0.1.0",
        description = "Chat widget backend that answers questions about the school bus schedules."
    ),
    paths(
        crate::routes::health::health_check,
        crate::routes::widget::get_config,
        crate::routes::widget::get_messages,
        crate::routes::widget::send_message,
        crate::routes::widget::get_location,
        crate::routes::widget::select_location,
        crate::routes::widget::set_credential,
        crate::routes::widget::end_session,
    ),
    components(
        schemas(
            HealthResponse,
            WidgetConfigResponse, TranscriptResponse, SendMessageRequest,
            LocationResponse, SelectLocationRequest, SetCredentialRequest,
            Message, Role,
            ErrorResponse,
        )
    ),
    tags(
        (name = "Health", description = "Health check"),
        (name = "Widget", description = "Chat widget API, scoped by the x-session-id header"),
    )
)]
pub struct ApiDoc;
