//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the hardware control API, the device WebSocket endpoint, and
//! OpenAPI documentation.

use crate::{
    auth, handlers,
    models::{
        ActionPayload, ActionResponse, BrightnessPayload, ControlResponse, DevicesResponse,
        EmotionPayload, LedColorPayload, LedPayload, MotionPayload, ScreenPowerPayload,
        StatePayload, StatusResponse, ToolCallResponse, ToolSummary, ToolsResponse,
        VolumePayload,
    },
    state::AppState,
    ws::ws_handler,
};

use axum::{
    Router, middleware,
    routing::{get, post},
};
use std::sync::Arc;
use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

/// Path the device firmware connects to.
pub const DEVICE_WS_PATH: &str = "/xiaozhi/v1/";

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
            components.add_security_scheme(
                "api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-API-Key"))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::list_devices,
        handlers::set_volume,
        handlers::set_brightness,
        handlers::set_screen_power,
        handlers::run_motion,
        handlers::set_emotion,
        handlers::set_led_effect,
        handlers::set_led_color,
        handlers::submit_action,
        handlers::apply_state,
        handlers::get_state,
        handlers::list_tools,
        handlers::call_tool,
    ),
    components(
        schemas(
            VolumePayload, BrightnessPayload, ScreenPowerPayload, MotionPayload, EmotionPayload,
            LedPayload, LedColorPayload, ActionPayload, StatePayload, ControlResponse,
            DevicesResponse, ActionResponse, StatusResponse, ToolSummary, ToolsResponse,
            ToolCallResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Mint Hardware API", description = "Device control and action coordination for the Mint robot")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .route("/devices", get(handlers::list_devices))
        .route("/volume", post(handlers::set_volume))
        .route("/brightness", post(handlers::set_brightness))
        .route("/screen/power", post(handlers::set_screen_power))
        .route("/motion", post(handlers::run_motion))
        .route("/emotion", post(handlers::set_emotion))
        .route("/led", post(handlers::set_led_effect))
        .route("/led/color", post(handlers::set_led_color))
        .route("/actions", post(handlers::submit_action))
        .route(
            "/state",
            get(handlers::get_state).post(handlers::apply_state),
        )
        .route("/tools", get(handlers::list_tools))
        .route("/tools/{name}", post(handlers::call_tool))
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            auth::require_api_key,
        ))
        .with_state(app_state.clone());

    // The device socket is authenticated by the firmware handshake, not the API key.
    let device_router = Router::new()
        .route(DEVICE_WS_PATH, get(ws_handler))
        .with_state(app_state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/api/v1", api_router)
        .merge(device_router)
}
