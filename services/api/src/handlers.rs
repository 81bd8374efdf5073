//! Axum Handlers for the REST API
//!
//! Hardware control endpoints forward IoT commands to a connected device over
//! its WebSocket; action and state endpoints drive the local coordinator.
//! It uses `utoipa` doc comments to generate OpenAPI documentation.

use axum::{
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use mint_core::{
    catalog::{Expression, Motion},
    error::ForwardError,
    protocol::{self, IotCommand},
};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::{
    models::{
        ActionPayload, ActionResponse, BrightnessPayload, ControlResponse, DevicesResponse,
        EmotionPayload, LedColorPayload, LedPayload, MotionPayload, ScreenPowerPayload,
        StatePayload, StatusResponse, ToolCallResponse, ToolsResponse, VolumePayload,
    },
    state::AppState,
};

/// Effects understood by the main controller's own LED driver.
pub const DEVICE_LED_EFFECTS: &[&str] = &[
    "default", "rainbow", "breathing", "pulse", "sparkle", "wave", "fire", "ocean", "forest",
    "sunset", "aurora", "party", "relax", "focus", "sleep", "alert",
];

pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Unauthorized,
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(ControlResponse::failed(message))).into_response()
            }
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(ControlResponse::failed(message))).into_response()
            }
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(ControlResponse::failed(
                    "unauthorized: a valid API key is required",
                )),
            )
                .into_response(),
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ControlResponse::failed("An internal server error occurred.")),
                )
                    .into_response()
            }
        }
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::InternalServerError(err.into())
    }
}

fn payload<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(payload)| payload)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

fn require_device(device_id: &str) -> Result<&str, ApiError> {
    let device_id = device_id.trim();
    if device_id.is_empty() {
        return Err(ApiError::BadRequest("device_id is required".to_string()));
    }
    Ok(device_id)
}

/// Forwards a command; an absent device is reported in the body, not as an
/// HTTP error.
async fn forward(
    state: &AppState,
    device_id: &str,
    command: IotCommand,
    message: String,
) -> Result<Json<ControlResponse>, ApiError> {
    match state.registry.forward(device_id, command).await {
        Ok(()) => Ok(Json(ControlResponse::ok(message))),
        Err(e @ (ForwardError::DeviceOffline(_) | ForwardError::SocketClosed(_))) => {
            warn!(device_id, error = %e, "device unavailable");
            Ok(Json(ControlResponse::failed(e.to_string())))
        }
        Err(e) => Err(e.into()),
    }
}

/// List connected devices.
#[utoipa::path(
    get,
    path = "/api/v1/devices",
    responses(
        (status = 200, description = "Connected device ids", body = DevicesResponse),
        (status = 401, description = "Missing or invalid API key", body = ControlResponse)
    ),
    security(("bearer" = []), ("api_key" = []))
)]
pub async fn list_devices(State(state): State<Arc<AppState>>) -> Json<DevicesResponse> {
    let devices = state.registry.device_ids();
    Json(DevicesResponse {
        success: true,
        count: devices.len(),
        devices,
    })
}

/// Set, step or mute the speaker volume.
#[utoipa::path(
    post,
    path = "/api/v1/volume",
    request_body = VolumePayload,
    responses(
        (status = 200, description = "Command forwarded, or device offline", body = ControlResponse),
        (status = 400, description = "Missing device_id or unsupported action", body = ControlResponse),
        (status = 401, description = "Missing or invalid API key", body = ControlResponse)
    ),
    security(("bearer" = []), ("api_key" = []))
)]
pub async fn set_volume(
    State(state): State<Arc<AppState>>,
    body: Result<Json<VolumePayload>, JsonRejection>,
) -> Result<Json<ControlResponse>, ApiError> {
    let body = payload(body)?;
    let device_id = require_device(&body.device_id)?;
    let (command, message) = protocol::volume_command(&body.action, body.value)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    forward(&state, device_id, command, message).await
}

/// Set or step the screen brightness.
#[utoipa::path(
    post,
    path = "/api/v1/brightness",
    request_body = BrightnessPayload,
    responses(
        (status = 200, description = "Command forwarded, or device offline", body = ControlResponse),
        (status = 400, description = "Missing device_id or unsupported action", body = ControlResponse),
        (status = 401, description = "Missing or invalid API key", body = ControlResponse)
    ),
    security(("bearer" = []), ("api_key" = []))
)]
pub async fn set_brightness(
    State(state): State<Arc<AppState>>,
    body: Result<Json<BrightnessPayload>, JsonRejection>,
) -> Result<Json<ControlResponse>, ApiError> {
    let body = payload(body)?;
    let device_id = require_device(&body.device_id)?;
    let (command, message) = protocol::brightness_command(&body.action, body.value)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    forward(&state, device_id, command, message).await
}

/// Turn the screen on or off.
#[utoipa::path(
    post,
    path = "/api/v1/screen/power",
    request_body = ScreenPowerPayload,
    responses(
        (status = 200, description = "Command forwarded, or device offline", body = ControlResponse),
        (status = 400, description = "Missing device_id or unsupported power value", body = ControlResponse),
        (status = 401, description = "Missing or invalid API key", body = ControlResponse)
    ),
    security(("bearer" = []), ("api_key" = []))
)]
pub async fn set_screen_power(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ScreenPowerPayload>, JsonRejection>,
) -> Result<Json<ControlResponse>, ApiError> {
    let body = payload(body)?;
    let device_id = require_device(&body.device_id)?;
    let (command, message) = protocol::screen_power_command(&body.power)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    forward(&state, device_id, command, message).await
}

/// Run a head motion on the device's own servo driver.
#[utoipa::path(
    post,
    path = "/api/v1/motion",
    request_body = MotionPayload,
    responses(
        (status = 200, description = "Command forwarded, or device offline", body = ControlResponse),
        (status = 400, description = "Missing device_id or unknown motion", body = ControlResponse),
        (status = 401, description = "Missing or invalid API key", body = ControlResponse)
    ),
    security(("bearer" = []), ("api_key" = []))
)]
pub async fn run_motion(
    State(state): State<Arc<AppState>>,
    body: Result<Json<MotionPayload>, JsonRejection>,
) -> Result<Json<ControlResponse>, ApiError> {
    let body = payload(body)?;
    let device_id = require_device(&body.device_id)?;
    let motion: Motion = body
        .motion
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("{e}")))?;
    forward(
        &state,
        device_id,
        IotCommand::new("Servo", "ExecuteMotion").with_param("motion", motion.as_str()),
        format!("Motion {motion} started"),
    )
    .await
}

/// Switch the face shown on the device.
#[utoipa::path(
    post,
    path = "/api/v1/emotion",
    request_body = EmotionPayload,
    responses(
        (status = 200, description = "Command forwarded, or device offline", body = ControlResponse),
        (status = 400, description = "Missing device_id or unknown emotion", body = ControlResponse),
        (status = 401, description = "Missing or invalid API key", body = ControlResponse)
    ),
    security(("bearer" = []), ("api_key" = []))
)]
pub async fn set_emotion(
    State(state): State<Arc<AppState>>,
    body: Result<Json<EmotionPayload>, JsonRejection>,
) -> Result<Json<ControlResponse>, ApiError> {
    let body = payload(body)?;
    let device_id = require_device(&body.device_id)?;
    let expression = Expression::from_str(&body.emotion)
        .ok()
        .filter(|e| !e.is_animation())
        .ok_or_else(|| ApiError::BadRequest(format!("unsupported emotion: {}", body.emotion)))?;
    forward(
        &state,
        device_id,
        IotCommand::new("Expression", "SetEmotion").with_param("emotion", expression.as_str()),
        format!("Emotion set to {expression}"),
    )
    .await
}

/// Select one of the device's built-in LED effects.
#[utoipa::path(
    post,
    path = "/api/v1/led",
    request_body = LedPayload,
    responses(
        (status = 200, description = "Command forwarded, or device offline", body = ControlResponse),
        (status = 400, description = "Missing device_id or unknown effect", body = ControlResponse),
        (status = 401, description = "Missing or invalid API key", body = ControlResponse)
    ),
    security(("bearer" = []), ("api_key" = []))
)]
pub async fn set_led_effect(
    State(state): State<Arc<AppState>>,
    body: Result<Json<LedPayload>, JsonRejection>,
) -> Result<Json<ControlResponse>, ApiError> {
    let body = payload(body)?;
    let device_id = require_device(&body.device_id)?;
    if !DEVICE_LED_EFFECTS.contains(&body.effect.as_str()) {
        return Err(ApiError::BadRequest(format!(
            "unsupported effect: {}",
            body.effect
        )));
    }
    forward(
        &state,
        device_id,
        IotCommand::new("LED", "SetEffect").with_param("effect", body.effect.as_str()),
        format!("LED effect set to {}", body.effect),
    )
    .await
}

/// Set the LEDs to a solid RGB color.
#[utoipa::path(
    post,
    path = "/api/v1/led/color",
    request_body = LedColorPayload,
    responses(
        (status = 200, description = "Command forwarded, or device offline", body = ControlResponse),
        (status = 400, description = "Missing device_id", body = ControlResponse),
        (status = 401, description = "Missing or invalid API key", body = ControlResponse)
    ),
    security(("bearer" = []), ("api_key" = []))
)]
pub async fn set_led_color(
    State(state): State<Arc<AppState>>,
    body: Result<Json<LedColorPayload>, JsonRejection>,
) -> Result<Json<ControlResponse>, ApiError> {
    let body = payload(body)?;
    let device_id = require_device(&body.device_id)?;
    let (red, green, blue) = (
        body.red.clamp(0, 255),
        body.green.clamp(0, 255),
        body.blue.clamp(0, 255),
    );
    let command = IotCommand::new("LED", "SetColor")
        .with_param("red", red)
        .with_param("green", green)
        .with_param("blue", blue)
        .with_param("brightness", body.brightness.clamp(0, 100));
    forward(
        &state,
        device_id,
        command,
        format!("LED color set to RGB({red},{green},{blue})"),
    )
    .await
}

/// Submit model output; any action block is queued for the robot.
#[utoipa::path(
    post,
    path = "/api/v1/actions",
    request_body = ActionPayload,
    responses(
        (status = 200, description = "Text to speak", body = ActionResponse),
        (status = 400, description = "Malformed body", body = ControlResponse),
        (status = 401, description = "Missing or invalid API key", body = ControlResponse)
    ),
    security(("bearer" = []), ("api_key" = []))
)]
pub async fn submit_action(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ActionPayload>, JsonRejection>,
) -> Result<Json<ActionResponse>, ApiError> {
    let body = payload(body)?;
    let display_text = state.coordinator.submit(&body.text).await;
    Ok(Json(ActionResponse {
        success: true,
        display_text,
    }))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConversationState {
    Idle,
    Listening,
    Thinking,
    Speaking,
    Greeting,
}

impl FromStr for ConversationState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(Self::Idle),
            "listening" => Ok(Self::Listening),
            "thinking" => Ok(Self::Thinking),
            "speaking" => Ok(Self::Speaking),
            "greeting" => Ok(Self::Greeting),
            other => Err(format!("unsupported state: {other}")),
        }
    }
}

/// Play a conversation state (idle, listening, thinking, speaking, greeting).
#[utoipa::path(
    post,
    path = "/api/v1/state",
    request_body = StatePayload,
    responses(
        (status = 200, description = "State started", body = ControlResponse),
        (status = 400, description = "Unknown state", body = ControlResponse),
        (status = 401, description = "Missing or invalid API key", body = ControlResponse)
    ),
    security(("bearer" = []), ("api_key" = []))
)]
pub async fn apply_state(
    State(state): State<Arc<AppState>>,
    body: Result<Json<StatePayload>, JsonRejection>,
) -> Result<Json<ControlResponse>, ApiError> {
    let body = payload(body)?;
    let target: ConversationState = body.state.parse().map_err(ApiError::BadRequest)?;
    info!(state = ?target, "applying conversation state");
    let coordinator = Arc::clone(&state.coordinator);
    tokio::spawn(async move {
        match target {
            ConversationState::Idle => coordinator.idle().await,
            ConversationState::Listening => coordinator.listening().await,
            ConversationState::Thinking => coordinator.thinking().await,
            ConversationState::Speaking => coordinator.speaking().await,
            ConversationState::Greeting => coordinator.greeting().await,
        }
    });
    Ok(Json(ControlResponse::ok(format!("State {} started", body.state))))
}

/// Report what was last sent to each channel.
#[utoipa::path(
    get,
    path = "/api/v1/state",
    responses(
        (status = 200, description = "Current robot state", body = StatusResponse),
        (status = 401, description = "Missing or invalid API key", body = ControlResponse)
    ),
    security(("bearer" = []), ("api_key" = []))
)]
pub async fn get_state(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let snapshot = state.coordinator.bridge().snapshot();
    Json(StatusResponse {
        success: true,
        motion: snapshot.motion.to_string(),
        expression: snapshot.expression.to_string(),
        light: snapshot.light.to_string(),
        serial_open: snapshot.serial_open,
        socket_open: snapshot.socket_open,
        pending_actions: state.coordinator.pending(),
    })
}

/// List the tools offered to the language model.
#[utoipa::path(
    get,
    path = "/api/v1/tools",
    responses(
        (status = 200, description = "Tool names, descriptions and argument schemas", body = ToolsResponse),
        (status = 401, description = "Missing or invalid API key", body = ControlResponse)
    ),
    security(("bearer" = []), ("api_key" = []))
)]
pub async fn list_tools(State(state): State<Arc<AppState>>) -> Json<ToolsResponse> {
    Json(ToolsResponse {
        success: true,
        tools: state.tools.tools().to_vec(),
    })
}

/// Call a tool with a JSON object of arguments.
#[utoipa::path(
    post,
    path = "/api/v1/tools/{name}",
    params(("name" = String, Path, description = "Tool name", example = "mint_volume")),
    request_body = Object,
    responses(
        (status = 200, description = "The tool's reply; success is false when it rejected its arguments", body = ToolCallResponse),
        (status = 400, description = "Arguments are not a JSON object", body = ControlResponse),
        (status = 401, description = "Missing or invalid API key", body = ControlResponse),
        (status = 404, description = "No such tool", body = ControlResponse)
    ),
    security(("bearer" = []), ("api_key" = []))
)]
pub async fn call_tool(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Json<ToolCallResponse>, ApiError> {
    let serde_json::Value::Object(arguments) = payload(body)? else {
        return Err(ApiError::BadRequest(
            "tool arguments must be a JSON object".to_string(),
        ));
    };
    info!(tool = %name, "tool call requested");
    state
        .tools
        .call(&name, arguments)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("unknown tool: {name}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_state_parsing() {
        assert_eq!(
            "thinking".parse::<ConversationState>(),
            Ok(ConversationState::Thinking)
        );
        assert_eq!(
            "dancing".parse::<ConversationState>(),
            Err("unsupported state: dancing".to_string())
        );
    }

    #[test]
    fn test_require_device_trims_and_rejects_blank() {
        assert!(matches!(require_device("  mint-01 "), Ok("mint-01")));
        assert!(matches!(require_device("   "), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn test_device_led_effects_are_unique() {
        let mut effects = DEVICE_LED_EFFECTS.to_vec();
        effects.sort();
        effects.dedup();
        assert_eq!(effects.len(), 16);
    }
}
