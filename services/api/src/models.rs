//! API Models
//!
//! Request and response bodies for the hardware control API, annotated for
//! OpenAPI generation with `utoipa`. Request fields fall back to the same
//! defaults the device firmware assumes, so clients may omit them.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

fn default_set() -> String {
    "set".to_string()
}

fn default_volume() -> i64 {
    50
}

fn default_brightness() -> i64 {
    80
}

fn default_power() -> String {
    "on".to_string()
}

fn default_neutral() -> String {
    "neutral".to_string()
}

fn default_effect() -> String {
    "default".to_string()
}

fn full_channel() -> i64 {
    255
}

fn full_brightness() -> i64 {
    100
}

#[derive(Deserialize, ToSchema, Debug)]
pub struct VolumePayload {
    #[serde(default)]
    #[schema(example = "mint-01")]
    pub device_id: String,
    /// One of `set`, `up`, `down`, `mute`, `unmute`.
    #[serde(default = "default_set")]
    #[schema(example = "set")]
    pub action: String,
    /// Target volume for `set`, clamped to 0-100.
    #[serde(default = "default_volume")]
    #[schema(example = 50)]
    pub value: i64,
}

#[derive(Deserialize, ToSchema, Debug)]
pub struct BrightnessPayload {
    #[serde(default)]
    #[schema(example = "mint-01")]
    pub device_id: String,
    /// One of `set`, `up`, `down`.
    #[serde(default = "default_set")]
    #[schema(example = "set")]
    pub action: String,
    #[serde(default = "default_brightness")]
    #[schema(example = 80)]
    pub value: i64,
}

#[derive(Deserialize, ToSchema, Debug)]
pub struct ScreenPowerPayload {
    #[serde(default)]
    #[schema(example = "mint-01")]
    pub device_id: String,
    /// `on` or `off`.
    #[serde(default = "default_power")]
    #[schema(example = "on")]
    pub power: String,
}

#[derive(Deserialize, ToSchema, Debug)]
pub struct MotionPayload {
    #[serde(default)]
    #[schema(example = "mint-01")]
    pub device_id: String,
    #[serde(default = "default_neutral")]
    #[schema(example = "nod")]
    pub motion: String,
}

#[derive(Deserialize, ToSchema, Debug)]
pub struct EmotionPayload {
    #[serde(default)]
    #[schema(example = "mint-01")]
    pub device_id: String,
    #[serde(default = "default_neutral")]
    #[schema(example = "happy")]
    pub emotion: String,
}

#[derive(Deserialize, ToSchema, Debug)]
pub struct LedPayload {
    #[serde(default)]
    #[schema(example = "mint-01")]
    pub device_id: String,
    #[serde(default = "default_effect")]
    #[schema(example = "rainbow")]
    pub effect: String,
}

#[derive(Deserialize, ToSchema, Debug)]
pub struct LedColorPayload {
    #[serde(default)]
    #[schema(example = "mint-01")]
    pub device_id: String,
    #[serde(default = "full_channel")]
    pub red: i64,
    #[serde(default = "full_channel")]
    pub green: i64,
    #[serde(default = "full_channel")]
    pub blue: i64,
    #[serde(default = "full_brightness")]
    pub brightness: i64,
}

#[derive(Deserialize, ToSchema, Debug)]
pub struct ActionPayload {
    /// Raw model output, optionally containing an action block.
    #[schema(example = r#"{"text":"Hello!","motion":"greeting","emotion":"happy","led":"rainbow"}"#)]
    pub text: String,
}

#[derive(Deserialize, ToSchema, Debug)]
pub struct StatePayload {
    /// One of `idle`, `listening`, `thinking`, `speaking`, `greeting`.
    #[schema(example = "thinking")]
    pub state: String,
}

/// Result of a control request. Failures carry `error`, successes `message`.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct ControlResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ControlResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct DevicesResponse {
    pub success: bool,
    pub devices: Vec<String>,
    pub count: usize,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct ActionResponse {
    pub success: bool,
    /// Text to hand to speech synthesis.
    pub display_text: String,
}

/// What the coordinator last sent to each channel.
#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct StatusResponse {
    pub success: bool,
    #[schema(example = "nod")]
    pub motion: String,
    #[schema(example = "happy")]
    pub expression: String,
    #[schema(example = "rainbow")]
    pub light: String,
    pub serial_open: bool,
    pub socket_open: bool,
    pub pending_actions: usize,
}

/// A tool the language model can call.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct ToolSummary {
    #[schema(example = "mint_volume")]
    pub name: String,
    pub description: String,
    /// JSON schema of the tool's arguments.
    #[schema(value_type = Object)]
    pub input_schema: serde_json::Value,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct ToolsResponse {
    pub success: bool,
    pub tools: Vec<ToolSummary>,
}

/// A tool's reply. `success` is false when the tool rejected its arguments.
#[derive(Serialize, Deserialize, ToSchema, Debug, PartialEq)]
pub struct ToolCallResponse {
    pub success: bool,
    #[schema(example = "OK. Volume set to 40.")]
    pub text: String,
}
