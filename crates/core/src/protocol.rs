//! Device wire formats.
//!
//! The main controller receives JSON text frames over its WebSocket; the
//! expression controller receives newline-terminated ASCII over serial. Both
//! formats are fixed by the device firmware.

use crate::catalog::{Expression, LightEffect, ServoPosition, UnknownId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// JSON frames sent to the main controller.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SocketFrame {
    /// Moves the head servos to an absolute position.
    Servo { pitch: i32, yaw: i32 },
    /// Generic device commands handled by the firmware's IoT layer.
    Iot { commands: Vec<IotCommand> },
}

impl SocketFrame {
    /// Servo frame for a position, clamped to the servo range.
    pub fn servo(position: ServoPosition) -> Self {
        let position = position.clamped();
        SocketFrame::Servo {
            pitch: position.pitch,
            yaw: position.yaw,
        }
    }

    pub fn iot(command: IotCommand) -> Self {
        SocketFrame::Iot {
            commands: vec![command],
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// A single `{name, method, parameters}` entry in an IoT envelope.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct IotCommand {
    pub name: String,
    pub method: String,
    pub parameters: Map<String, Value>,
}

impl IotCommand {
    pub fn new(name: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            method: method.into(),
            parameters: Map::new(),
        }
    }

    pub fn with_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.to_string(), value.into());
        self
    }
}

// --- Main controller IoT commands ---

/// Speaker command for `set`, `up`, `down`, `mute` or `unmute`, with a short
/// confirmation. `value` is clamped to 0-100 and only used by `set`.
pub fn volume_command(action: &str, value: i64) -> Result<(IotCommand, String), UnknownId> {
    let speaker = |method: &str| IotCommand::new("Speaker", method);
    Ok(match action {
        "set" => {
            let volume = value.clamp(0, 100);
            (
                speaker("SetVolume").with_param("volume", volume),
                format!("Volume set to {volume}"),
            )
        }
        "up" => (speaker("VolumeUp"), "Volume raised".to_string()),
        "down" => (speaker("VolumeDown"), "Volume lowered".to_string()),
        "mute" => (speaker("Mute"), "Muted".to_string()),
        "unmute" => (speaker("Unmute"), "Unmuted".to_string()),
        other => {
            return Err(UnknownId {
                kind: "volume action",
                name: other.to_string(),
            });
        }
    })
}

/// Screen brightness command for `set`, `up` or `down`.
pub fn brightness_command(action: &str, value: i64) -> Result<(IotCommand, String), UnknownId> {
    let screen = |method: &str| IotCommand::new("Screen", method);
    Ok(match action {
        "set" => {
            let brightness = value.clamp(0, 100);
            (
                screen("SetBrightness").with_param("brightness", brightness),
                format!("Brightness set to {brightness}"),
            )
        }
        "up" => (screen("BrightnessUp"), "Brightness raised".to_string()),
        "down" => (screen("BrightnessDown"), "Brightness lowered".to_string()),
        other => {
            return Err(UnknownId {
                kind: "brightness action",
                name: other.to_string(),
            });
        }
    })
}

pub fn screen_power_command(power: &str) -> Result<(IotCommand, String), UnknownId> {
    let (method, message) = match power {
        "on" => ("TurnOn", "Screen turned on"),
        "off" => ("TurnOff", "Screen turned off"),
        other => {
            return Err(UnknownId {
                kind: "power value",
                name: other.to_string(),
            });
        }
    };
    Ok((IotCommand::new("Screen", method), message.to_string()))
}

/// Serial frame for an expression. Transient animations use `ANIM:`.
pub fn expression_frame(expression: Expression) -> String {
    if expression.is_animation() {
        format!("ANIM:{}\n", expression.as_str())
    } else {
        format!("FACE:{}\n", expression.as_str())
    }
}

/// Serial frame for an LED effect. Values are clamped before encoding.
pub fn light_frame(effect: LightEffect) -> String {
    let effect = effect.clamped();
    format!(
        "LED:{},{},{},{},{},{}\n",
        effect.mode.as_str(),
        effect.color.0,
        effect.color.1,
        effect.color.2,
        effect.speed,
        effect.brightness
    )
}
