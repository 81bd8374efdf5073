//! Messages exchanged with the device firmware over its WebSocket.
//!
//! Outbound servo and IoT frames are encoded by `mint_core::protocol`; this
//! module only covers the session-level handshake and the device's reports.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Messages sent from the device to the server.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeviceMessage {
    /// Opens the session. Answered with [`ServerMessage::Hello`].
    Hello {
        #[serde(default)]
        version: Option<u32>,
    },
    /// Listening state changes reported by the wake-word engine.
    Listen {
        state: String,
        #[serde(default)]
        text: Option<String>,
    },
    /// Device capability descriptors or state reports.
    Iot {
        #[serde(default)]
        descriptors: Option<Value>,
        #[serde(default)]
        states: Option<Value>,
    },
    #[serde(other)]
    Other,
}

/// Messages sent from the server to the device.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Hello {
        transport: &'static str,
        session_id: Uuid,
    },
}
