//! Mint Tool Service
//!
//! Exposes the robot's body to a language model as MCP tools, so the model
//! can move, emote and change the lights as a side effect of a reply instead
//! of encoding the action in its text. Speaker and screen tools forward IoT
//! commands to a connected device; without one they answer with an apology
//! rather than an error.

use crate::catalog::{Expression, LightEffectId, LightMode, Motion, MotionSpeed, Rgb, UnknownId};
use crate::coordinator::ActionCoordinator;
use crate::error::ForwardError;
use crate::protocol::{self, IotCommand};
use crate::registry::{ConnectionRegistry, DeviceConnection};
use rmcp::{
    ServerHandler,
    handler::server::{router::tool::ToolRouter, tool::Parameters},
    model::{ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Deserialize, JsonSchema, Debug)]
pub struct MotionArgs {
    #[schemars(
        description = "Head motion: neutral, nod, shake, tilt_left, tilt_right, look_up, look_down, look_left, look_right, excited, shy or greeting"
    )]
    pub motion: String,
    #[schemars(description = "Playback speed: slow, normal (default) or fast")]
    pub speed: Option<String>,
}

#[derive(Deserialize, JsonSchema, Debug)]
pub struct EmotionArgs {
    #[schemars(
        description = "Facial expression: neutral, happy, sad, angry, surprised, sleepy, thinking, love, doubt, scared, proud, speechless, blink or wink"
    )]
    pub emotion: String,
}

#[derive(Deserialize, JsonSchema, Debug)]
pub struct LedArgs {
    #[schemars(
        description = "LED preset, e.g. off, breathing_cyan, pulse_blue, rainbow, spin_purple, blink_red or solid_white"
    )]
    pub effect: String,
}

#[derive(Deserialize, JsonSchema, Debug)]
pub struct LedColorArgs {
    #[schemars(description = "Red channel (0-255)")]
    pub r: i64,
    #[schemars(description = "Green channel (0-255)")]
    pub g: i64,
    #[schemars(description = "Blue channel (0-255)")]
    pub b: i64,
    #[schemars(description = "Light mode: solid, breathing (default) or pulse")]
    pub mode: Option<String>,
}

#[derive(Deserialize, JsonSchema, Debug)]
pub struct VolumeArgs {
    #[schemars(description = "One of: set, up, down, mute, unmute")]
    pub action: String,
    #[schemars(description = "Volume 0-100, only used by 'set' (default 50)")]
    pub value: Option<i64>,
    #[schemars(description = "Target device; defaults to the most recently connected one")]
    pub device_id: Option<String>,
}

#[derive(Deserialize, JsonSchema, Debug)]
pub struct DeviceArgs {
    #[schemars(description = "Target device; defaults to the most recently connected one")]
    pub device_id: Option<String>,
}

#[derive(Deserialize, JsonSchema, Debug)]
pub struct BrightnessArgs {
    #[schemars(description = "One of: set, up, down")]
    pub action: String,
    #[schemars(description = "Brightness 0-100, only used by 'set' (default 80)")]
    pub value: Option<i64>,
    #[schemars(description = "Target device; defaults to the most recently connected one")]
    pub device_id: Option<String>,
}

#[derive(Deserialize, JsonSchema, Debug)]
pub struct ScreenPowerArgs {
    #[schemars(description = "on or off")]
    pub power: String,
    #[schemars(description = "Target device; defaults to the most recently connected one")]
    pub device_id: Option<String>,
}

pub struct MintToolService {
    coordinator: Arc<ActionCoordinator>,
    registry: Arc<ConnectionRegistry>,
    tool_router: ToolRouter<Self>,
}

impl MintToolService {
    /// The requested device, or the most recently connected one. `Err` holds
    /// the reply for the model when there is none.
    fn target(&self, requested: Option<&str>) -> Result<Arc<DeviceConnection>, String> {
        match requested.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => self
                .registry
                .get(id)
                .ok_or_else(|| format!("Sorry, device '{id}' is not connected.")),
            None => self
                .registry
                .latest()
                .ok_or_else(|| "Sorry, no device is connected.".to_string()),
        }
    }

    async fn forward(
        &self,
        device_id: Option<&str>,
        command: Result<(IotCommand, String), UnknownId>,
    ) -> Result<String, String> {
        let (command, message) = command.map_err(|e| e.to_string())?;
        let device = match self.target(device_id) {
            Ok(device) => device,
            Err(reply) => return Ok(reply),
        };
        match self.registry.forward(&device.device_id, command).await {
            Ok(()) => Ok(format!("OK. {message}.")),
            Err(e @ (ForwardError::DeviceOffline(_) | ForwardError::SocketClosed(_))) => {
                warn!(device_id = %device.device_id, error = %e, "tool command not delivered");
                Ok(format!("Sorry, the device is unavailable: {e}."))
            }
            Err(e) => Err(e.to_string()),
        }
    }
}

#[tool_handler]
impl ServerHandler for MintToolService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

#[tool_router]
impl MintToolService {
    pub fn new(coordinator: Arc<ActionCoordinator>, registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            coordinator,
            registry,
            tool_router: Self::tool_router(),
        }
    }

    /// Starts the motion in the background and returns straight away.
    #[tool(description = "Move Mint's head, e.g. nod to agree, shake to disagree, look around.")]
    pub async fn mint_motion(&self, args: Parameters<MotionArgs>) -> Result<String, String> {
        info!(args = ?args.0, "Executing tool 'mint_motion'");
        let motion = args.0.motion.parse::<Motion>().map_err(|e| e.to_string())?;
        let speed = match args.0.speed.as_deref() {
            Some(speed) => speed.parse::<MotionSpeed>().map_err(|e| e.to_string())?,
            None => MotionSpeed::default(),
        };
        let coordinator = Arc::clone(&self.coordinator);
        tokio::spawn(async move { coordinator.execute_motion(motion, speed).await });
        Ok(format!("OK. Playing motion '{motion}'."))
    }

    #[tool(description = "Change the face shown on Mint's eye display.")]
    pub async fn mint_emotion(&self, args: Parameters<EmotionArgs>) -> Result<String, String> {
        info!(args = ?args.0, "Executing tool 'mint_emotion'");
        let expression = args.0.emotion.parse::<Expression>().map_err(|e| e.to_string())?;
        self.coordinator.set_expression(expression).await;
        Ok(format!("OK. Showing '{expression}'."))
    }

    #[tool(description = "Switch Mint's LEDs to a preset effect, or turn them off.")]
    pub async fn mint_led(&self, args: Parameters<LedArgs>) -> Result<String, String> {
        info!(args = ?args.0, "Executing tool 'mint_led'");
        let effect = args.0.effect.parse::<LightEffectId>().map_err(|e| e.to_string())?;
        self.coordinator.set_light(effect).await;
        if effect == LightEffectId::Off {
            Ok("OK. Lights off.".to_string())
        } else {
            Ok(format!("OK. Lights set to '{effect}'."))
        }
    }

    #[tool(description = "Set Mint's LEDs to a custom RGB color when no preset fits.")]
    pub async fn mint_led_color(&self, args: Parameters<LedColorArgs>) -> Result<String, String> {
        info!(args = ?args.0, "Executing tool 'mint_led_color'");
        let mode = match args.0.mode.as_deref() {
            Some(mode) => mode.parse::<LightMode>().map_err(|e| e.to_string())?,
            None => LightMode::Breathing,
        };
        let color = Rgb::saturating(args.0.r, args.0.g, args.0.b);
        self.coordinator.bridge().set_led_color(color, mode).await;
        Ok(format!(
            "OK. Lights set to RGB({},{},{}) in {} mode.",
            color.0,
            color.1,
            color.2,
            mode.as_str()
        ))
    }

    #[tool(description = "Change Mint's speaker volume: set a level, step it up or down, mute or unmute.")]
    pub async fn mint_volume(&self, args: Parameters<VolumeArgs>) -> Result<String, String> {
        info!(args = ?args.0, "Executing tool 'mint_volume'");
        let VolumeArgs {
            action,
            value,
            device_id,
        } = args.0;
        let command = protocol::volume_command(&action, value.unwrap_or(50));
        self.forward(device_id.as_deref(), command).await
    }

    #[tool(description = "Report Mint's current speaker volume.")]
    pub async fn mint_get_volume(&self, args: Parameters<DeviceArgs>) -> Result<String, String> {
        info!(args = ?args.0, "Executing tool 'mint_get_volume'");
        let device = match self.target(args.0.device_id.as_deref()) {
            Ok(device) => device,
            Err(reply) => return Ok(reply),
        };
        Ok(match device.reported_property("Speaker", "volume") {
            Some(volume) => format!("The current volume is {volume}."),
            None => "Sorry, the current volume is unknown.".to_string(),
        })
    }

    #[tool(description = "Change the brightness of Mint's eye screen: set a level or step it up or down.")]
    pub async fn mint_brightness(&self, args: Parameters<BrightnessArgs>) -> Result<String, String> {
        info!(args = ?args.0, "Executing tool 'mint_brightness'");
        let BrightnessArgs {
            action,
            value,
            device_id,
        } = args.0;
        let command = protocol::brightness_command(&action, value.unwrap_or(80));
        self.forward(device_id.as_deref(), command).await
    }

    #[tool(description = "Turn Mint's eye screen on or off.")]
    pub async fn mint_screen_power(&self, args: Parameters<ScreenPowerArgs>) -> Result<String, String> {
        info!(args = ?args.0, "Executing tool 'mint_screen_power'");
        let command = protocol::screen_power_command(&args.0.power);
        self.forward(args.0.device_id.as_deref(), command).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::QueueConfig;
    use crate::testing::{RecordingSerial, recording_bridge};
    use rmcp::{
        ServiceExt,
        model::{CallToolRequestParam, CallToolResult, RawContent},
        service::{RoleClient, RunningService},
    };
    use serde_json::{Value, json};
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct Harness {
        client: RunningService<RoleClient, ()>,
        coordinator: Arc<ActionCoordinator>,
        serial: RecordingSerial,
        registry: Arc<ConnectionRegistry>,
    }

    async fn connect() -> (RunningService<RoleClient, ()>, Arc<ActionCoordinator>, RecordingSerial) {
        let h = harness().await;
        (h.client, h.coordinator, h.serial)
    }

    async fn harness() -> Harness {
        let (bridge, serial, _socket) = recording_bridge();
        let coordinator = Arc::new(ActionCoordinator::new(bridge, QueueConfig::default()));
        let registry = Arc::new(ConnectionRegistry::new());
        let service = MintToolService::new(coordinator.clone(), registry.clone());
        let (server_transport, client_transport) = tokio::io::duplex(4096);
        tokio::spawn(async move {
            if let Ok(service) = service.serve(server_transport).await {
                let _ = service.waiting().await;
            }
        });
        let client = ().serve(client_transport).await.unwrap();
        Harness {
            client,
            coordinator,
            serial,
            registry,
        }
    }

    fn plug_in(registry: &ConnectionRegistry, device_id: &str) -> (Arc<DeviceConnection>, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(8);
        let connection = Arc::new(DeviceConnection::new(device_id, tx));
        registry.register(connection.clone());
        (connection, rx)
    }

    async fn call(
        client: &RunningService<RoleClient, ()>,
        name: &'static str,
        arguments: serde_json::Value,
    ) -> CallToolResult {
        client
            .peer()
            .call_tool(CallToolRequestParam {
                name: name.into(),
                arguments: arguments.as_object().cloned(),
            })
            .await
            .unwrap()
    }

    fn text(result: CallToolResult) -> String {
        match result.content.unwrap().pop().unwrap().raw {
            RawContent::Text(t) => t.text,
            other => panic!("unexpected content {other:?}"),
        }
    }

    #[tokio::test]
    async fn lists_every_tool() {
        let (client, _, _) = connect().await;
        let mut names: Vec<String> = client
            .list_all_tools()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name.to_string())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "mint_brightness",
                "mint_emotion",
                "mint_get_volume",
                "mint_led",
                "mint_led_color",
                "mint_motion",
                "mint_screen_power",
                "mint_volume",
            ]
        );
    }

    #[tokio::test]
    async fn motion_tool_dispatches_in_background() {
        let (client, coordinator, _) = connect().await;
        let result = call(&client, "mint_motion", json!({"motion": "nod", "speed": "fast"})).await;
        assert_ne!(result.is_error, Some(true));
        assert_eq!(text(result), "OK. Playing motion 'nod'.");
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(coordinator.bridge().snapshot().motion, Motion::Nod);
    }

    #[tokio::test]
    async fn unknown_names_are_tool_errors() {
        let (client, _, serial) = connect().await;
        let result = call(&client, "mint_motion", json!({"motion": "backflip"})).await;
        assert_eq!(result.is_error, Some(true));
        assert!(text(result).contains("backflip"));

        let result = call(&client, "mint_led", json!({"effect": "disco"})).await;
        assert_eq!(result.is_error, Some(true));
        assert!(serial.frames().is_empty());
    }

    #[tokio::test]
    async fn emotion_and_led_tools_write_serial_frames() {
        let (client, _, serial) = connect().await;
        call(&client, "mint_emotion", json!({"emotion": "love"})).await;
        let result = call(&client, "mint_led", json!({"effect": "off"})).await;
        assert_eq!(text(result), "OK. Lights off.");
        let result = call(&client, "mint_led_color", json!({"r": 300, "g": -4, "b": 128})).await;
        assert_eq!(text(result), "OK. Lights set to RGB(255,0,128) in breathing mode.");
        assert_eq!(
            serial.frames(),
            vec![
                "FACE:love\n",
                "LED:off,0,255,255,50,80\n",
                "LED:breathing,255,0,128,50,80\n",
            ]
        );
    }

    #[tokio::test]
    async fn volume_tool_defaults_to_the_connected_device() {
        let h = harness().await;
        let (_conn, mut rx) = plug_in(&h.registry, "mint-01");

        let result = call(&h.client, "mint_volume", json!({"action": "set", "value": 150})).await;
        assert_ne!(result.is_error, Some(true));
        assert_eq!(text(result), "OK. Volume set to 100.");
        let frame: Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(
            frame,
            json!({
                "type": "iot",
                "commands": [{"name": "Speaker", "method": "SetVolume", "parameters": {"volume": 100}}]
            })
        );

        call(&h.client, "mint_volume", json!({"action": "mute"})).await;
        let frame: Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(frame["commands"][0]["method"], "Mute");
    }

    #[tokio::test]
    async fn offline_devices_are_reported_as_text() {
        let h = harness().await;
        let result = call(&h.client, "mint_volume", json!({"action": "up"})).await;
        assert_ne!(result.is_error, Some(true));
        assert_eq!(text(result), "Sorry, no device is connected.");

        let result = call(
            &h.client,
            "mint_screen_power",
            json!({"power": "on", "device_id": "ghost"}),
        )
        .await;
        assert_ne!(result.is_error, Some(true));
        assert_eq!(text(result), "Sorry, device 'ghost' is not connected.");

        let (_conn, rx) = plug_in(&h.registry, "mint-01");
        drop(rx);
        let result = call(&h.client, "mint_brightness", json!({"action": "down"})).await;
        assert_ne!(result.is_error, Some(true));
        assert!(text(result).starts_with("Sorry, the device is unavailable"));
    }

    #[tokio::test]
    async fn screen_tools_target_the_named_device() {
        let h = harness().await;
        let (_a, mut rx_a) = plug_in(&h.registry, "mint-a");
        let (_b, _rx_b) = plug_in(&h.registry, "mint-b");

        let result = call(
            &h.client,
            "mint_screen_power",
            json!({"power": "off", "device_id": "mint-a"}),
        )
        .await;
        assert_eq!(text(result), "OK. Screen turned off.");
        let frame: Value = serde_json::from_str(&rx_a.recv().await.unwrap()).unwrap();
        assert_eq!(frame["commands"][0], json!({"name": "Screen", "method": "TurnOff", "parameters": {}}));

        call(&h.client, "mint_brightness", json!({"action": "set", "device_id": "mint-a"})).await;
        let frame: Value = serde_json::from_str(&rx_a.recv().await.unwrap()).unwrap();
        assert_eq!(frame["commands"][0]["parameters"], json!({"brightness": 80}));
    }

    #[tokio::test]
    async fn get_volume_reads_the_last_report() {
        let h = harness().await;
        let (conn, _rx) = plug_in(&h.registry, "mint-01");

        let result = call(&h.client, "mint_get_volume", json!({})).await;
        assert_eq!(text(result), "Sorry, the current volume is unknown.");

        conn.record_states(&json!([{"name": "Speaker", "state": {"volume": 42}}]));
        let result = call(&h.client, "mint_get_volume", json!({"device_id": "mint-01"})).await;
        assert_eq!(text(result), "The current volume is 42.");
    }

    #[tokio::test]
    async fn invalid_device_actions_are_tool_errors() {
        let h = harness().await;
        let (_conn, mut rx) = plug_in(&h.registry, "mint-01");
        let result = call(&h.client, "mint_volume", json!({"action": "louder"})).await;
        assert_eq!(result.is_error, Some(true));
        assert!(text(result).contains("louder"));
        let result = call(&h.client, "mint_screen_power", json!({"power": "standby"})).await;
        assert_eq!(result.is_error, Some(true));
        assert!(rx.try_recv().is_err());
    }
}
