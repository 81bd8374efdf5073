//! Connected devices, keyed by the id each device announces on connect.

use crate::bridge::DeviceSocket;
use crate::error::{ForwardError, TransportError};
use crate::protocol::{IotCommand, SocketFrame};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

/// One live WebSocket session with a device's main controller.
#[derive(Debug)]
pub struct DeviceConnection {
    pub id: Uuid,
    pub device_id: String,
    pub connected_at: DateTime<Utc>,
    outbound: mpsc::Sender<String>,
    /// Last reported IoT state per device name, keyed in lowercase.
    reported: Mutex<HashMap<String, Map<String, Value>>>,
}

impl DeviceConnection {
    pub fn new(device_id: impl Into<String>, outbound: mpsc::Sender<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            device_id: device_id.into(),
            connected_at: Utc::now(),
            outbound,
            reported: Mutex::new(HashMap::new()),
        }
    }

    /// Merges an IoT state report of the form
    /// `[{"name": "Speaker", "state": {"volume": 60}}, ...]`.
    pub fn record_states(&self, states: &Value) {
        let Some(entries) = states.as_array() else {
            debug!(device_id = %self.device_id, "ignoring non-array IoT states");
            return;
        };
        let mut reported = self.reported.lock().unwrap_or_else(PoisonError::into_inner);
        for entry in entries {
            let (Some(name), Some(Value::Object(state))) =
                (entry.get("name").and_then(Value::as_str), entry.get("state"))
            else {
                continue;
            };
            reported
                .entry(name.to_ascii_lowercase())
                .or_default()
                .extend(state.clone());
        }
    }

    /// Last reported value of `property` on the named IoT device.
    pub fn reported_property(&self, name: &str, property: &str) -> Option<Value> {
        self.reported
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&name.to_ascii_lowercase())?
            .get(property)
            .cloned()
    }

    pub fn info(&self) -> DeviceInfo {
        DeviceInfo {
            device_id: self.device_id.clone(),
            connection_id: self.id,
            connected_at: self.connected_at,
        }
    }
}

#[async_trait]
impl DeviceSocket for DeviceConnection {
    async fn send_text(&self, text: String) -> Result<(), TransportError> {
        self.outbound
            .send(text)
            .await
            .map_err(|_| TransportError::SocketClosed)
    }

    fn is_open(&self) -> bool {
        !self.outbound.is_closed()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceInfo {
    pub device_id: String,
    pub connection_id: Uuid,
    pub connected_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<String, Arc<DeviceConnection>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a connection, returning the one it replaced for the same device.
    pub fn register(&self, connection: Arc<DeviceConnection>) -> Option<Arc<DeviceConnection>> {
        let device_id = connection.device_id.clone();
        let replaced = self
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(device_id.clone(), connection);
        match &replaced {
            Some(old) => info!(%device_id, old_connection = %old.id, "device reconnected"),
            None => info!(%device_id, "device registered"),
        }
        replaced
    }

    /// Removes the device only if `connection_id` is still its current
    /// connection. Returns whether anything was removed.
    pub fn unregister(&self, device_id: &str, connection_id: Uuid) -> bool {
        let mut connections = self
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        match connections.get(device_id) {
            Some(current) if current.id == connection_id => {
                connections.remove(device_id);
                info!(device_id, "device unregistered");
                true
            }
            Some(_) => {
                debug!(device_id, %connection_id, "stale disconnect ignored");
                false
            }
            None => false,
        }
    }

    pub fn get(&self, device_id: &str) -> Option<Arc<DeviceConnection>> {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(device_id)
            .cloned()
    }

    /// Registered device ids in sorted order.
    pub fn device_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    pub fn devices(&self) -> Vec<DeviceInfo> {
        let mut devices: Vec<DeviceInfo> = self
            .connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|c| c.info())
            .collect();
        devices.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        devices
    }

    /// The most recently connected device still registered.
    pub fn latest(&self) -> Option<Arc<DeviceConnection>> {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .max_by_key(|c| c.connected_at)
            .cloned()
    }

    pub fn is_connected(&self, device_id: &str) -> bool {
        self.get(device_id).is_some_and(|c| c.is_open())
    }

    pub fn len(&self) -> usize {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wraps `command` in an IoT envelope and queues it for the device.
    pub async fn forward(&self, device_id: &str, command: IotCommand) -> Result<(), ForwardError> {
        let connection = self
            .get(device_id)
            .ok_or_else(|| ForwardError::DeviceOffline(device_id.to_string()))?;
        let name = command.name.clone();
        let method = command.method.clone();
        let frame = SocketFrame::iot(command).to_json()?;
        connection
            .send_text(frame)
            .await
            .map_err(|_| ForwardError::SocketClosed(device_id.to_string()))?;
        info!(device_id, %name, %method, "command forwarded");
        Ok(())
    }
}
