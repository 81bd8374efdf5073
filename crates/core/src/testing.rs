//! Recording fakes for the device channels.

use crate::bridge::{BridgeConfig, DeviceSocket, HardwareBridge};
use crate::error::TransportError;
use crate::serial::SerialLink;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
pub struct RecordingSerial {
    frames: Arc<Mutex<Vec<String>>>,
}

impl RecordingSerial {
    pub fn frames(&self) -> Vec<String> {
        self.frames.lock().unwrap().clone()
    }
}

impl SerialLink for RecordingSerial {
    fn write_frame(&mut self, frame: &[u8]) -> std::io::Result<()> {
        self.frames
            .lock()
            .unwrap()
            .push(String::from_utf8_lossy(frame).into_owned());
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

pub struct RecordingSocket {
    frames: Mutex<Vec<String>>,
    open: AtomicBool,
}

impl Default for RecordingSocket {
    fn default() -> Self {
        Self {
            frames: Mutex::new(Vec::new()),
            open: AtomicBool::new(true),
        }
    }
}

impl RecordingSocket {
    pub fn frames(&self) -> Vec<String> {
        self.frames.lock().unwrap().clone()
    }

    pub fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl DeviceSocket for RecordingSocket {
    async fn send_text(&self, text: String) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::SocketClosed);
        }
        self.frames.lock().unwrap().push(text);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

/// A bridge wired to a recording serial link and socket.
pub fn recording_bridge() -> (Arc<HardwareBridge>, RecordingSerial, Arc<RecordingSocket>) {
    let bridge = HardwareBridge::new(BridgeConfig {
        auto_detect: false,
        ..BridgeConfig::default()
    });
    let serial = RecordingSerial::default();
    let socket = Arc::new(RecordingSocket::default());
    bridge.attach_serial(Box::new(serial.clone()));
    bridge.attach_socket(Some(socket.clone()));
    (Arc::new(bridge), serial, socket)
}
