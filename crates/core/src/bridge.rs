//! Hardware Bridge
//!
//! Owns the two device-facing channels: the WebSocket to the main controller
//! (servo frames) and the serial link to the expression controller (face and
//! LED frames). Either channel may be missing at any time. The device never
//! acknowledges a frame, so every send here is fire-and-forget: failures are
//! logged and the frame is dropped.

use crate::catalog::{
    self, Expression, LightEffect, LightEffectId, LightMode, LightSetting, Motion,
    MotionSequence, MotionSpeed, Rgb, ServoPosition,
};
use crate::error::TransportError;
use crate::protocol::{self, SocketFrame};
use crate::serial::{self, DEFAULT_BAUD_RATE, KNOWN_USB_IDS, SerialLink, SerialPortLink, UsbId};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// The live socket to a device's main controller.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceSocket: Send + Sync {
    /// Queues a text frame for the device.
    async fn send_text(&self, text: String) -> Result<(), TransportError>;

    /// Whether frames can still be delivered.
    fn is_open(&self) -> bool;
}

/// Serial settings for the expression controller.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Explicit port path. When unset the bridge searches for one.
    pub serial_port: Option<String>,
    pub baud_rate: u32,
    pub auto_detect: bool,
    pub usb_ids: Vec<UsbId>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            serial_port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            auto_detect: true,
            usb_ids: KNOWN_USB_IDS.to_vec(),
        }
    }
}

/// Last values sent on each sub-channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BridgeSnapshot {
    pub motion: Motion,
    pub expression: Expression,
    pub light: LightSetting,
    pub serial_open: bool,
    pub socket_open: bool,
}

#[derive(Debug, Clone, Copy)]
struct CurrentState {
    motion: Motion,
    expression: Expression,
    light: LightSetting,
}

pub struct HardwareBridge {
    config: BridgeConfig,
    serial: Arc<Mutex<Option<Box<dyn SerialLink>>>>,
    /// Keeps serial frames in call order while writes run off the runtime.
    serial_gate: tokio::sync::Mutex<()>,
    socket: RwLock<Option<Arc<dyn DeviceSocket>>>,
    current: Mutex<CurrentState>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl HardwareBridge {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            serial: Arc::new(Mutex::new(None)),
            serial_gate: tokio::sync::Mutex::new(()),
            socket: RwLock::new(None),
            current: Mutex::new(CurrentState {
                motion: Motion::Neutral,
                expression: Expression::Neutral,
                light: LightSetting::default(),
            }),
        }
    }

    /// Opens the configured serial port, or discovers one.
    ///
    /// Never fails: without a port the bridge runs with serial disabled.
    pub async fn initialize(&self) {
        let path = match &self.config.serial_port {
            Some(path) => Some(path.clone()),
            None if self.config.auto_detect => {
                let ids = self.config.usb_ids.clone();
                let found = tokio::task::spawn_blocking(move || serial::discover(&ids))
                    .await
                    .ok()
                    .flatten();
                match &found {
                    Some(path) => info!(port = %path, "auto-detected serial port"),
                    None => warn!("no serial port detected, expression control disabled"),
                }
                found
            }
            None => None,
        };

        if let Some(path) = path {
            let baud_rate = self.config.baud_rate;
            let opened = {
                let path = path.clone();
                tokio::task::spawn_blocking(move || SerialPortLink::open(&path, baud_rate)).await
            };
            match opened {
                Ok(Ok(link)) => self.attach_serial(Box::new(link)),
                Ok(Err(e)) => error!(port = %path, error = %e, "failed to open serial port"),
                Err(e) => error!(port = %path, error = %e, "serial open task failed"),
            }
        }
        info!("hardware bridge initialized");
    }

    /// Installs or replaces the serial link.
    pub fn attach_serial(&self, link: Box<dyn SerialLink>) {
        debug!(port = link.name(), "serial link attached");
        *lock(&self.serial) = Some(link);
    }

    /// Installs or replaces the device socket; `None` disables servo frames.
    pub fn attach_socket(&self, socket: Option<Arc<dyn DeviceSocket>>) {
        let attached = socket.is_some();
        *self.socket.write().unwrap_or_else(PoisonError::into_inner) = socket;
        debug!(attached, "device socket updated");
    }

    pub fn serial_open(&self) -> bool {
        lock(&self.serial).is_some()
    }

    pub fn socket_open(&self) -> bool {
        self.current_socket().is_some_and(|s| s.is_open())
    }

    fn current_socket(&self) -> Option<Arc<dyn DeviceSocket>> {
        self.socket
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    // --- Servo ---

    /// Plays a motion's servo sequence at the given speed.
    pub async fn send_motion(&self, motion: Motion, speed: MotionSpeed) {
        lock(&self.current).motion = motion;
        info!(%motion, ?speed, "executing motion");
        self.play_sequence(catalog::motion_sequence(motion), speed)
            .await;
    }

    /// Sends each step then waits `step_ms * speed factor`. A failed step is
    /// logged and the sequence carries on.
    pub async fn play_sequence(&self, sequence: &MotionSequence, speed: MotionSpeed) {
        let pause = Duration::from_millis((sequence.step_ms as f64 * speed.factor()).round() as u64);
        for position in sequence.positions {
            if let Err(e) = self.send_servo(*position).await {
                match e {
                    TransportError::SocketUnavailable => {
                        debug!("no device socket, servo frame dropped")
                    }
                    e => error!(error = %e, "failed to send servo frame"),
                }
            }
            tokio::time::sleep(pause).await;
        }
    }

    /// Moves the head to a single position, clamped to the servo range.
    pub async fn set_servo_position(&self, pitch: i32, yaw: i32) {
        if let Err(e) = self.send_servo(ServoPosition::new(pitch, yaw)).await {
            debug!(error = %e, "servo frame dropped");
        }
    }

    async fn send_servo(&self, position: ServoPosition) -> Result<(), TransportError> {
        let socket = self
            .current_socket()
            .filter(|s| s.is_open())
            .ok_or(TransportError::SocketUnavailable)?;
        let frame = SocketFrame::servo(position);
        socket.send_text(frame.to_json()?).await?;
        if let SocketFrame::Servo { pitch, yaw } = frame {
            debug!(pitch, yaw, "servo frame sent");
        }
        Ok(())
    }

    // --- Expression ---

    pub async fn set_expression(&self, expression: Expression) {
        if !expression.is_animation() {
            lock(&self.current).expression = expression;
        }
        info!(%expression, "setting expression");
        self.write_serial(protocol::expression_frame(expression))
            .await;
    }

    // --- LED ---

    pub async fn set_light(&self, light: LightSetting) {
        lock(&self.current).light = light;
        info!(%light, "setting light");
        self.write_serial(protocol::light_frame(light.effect()))
            .await;
    }

    /// Custom color at the default speed and brightness.
    pub async fn set_led_color(&self, color: Rgb, mode: LightMode) {
        self.set_light(LightSetting::Custom(LightEffect::new(mode, color)))
            .await;
    }

    pub async fn turn_off_led(&self) {
        self.set_light(LightEffectId::Off.into()).await;
    }

    /// Writes on the blocking pool; a port write may stall for up to the
    /// port timeout.
    async fn write_serial(&self, frame: String) {
        let _gate = self.serial_gate.lock().await;
        let serial = Arc::clone(&self.serial);
        let written = tokio::task::spawn_blocking(move || {
            let mut serial = lock(&serial);
            let Some(link) = serial.as_mut() else {
                debug!(frame = frame.trim_end(), "serial not connected, frame dropped");
                return;
            };
            match link.write_frame(frame.as_bytes()) {
                Ok(()) => debug!(frame = frame.trim_end(), "serial frame sent"),
                Err(e) => error!(port = link.name(), error = %e, "failed to write serial frame"),
            }
        })
        .await;
        if let Err(e) = written {
            error!(error = %e, "serial write task failed");
        }
    }

    // --- Compound ---

    /// Neutral head, neutral face, cyan breathing light.
    pub async fn reset_to_idle(&self) {
        tokio::join!(
            self.send_motion(Motion::Neutral, MotionSpeed::Normal),
            self.set_expression(Expression::Neutral),
            self.set_light(LightEffectId::BreathingCyan.into()),
        );
    }

    pub fn snapshot(&self) -> BridgeSnapshot {
        let current = *lock(&self.current);
        BridgeSnapshot {
            motion: current.motion,
            expression: current.expression,
            light: current.light,
            serial_open: self.serial_open(),
            socket_open: self.socket_open(),
        }
    }

    /// Releases the serial port and forgets the socket. Safe to repeat.
    pub fn close(&self) {
        if let Some(link) = lock(&self.serial).take() {
            info!(port = link.name(), "serial port closed");
        }
        self.attach_socket(None);
        info!("hardware bridge closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingSocket, recording_bridge};
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn motion_sends_every_step_with_paced_delays() {
        let (bridge, _serial, socket) = recording_bridge();
        let started = Instant::now();
        bridge.send_motion(Motion::Nod, MotionSpeed::Normal).await;
        assert_eq!(started.elapsed(), Duration::from_millis(600));
        assert_eq!(
            socket.frames(),
            vec![
                r#"{"type":"servo","pitch":-20,"yaw":0}"#,
                r#"{"type":"servo","pitch":0,"yaw":0}"#,
                r#"{"type":"servo","pitch":-20,"yaw":0}"#,
                r#"{"type":"servo","pitch":0,"yaw":0}"#,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn speed_scales_step_duration() {
        let (bridge, _serial, _socket) = recording_bridge();
        let started = Instant::now();
        bridge.send_motion(Motion::Shy, MotionSpeed::Slow).await;
        assert_eq!(started.elapsed(), Duration::from_millis(600));

        let started = Instant::now();
        bridge.send_motion(Motion::Shy, MotionSpeed::Fast).await;
        assert_eq!(started.elapsed(), Duration::from_millis(240));
    }

    #[tokio::test(start_paused = true)]
    async fn out_of_range_positions_are_clamped() {
        static WILD: MotionSequence = MotionSequence {
            positions: &[
                ServoPosition { pitch: 80, yaw: -120 },
                ServoPosition { pitch: -31, yaw: 46 },
            ],
            step_ms: 10,
        };
        let (bridge, _serial, socket) = recording_bridge();
        bridge.play_sequence(&WILD, MotionSpeed::Normal).await;
        assert_eq!(
            socket.frames(),
            vec![
                r#"{"type":"servo","pitch":30,"yaw":-45}"#,
                r#"{"type":"servo","pitch":-30,"yaw":45}"#,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failed_sends_do_not_abort_the_sequence() {
        let mut socket = MockDeviceSocket::new();
        socket.expect_is_open().return_const(true);
        socket
            .expect_send_text()
            .times(5)
            .returning(|_| Err(TransportError::SocketClosed));

        let bridge = HardwareBridge::new(BridgeConfig::default());
        bridge.attach_socket(Some(Arc::new(socket)));
        let started = Instant::now();
        bridge.send_motion(Motion::Shake, MotionSpeed::Normal).await;
        assert_eq!(started.elapsed(), Duration::from_millis(600));
    }

    #[tokio::test(start_paused = true)]
    async fn closed_socket_is_skipped() {
        let (bridge, _serial, socket) = recording_bridge();
        socket.close();
        bridge.send_motion(Motion::LookUp, MotionSpeed::Normal).await;
        assert!(socket.frames().is_empty());
        assert!(!bridge.socket_open());
    }

    #[tokio::test]
    async fn expression_and_light_frames_go_to_serial() {
        let (bridge, serial, _socket) = recording_bridge();
        bridge.set_expression(Expression::Sad).await;
        bridge.set_expression(Expression::Wink).await;
        bridge.set_light(LightEffectId::BlinkRed.into()).await;
        bridge.set_led_color(Rgb(10, 20, 30), LightMode::Solid).await;
        bridge.turn_off_led().await;
        assert_eq!(
            serial.frames(),
            vec![
                "FACE:sad\n",
                "ANIM:wink\n",
                "LED:blink,255,0,0,50,80\n",
                "LED:solid,10,20,30,50,80\n",
                "LED:off,0,255,255,50,80\n",
            ]
        );
        let snapshot = bridge.snapshot();
        assert_eq!(snapshot.expression, Expression::Sad);
        assert_eq!(snapshot.light, LightSetting::Preset(LightEffectId::Off));
    }

    #[tokio::test]
    async fn missing_channels_are_silent() {
        let bridge = HardwareBridge::new(BridgeConfig {
            auto_detect: false,
            ..BridgeConfig::default()
        });
        bridge.initialize().await;
        assert!(!bridge.serial_open());
        bridge.set_expression(Expression::Happy).await;
        bridge.set_light(LightEffectId::Rainbow.into()).await;
        bridge.set_servo_position(10, 10).await;
        assert_eq!(bridge.snapshot().expression, Expression::Happy);
    }

    #[tokio::test]
    async fn unopenable_configured_port_is_not_fatal() {
        let bridge = HardwareBridge::new(BridgeConfig {
            serial_port: Some("/dev/definitely-not-a-port".to_string()),
            ..BridgeConfig::default()
        });
        bridge.initialize().await;
        assert!(!bridge.serial_open());
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let (bridge, _serial, _socket) = recording_bridge();
        assert!(bridge.serial_open());
        assert!(bridge.socket_open());
        bridge.close();
        bridge.close();
        assert!(!bridge.serial_open());
        assert!(!bridge.socket_open());

        let fresh = HardwareBridge::new(BridgeConfig::default());
        fresh.close();
    }

    #[tokio::test]
    async fn replacing_the_socket_redirects_frames() {
        let (bridge, _serial, first) = recording_bridge();
        let second = Arc::new(RecordingSocket::default());
        bridge.attach_socket(Some(second.clone()));
        bridge.set_servo_position(1, 2).await;
        assert!(first.frames().is_empty());
        assert_eq!(second.frames(), vec![r#"{"type":"servo","pitch":1,"yaw":2}"#]);
    }

    struct StallingSerial {
        frames: Arc<Mutex<Vec<String>>>,
        stall: Duration,
    }

    impl SerialLink for StallingSerial {
        fn write_frame(&mut self, frame: &[u8]) -> std::io::Result<()> {
            std::thread::sleep(self.stall);
            self.frames
                .lock()
                .unwrap()
                .push(String::from_utf8_lossy(frame).into_owned());
            Ok(())
        }

        fn name(&self) -> &str {
            "stalling"
        }
    }

    #[tokio::test]
    async fn slow_serial_write_does_not_stall_the_runtime() {
        let (bridge, _serial, _socket) = recording_bridge();
        let frames = Arc::new(Mutex::new(Vec::new()));
        bridge.attach_serial(Box::new(StallingSerial {
            frames: frames.clone(),
            stall: Duration::from_millis(300),
        }));

        let writer = {
            let bridge = bridge.clone();
            tokio::spawn(async move { bridge.set_expression(Expression::Happy).await })
        };
        // Single-threaded runtime: this timer only fires on time if the
        // write runs elsewhere.
        let started = std::time::Instant::now();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(started.elapsed() < Duration::from_millis(250));
        assert!(frames.lock().unwrap().is_empty());

        writer.await.unwrap();
        assert_eq!(*frames.lock().unwrap(), vec!["FACE:happy\n"]);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_serial_writes_keep_call_order() {
        let (bridge, serial, _socket) = recording_bridge();
        tokio::join!(
            bridge.set_expression(Expression::Love),
            bridge.set_light(LightEffectId::SolidWhite.into()),
            bridge.set_expression(Expression::Blink),
        );
        assert_eq!(
            serial.frames(),
            vec!["FACE:love\n", "LED:solid,255,255,255,50,80\n", "ANIM:blink\n"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn reset_to_idle_centers_head_and_calms_face_and_lights() {
        let (bridge, serial, socket) = recording_bridge();
        bridge.send_motion(Motion::LookLeft, MotionSpeed::Fast).await;
        bridge.set_expression(Expression::Angry).await;
        bridge.reset_to_idle().await;

        assert_eq!(
            socket.frames().last().map(String::as_str),
            Some(r#"{"type":"servo","pitch":0,"yaw":0}"#)
        );
        assert_eq!(
            serial.frames()[1..],
            ["FACE:neutral\n", "LED:breathing,0,255,255,50,80\n"]
        );
        let snapshot = bridge.snapshot();
        assert_eq!(snapshot.motion, Motion::Neutral);
        assert_eq!(snapshot.expression, Expression::Neutral);
        assert_eq!(snapshot.light, LightSetting::Preset(LightEffectId::BreathingCyan));
    }
}
