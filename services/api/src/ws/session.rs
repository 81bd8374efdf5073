//! Manages the WebSocket connection lifecycle for a device.

use super::protocol::{DeviceMessage, ServerMessage};
use crate::{models::ControlResponse, state::AppState};
use anyhow::Result;
use axum::{
    Json,
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use mint_core::{DeviceConnection, bridge::DeviceSocket};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

/// Frames queued for a device before senders start waiting.
const OUTBOUND_BUFFER: usize = 64;

#[derive(Deserialize, Debug, Default)]
pub struct DeviceQuery {
    device_id: Option<String>,
}

/// Axum handler to upgrade a device's HTTP connection to a WebSocket.
///
/// The device identifies itself with a `device-id` header, or a `device_id`
/// query parameter when it cannot set headers.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    Query(query): Query<DeviceQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let device_id = headers
        .get("device-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or(query.device_id)
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty());

    let Some(device_id) = device_id else {
        warn!("device connection rejected: no device id");
        return (
            StatusCode::BAD_REQUEST,
            Json(ControlResponse::failed("device-id header is required")),
        )
            .into_response();
    };
    ws.on_upgrade(move |socket| handle_socket(socket, state, device_id))
}

#[instrument(name = "device_session", skip(socket, state), fields(connection_id))]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>, device_id: String) {
    let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_BUFFER);
    let connection = Arc::new(DeviceConnection::new(device_id.clone(), outbound_tx));
    tracing::Span::current().record("connection_id", tracing::field::display(connection.id));

    state.registry.register(connection.clone());
    state
        .coordinator
        .bridge()
        .attach_socket(Some(connection.clone() as Arc<dyn DeviceSocket>));
    info!("Device connected.");

    if let Err(e) = run_device_session(socket, &connection, outbound_rx).await {
        warn!(error = ?e, "Device session ended with error.");
    }

    state.registry.unregister(&device_id, connection.id);
    let next = state
        .registry
        .latest()
        .map(|c| c as Arc<dyn DeviceSocket>);
    state.coordinator.bridge().attach_socket(next);
    info!("Device disconnected.");
}

/// Pumps queued frames to the device and reads its reports until either
/// side closes.
async fn run_device_session(
    socket: WebSocket,
    connection: &DeviceConnection,
    mut outbound_rx: mpsc::Receiver<String>,
) -> Result<()> {
    let (mut socket_tx, mut socket_rx) = socket.split();
    loop {
        tokio::select! {
            Some(frame) = outbound_rx.recv() => {
                socket_tx.send(Message::Text(frame.into())).await?;
            }
            msg = socket_rx.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    handle_device_message(&mut socket_tx, connection, text.as_str()).await?;
                }
                Some(Ok(Message::Binary(data))) => {
                    debug!(bytes = data.len(), "ignoring binary frame");
                }
                Some(Ok(Message::Close(_))) | None => {
                    info!("Device closed the connection.");
                    return Ok(());
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                Some(Err(e)) => return Err(e.into()),
            },
        }
    }
}

async fn handle_device_message(
    socket_tx: &mut SplitSink<WebSocket, Message>,
    connection: &DeviceConnection,
    text: &str,
) -> Result<()> {
    match serde_json::from_str::<DeviceMessage>(text) {
        Ok(DeviceMessage::Hello { version }) => {
            info!(?version, "Device hello received.");
            let reply = ServerMessage::Hello {
                transport: "websocket",
                session_id: connection.id,
            };
            socket_tx
                .send(Message::Text(serde_json::to_string(&reply)?.into()))
                .await?;
        }
        Ok(DeviceMessage::Listen { state, text }) => {
            debug!(%state, ?text, "Device listen state.");
        }
        Ok(DeviceMessage::Iot { descriptors, states }) => {
            debug!(
                has_descriptors = descriptors.is_some(),
                has_states = states.is_some(),
                "Device IoT report."
            );
            if let Some(states) = states {
                connection.record_states(&states);
            }
        }
        Ok(DeviceMessage::Other) => debug!(%text, "Unhandled device message."),
        Err(e) => debug!(error = %e, %text, "Undecodable device message."),
    }
    Ok(())
}
