//! Device WebSocket
//!
//! The robot's main controller keeps one WebSocket open to the server. It is
//! registered in the connection registry for IoT forwarding and attached to
//! the hardware bridge as the live servo channel.
//!
//! - `protocol`: handshake and device report messages.
//! - `session`: connection lifecycle, from upgrade to unregistration.

pub mod protocol;
pub mod session;

pub use session::ws_handler;
