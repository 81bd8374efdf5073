//! Mint core: turns language-model output into coordinated robot behavior.
//!
//! Model text is parsed into an [`ActionCommand`], queued on the
//! [`ActionCoordinator`] and played through the [`HardwareBridge`], which
//! fans each action out to the head servos (device WebSocket) and the face
//! and LED controller (serial).

pub mod action;
pub mod bridge;
pub mod catalog;
pub mod coordinator;
pub mod error;
pub mod parser;
pub mod protocol;
pub mod registry;
pub mod serial;
pub mod tools;

#[cfg(test)]
mod testing;

pub use action::ActionCommand;
pub use bridge::{BridgeConfig, DeviceSocket, HardwareBridge};
pub use coordinator::{ActionCoordinator, ActionHooks, DropPolicy, QueueConfig};
pub use parser::ActionParser;
pub use registry::{ConnectionRegistry, DeviceConnection};
