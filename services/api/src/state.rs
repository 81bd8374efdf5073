//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds the device registry,
//! the action coordinator and the hosted tool service.

use crate::tools::ToolGateway;
use mint_core::{ActionCoordinator, ConnectionRegistry};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ConnectionRegistry>,
    pub coordinator: Arc<ActionCoordinator>,
    pub tools: Arc<ToolGateway>,
    /// Key required on `/api/v1` routes; `None` disables the check.
    pub api_key: Option<Arc<String>>,
}
