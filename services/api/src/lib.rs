//! Mint API Library Crate
//!
//! This library contains the web-facing half of the Mint robot service: the
//! application state, API handlers, API-key middleware, the device WebSocket
//! endpoint, the hosted MCP tools, and routing. The `api` binary is a thin wrapper around this library.

pub mod auth;
pub mod config;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
pub mod tools;
pub mod ws;
