//! MCP backend exposing OGC API - Processes operations as bearer-authenticated tools.

pub mod app;
pub mod auth;
pub mod tools;

pub use auth::{AuthRejection, BearerGate};
pub use tools::{OgcTools, ToolServices};
