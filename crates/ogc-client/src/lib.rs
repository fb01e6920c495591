//! Resilient client for OGC API services.
//!
//! Layers, leaves first:
//! - [`error`]: `ApiError`, the only error crossing operation boundaries
//! - [`http`]: single-shot HTTP primitive, bearer decoration, response helpers
//! - [`retry`]: bounded retry on 408 / >500
//! - [`client`]: the OGC domain operations built on the layers above
//!
//! Inbound authentication and the MCP tool surface live in `ogc-mcp-backend`.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod retry;

pub use client::{ItemsQuery, JobStatus, OgcApiClient, PositionQuery, RecordSearch};
pub use config::{AppConfig, ServiceEndpoint, load_config, read_config};
pub use error::{ApiError, ConfigError, TransportError};
pub use retry::RetryPolicy;
