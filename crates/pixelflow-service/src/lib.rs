//! pixelflow service - JSON requests over the pixelflow core
//!
//! This crate wraps `pixelflow-core` for callers that speak JSON: request
//! parsing that tolerates the loose step shapes clients send, status
//! envelopes for every response, the capabilities listing, TOML
//! configuration and tracing setup. The `pixelflow` binary drives it from
//! files or stdin.
//!
//! # Module Structure
//!
//! - `config` - `ServiceConfig` loaded from TOML
//! - `dto` - request and response wire types
//! - `capabilities` - the registry as a JSON listing
//! - `service` - `ImageService` request handlers
//! - `logging` - stderr tracing subscriber
//!
//! # Usage
//!
//! ```ignore
//! use pixelflow_service::{ImageService, ServiceConfig};
//! use pixelflow_core::MemoryStore;
//!
//! let service = ImageService::new(&ServiceConfig::default(), MemoryStore::new());
//! let reply = service.handle_json(serde_json::json!({"command": "health"}));
//! assert!(reply.is_success());
//! ```

pub mod capabilities;
pub mod config;
pub mod dto;
pub mod logging;
pub mod service;

pub use capabilities::Capabilities;
pub use config::{ConfigError, ServiceConfig};
pub use dto::{Envelope, ErrorBody, ProcessRequest, Request, StepDto};
pub use service::{ImageService, Reply};
