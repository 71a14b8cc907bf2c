//! synapse: linguistic steering backend
//!
//! An XY control pad steers the system prompt and sampling temperature sent
//! to an LLM; output streams back token-by-token over SSE and is persisted
//! as an artifact on completion.

pub mod artifacts;
pub mod client;
pub mod config;
pub mod cost;
pub mod error;
pub mod models;
pub mod registry;
pub mod relay;
pub mod roster;
pub mod server;
pub mod steering;

pub use error::{Error, GatewayError, Result};
