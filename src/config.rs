//! Configuration from environment variables
//!
//! OPENROUTER_API_KEY     - upstream API key (required for live generation)
//! SYNAPSE_MODEL          - model id (default: google/gemini-flash-1.5)
//! SYNAPSE_ARTIFACT_DIR   - artifact storage (default: XDG data dir)
//! PORT                   - listen port (default: 8000)

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

const APP_NAME: &str = "synapse";

pub const DEFAULT_MODEL: &str = "google/gemini-flash-1.5";
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 2048;
pub const DEFAULT_STALL_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_EXECUTION_CAP: usize = 256;

/// Default artifact directory (~/.local/share/synapse/artifacts)
pub fn default_artifact_dir() -> Result<PathBuf> {
    let base = dirs::data_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".local/share")))
        .context("Could not determine data directory")?;
    Ok(base.join(APP_NAME).join("artifacts"))
}

/// Runtime configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// OpenRouter API key. Absent means execute/roster calls fail upstream.
    pub api_key: Option<String>,
    /// Model id on the upstream provider.
    pub model: String,
    /// Cap on generated tokens per execution.
    pub max_output_tokens: u32,
    /// Listen port for the HTTP server.
    pub port: u16,
    /// Where completed artifacts are written.
    pub artifact_dir: PathBuf,
    /// Force-fail an execution after this long with no forward progress.
    pub stall_timeout: Duration,
    /// Retained executions before oldest terminal entries are evicted.
    pub execution_cap: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let artifact_dir = match env::var("SYNAPSE_ARTIFACT_DIR") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => default_artifact_dir()?,
        };

        let stall_secs = env::var("SYNAPSE_STALL_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_STALL_TIMEOUT_SECS);

        Ok(Self {
            api_key: env::var("OPENROUTER_API_KEY").ok(),
            model: env::var("SYNAPSE_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into()),
            max_output_tokens: env::var("SYNAPSE_MAX_OUTPUT_TOKENS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_MAX_OUTPUT_TOKENS),
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8000),
            artifact_dir,
            stall_timeout: Duration::from_secs(stall_secs),
            execution_cap: env::var("SYNAPSE_EXECUTION_CAP")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_EXECUTION_CAP),
        })
    }

    /// API key or a validation error with a hint for the operator.
    pub fn require_api_key(&self) -> crate::Result<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            crate::Error::Validation("OPENROUTER_API_KEY is not configured".into())
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.into(),
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            port: 8000,
            artifact_dir: PathBuf::from("./storage/artifacts"),
            stall_timeout: Duration::from_secs(DEFAULT_STALL_TIMEOUT_SECS),
            execution_cap: DEFAULT_EXECUTION_CAP,
        }
    }
}
