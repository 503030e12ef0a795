//! Configuration management
//!
//! All configurable parameters in one place with environment variable
//! overrides. Sensible defaults for local development, configurable in
//! production.

use std::env;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::constants::DEFAULT_MAX_CONTENT_LENGTH;

/// Server configuration loaded from environment with defaults
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server host address (default: 127.0.0.1)
    pub host: String,

    /// Server port (default: 7474)
    pub port: u16,

    /// Base directory for RocksDB storage (default: ./graphmind_data)
    pub data_dir: PathBuf,

    /// Bearer token checked on every protected endpoint
    pub auth_token: String,

    /// Cap on total byte size of one ingestion payload
    pub max_content_length: u64,

    /// Per-request timeout for content fetching, in seconds
    pub fetch_timeout_secs: u64,

    /// Maximum concurrent in-flight HTTP requests
    pub max_concurrent_requests: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7474,
            data_dir: PathBuf::from("./graphmind_data"),
            auth_token: "graphmind-dev-token-change-in-production".to_string(),
            max_content_length: DEFAULT_MAX_CONTENT_LENGTH,
            fetch_timeout_secs: 30,
            max_concurrent_requests: 64,
        }
    }
}

impl ServerConfig {
    /// Load from environment variables, falling back to defaults.
    ///
    /// Refuses the default token in production mode (GRAPHMIND_ENV).
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Ok(host) = env::var("GRAPHMIND_HOST") {
            config.host = host;
        }

        if let Ok(port) = env::var("GRAPHMIND_PORT") {
            config.port = port
                .parse()
                .map_err(|_| anyhow::anyhow!("GRAPHMIND_PORT must be a valid port number"))?;
        }

        if let Ok(dir) = env::var("GRAPHMIND_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }

        let is_production = env::var("GRAPHMIND_ENV")
            .map(|v| {
                let v = v.to_lowercase();
                v == "production" || v == "prod"
            })
            .unwrap_or(false);

        match env::var("GRAPHMIND_AUTH_TOKEN") {
            Ok(token) if !token.trim().is_empty() => config.auth_token = token,
            _ => {
                if is_production {
                    anyhow::bail!("GRAPHMIND_AUTH_TOKEN must be set in production mode");
                }
                warn!("GRAPHMIND_AUTH_TOKEN not set - using development token (not for production!)");
            }
        }

        if let Ok(val) = env::var("GRAPHMIND_MAX_CONTENT_LENGTH") {
            if let Ok(n) = val.parse() {
                config.max_content_length = n;
            }
        }

        if let Ok(val) = env::var("GRAPHMIND_FETCH_TIMEOUT_SECS") {
            if let Ok(n) = val.parse() {
                config.fetch_timeout_secs = n;
            }
        }

        if let Ok(val) = env::var("GRAPHMIND_MAX_CONCURRENT_REQUESTS") {
            if let Ok(n) = val.parse::<usize>() {
                if n > 0 {
                    config.max_concurrent_requests = n;
                }
            }
        }

        Ok(config)
    }

    /// Log the effective configuration at startup (token excluded).
    pub fn log_summary(&self) {
        info!(
            host = %self.host,
            port = self.port,
            data_dir = %self.data_dir.display(),
            max_content_length = self.max_content_length,
            fetch_timeout_secs = self.fetch_timeout_secs,
            max_concurrent_requests = self.max_concurrent_requests,
            "Server configuration loaded"
        );
    }
}
