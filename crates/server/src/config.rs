use std::time::Duration;

use easel_bridge::ReconnectConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Backend WebSocket endpoint (default: `ws://127.0.0.1:8188`).
    pub backend_ws_url: String,
    /// Backend HTTP endpoint, used for the capability resync
    /// (default: `http://127.0.0.1:8188`).
    pub backend_http_url: String,
    /// First reconnect delay in seconds (default: `1`).
    pub reconnect_initial_secs: u64,
    /// Reconnect delay ceiling in seconds (default: `30`).
    pub reconnect_max_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default                  |
    /// |---------------------------|--------------------------|
    /// | `HOST`                    | `0.0.0.0`                |
    /// | `PORT`                    | `3000`                   |
    /// | `CORS_ORIGINS`            | `http://localhost:5173`  |
    /// | `REQUEST_TIMEOUT_SECS`    | `30`                     |
    /// | `BACKEND_WS_URL`          | `ws://127.0.0.1:8188`    |
    /// | `BACKEND_HTTP_URL`        | `http://127.0.0.1:8188`  |
    /// | `RECONNECT_INITIAL_SECS`  | `1`                      |
    /// | `RECONNECT_MAX_SECS`      | `30`                     |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let backend_ws_url =
            std::env::var("BACKEND_WS_URL").unwrap_or_else(|_| "ws://127.0.0.1:8188".into());

        let backend_http_url =
            std::env::var("BACKEND_HTTP_URL").unwrap_or_else(|_| "http://127.0.0.1:8188".into());

        let reconnect_initial_secs: u64 = std::env::var("RECONNECT_INITIAL_SECS")
            .unwrap_or_else(|_| "1".into())
            .parse()
            .expect("RECONNECT_INITIAL_SECS must be a valid u64");

        let reconnect_max_secs: u64 = std::env::var("RECONNECT_MAX_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("RECONNECT_MAX_SECS must be a valid u64");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            backend_ws_url,
            backend_http_url,
            reconnect_initial_secs,
            reconnect_max_secs,
        }
    }

    /// Backoff settings for the backend bridge.
    pub fn reconnect_config(&self) -> ReconnectConfig {
        ReconnectConfig {
            initial_delay: Duration::from_secs(self.reconnect_initial_secs),
            max_delay: Duration::from_secs(self.reconnect_max_secs),
            multiplier: 2.0,
        }
    }
}
