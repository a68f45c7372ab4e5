/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Interval between heartbeat broadcasts in seconds (default: `30`).
    pub heartbeat_interval_secs: u64,
    /// Per-channel delivery deadline in milliseconds (default: `2000`).
    pub delivery_timeout_ms: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                      | Default                 |
    /// |------------------------------|-------------------------|
    /// | `HOST`                       | `0.0.0.0`               |
    /// | `PORT`                       | `8000`                  |
    /// | `CORS_ORIGINS`               | `http://localhost:3000` |
    /// | `REQUEST_TIMEOUT_SECS`       | `30`                    |
    /// | `WS_HEARTBEAT_INTERVAL_SECS` | `30`                    |
    /// | `WS_DELIVERY_TIMEOUT_MS`     | `2000`                  |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "8000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let heartbeat_interval_secs: u64 = std::env::var("WS_HEARTBEAT_INTERVAL_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("WS_HEARTBEAT_INTERVAL_SECS must be a valid u64");
        assert!(
            heartbeat_interval_secs > 0,
            "WS_HEARTBEAT_INTERVAL_SECS must be greater than zero"
        );

        let delivery_timeout_ms: u64 = std::env::var("WS_DELIVERY_TIMEOUT_MS")
            .unwrap_or_else(|_| "2000".into())
            .parse()
            .expect("WS_DELIVERY_TIMEOUT_MS must be a valid u64");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            heartbeat_interval_secs,
            delivery_timeout_ms,
        }
    }
}
