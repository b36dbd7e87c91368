//! Server configuration, loaded from environment variables at startup.

use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration for the board server.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// When true, authentication is bypassed and requests run as a
    /// synthetic admin user.
    pub dev_mode: bool,
    /// HS256 secret for issued tokens. Required unless `dev_mode` is set;
    /// auth fails closed without it.
    pub jwt_secret: Option<String>,
    /// Token lifetime in days.
    pub jwt_ttl_days: i64,
    /// Path of the JSON data file backing the board store.
    pub data_path: PathBuf,
    /// Bound on each outbound webhook / chat delivery attempt.
    pub webhook_timeout: Duration,
}

impl Config {
    /// Build a config from environment variables, applying defaults for
    /// anything unset.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);
        let dev_mode = std::env::var("DEV_MODE")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        let jwt_secret = std::env::var("JWT_SECRET").ok().filter(|s| !s.is_empty());
        let jwt_ttl_days = std::env::var("JWT_TTL_DAYS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);
        let data_path = std::env::var("DATA_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("taskdeck.json"));
        let webhook_timeout = std::env::var("WEBHOOK_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(10));

        Self {
            host,
            port,
            dev_mode,
            jwt_secret,
            jwt_ttl_days,
            data_path,
            webhook_timeout,
        }
    }

    /// Whether requests must carry a verified token.
    pub fn auth_required(&self) -> bool {
        !self.dev_mode
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            dev_mode: false,
            jwt_secret: None,
            jwt_ttl_days: 30,
            data_path: PathBuf::from("taskdeck.json"),
            webhook_timeout: Duration::from_secs(10),
        }
    }
}
