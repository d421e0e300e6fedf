use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// Empty means the in-memory stores are used.
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    /// Upper bound on the booking check-then-write critical section.
    #[serde(default = "default_lock_wait_ms")]
    pub booking_lock_wait_ms: u64,
    /// Upper bound on a single push delivery attempt.
    #[serde(default = "default_push_timeout_ms")]
    pub push_send_timeout_ms: u64,
}

fn default_lock_wait_ms() -> u64 {
    2000
}

fn default_push_timeout_ms() -> u64 {
    3000
}

impl Default for BusinessRules {
    fn default() -> Self {
        Self {
            booking_lock_wait_ms: default_lock_wait_ms(),
            push_send_timeout_ms: default_push_timeout_ms(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(config::File::with_name("config/default"))
            // Add in the current environment file (optional)
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Environment overrides, e.g. `RYDE__SERVER__PORT=9000`
            .add_source(config::Environment::with_prefix("RYDE").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
