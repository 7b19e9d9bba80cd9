use std::env;
use std::time::Duration;
use log::warn;

// Server Configuration
pub const DEFAULT_API_BIND_ADDRESS: &str = "127.0.0.1:3001";
pub const DEFAULT_WS_BIND_ADDRESS: &str = "127.0.0.1:3002";
pub const DEFAULT_FEED_INTERVAL_MS: u64 = 1000;
pub const STATS_INTERVAL_SECS: u64 = 60;

// JWT Configuration
pub const DEFAULT_JWT_SECRET: &str = "your-secret-key-change-in-production";
pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;

// Logging Configuration (RUST_LOG overrides)
pub const DEFAULT_LOG_LEVEL: &str = "info";

// Broadcast Configuration
pub const BROADCAST_CHANNEL_SIZE: usize = 100;

pub struct Config {
    pub api_bind_address: String,
    pub ws_bind_address: String,
    pub jwt_secret: String,
    pub store_path: Option<String>,
    pub feed_interval_ms: u64,
    pub token_ttl_hours: i64,
    pub log_level: String,
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} has an invalid value '{}', using default", key, raw);
            default
        }),
        Err(_) => default,
    }
}

impl Config {
    pub fn from_env() -> Self {
        // PORT is what most hosting platforms hand out
        let api_bind_address = env::var("API_BIND_ADDRESS")
            .or_else(|_| env::var("PORT").map(|port| format!("0.0.0.0:{}", port)))
            .unwrap_or_else(|_| DEFAULT_API_BIND_ADDRESS.to_string());

        Self {
            api_bind_address,
            ws_bind_address: env::var("WS_BIND_ADDRESS")
                .unwrap_or_else(|_| DEFAULT_WS_BIND_ADDRESS.to_string()),
            jwt_secret: env::var("JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("JWT_SECRET not set, using default (NOT for production!)");
                    DEFAULT_JWT_SECRET.to_string()
                }),
            store_path: env::var("STORE_PATH").ok().filter(|path| !path.trim().is_empty()),
            feed_interval_ms: parse_or("FEED_INTERVAL_MS", DEFAULT_FEED_INTERVAL_MS),
            token_ttl_hours: parse_or("TOKEN_TTL_HOURS", DEFAULT_TOKEN_TTL_HOURS),
            log_level: env::var("RUST_LOG")
                .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string()),
        }
    }

    pub fn feed_interval(&self) -> Duration {
        Duration::from_millis(self.feed_interval_ms)
    }

    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.token_ttl_hours)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.jwt_secret == DEFAULT_JWT_SECRET {
            warn!("Using default JWT secret - change for production!");
        }

        if self.jwt_secret.len() < 32 {
            return Err("JWT secret should be at least 32 characters long".to_string());
        }

        if self.feed_interval_ms == 0 {
            return Err("FEED_INTERVAL_MS must be greater than 0".to_string());
        }

        if self.token_ttl_hours <= 0 {
            return Err("TOKEN_TTL_HOURS must be greater than 0".to_string());
        }

        if self.api_bind_address == self.ws_bind_address {
            return Err(format!("API and WebSocket servers cannot share {}", self.api_bind_address));
        }

        Ok(())
    }

    pub fn log_config(&self) {
        println!("Server Configuration:");
        println!("  API Bind Address: {}", self.api_bind_address);
        println!("  WebSocket Bind Address: {}", self.ws_bind_address);
        println!("  Store: {}", self.store_path.as_deref().unwrap_or("in-memory"));
        println!("  Feed Interval: {}ms", self.feed_interval_ms);
        println!("  Token TTL: {}h", self.token_ttl_hours);
        println!("  Log Level: {}", self.log_level);
        println!("  JWT Secret: {}***", &self.jwt_secret[..4.min(self.jwt_secret.len())]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            api_bind_address: DEFAULT_API_BIND_ADDRESS.to_string(),
            ws_bind_address: DEFAULT_WS_BIND_ADDRESS.to_string(),
            jwt_secret: "a".repeat(32),
            store_path: None,
            feed_interval_ms: DEFAULT_FEED_INTERVAL_MS,
            token_ttl_hours: DEFAULT_TOKEN_TTL_HOURS,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }

    #[test]
    fn test_config_from_env() {
        let config = Config::from_env();
        assert!(!config.api_bind_address.is_empty());
        assert!(!config.ws_bind_address.is_empty());
        assert!(!config.jwt_secret.is_empty());
    }

    #[test]
    fn test_config_validation() {
        let mut config = valid_config();
        assert!(config.validate().is_ok());

        config.jwt_secret = "short".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut config = valid_config();
        config.feed_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_shared_bind_address_rejected() {
        let mut config = valid_config();
        config.ws_bind_address = config.api_bind_address.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_feed_interval_is_one_second() {
        assert_eq!(valid_config().feed_interval(), Duration::from_secs(1));
    }
}
