use serde::{Deserialize, Serialize};
use std::env;

pub const DEV_JWT_SECRET: &str = "your-secret-key-change-in-production";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub redis: RedisConfig,
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub api_port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Redis,
    Memory,
}

impl StoreBackend {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "redis" => Some(StoreBackend::Redis),
            "memory" | "mem" => Some(StoreBackend::Memory),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub rebuild_indexes_on_start: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl_days: u64,
    /// One-time code accepted by the verification endpoint. There is no OTP delivery channel.
    pub otp_code: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            redis: RedisConfig {
                url: "redis://localhost:6379".to_string(),
            },
            server: ServerConfig {
                api_port: 8080,
                host: "0.0.0.0".to_string(),
            },
            store: StoreConfig {
                backend: StoreBackend::Redis,
                rebuild_indexes_on_start: false,
            },
            auth: AuthConfig {
                jwt_secret: DEV_JWT_SECRET.to_string(),
                token_ttl_days: 30,
                otp_code: "123456".to_string(),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let _ = dotenv::dotenv();
        let defaults = Config::default();

        let config = Config {
            redis: RedisConfig {
                url: env::var("REDIS_URL").unwrap_or(defaults.redis.url),
            },
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or(defaults.server.host),
                api_port: env::var("API_PORT")
                    .or_else(|_| env::var("PORT"))
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.server.api_port),
            },
            store: StoreConfig {
                backend: env::var("STORE_BACKEND")
                    .ok()
                    .and_then(|v| StoreBackend::parse(&v))
                    .unwrap_or(defaults.store.backend),
                rebuild_indexes_on_start: env::var("REBUILD_INDEXES_ON_START")
                    .map(|v| v == "true" || v == "1")
                    .unwrap_or(defaults.store.rebuild_indexes_on_start),
            },
            auth: AuthConfig {
                jwt_secret: env::var("JWT_SECRET").unwrap_or(defaults.auth.jwt_secret),
                token_ttl_days: env::var("TOKEN_TTL_DAYS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.auth.token_ttl_days),
                otp_code: env::var("OTP_CODE").unwrap_or(defaults.auth.otp_code),
            },
        };

        if config.auth.jwt_secret == DEV_JWT_SECRET {
            tracing::warn!("JWT_SECRET not set, using the development secret. Set JWT_SECRET for production!");
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_backend_parse() {
        assert_eq!(StoreBackend::parse("redis"), Some(StoreBackend::Redis));
        assert_eq!(StoreBackend::parse(" Memory "), Some(StoreBackend::Memory));
        assert_eq!(StoreBackend::parse("postgres"), None);
    }

    #[test]
    fn test_default_token_lifetime_is_thirty_days() {
        let config = Config::default();
        assert_eq!(config.auth.token_ttl_days, 30);
        assert_eq!(config.store.backend, StoreBackend::Redis);
    }
}
