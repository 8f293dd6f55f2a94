use dotenvy::dotenv;
use serde::Deserialize;
use std::env;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

pub const API_TITLE: &str = "TinyMQ API";
pub const API_DESCRIPTION: &str = "REST API for accessing TinyMQ broker's database";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub api_host: String,
    pub api_port: u16,

    pub database_path: String,
    pub db_pool_size: u32,

    pub jwt_secret_key: String,
    pub jwt_access_token_expire_minutes: i64,
    pub password_hash_cost: u32,

    pub default_admin_username: String,
    pub default_admin_password: String,

    pub payload_preview_chars: usize,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Environment variable {0} is missing or invalid.")]
    MissingOrInvalid(String),
    #[error("Parsing error: {0}")]
    ParsingError(String),
}

impl Config {
    /// Validate numeric ranges that would otherwise surface as confusing runtime failures.
    fn validate(&self) -> Result<(), ConfigError> {
        const MIN_EXPIRY_MINUTES: i64 = 1;
        const MAX_EXPIRY_MINUTES: i64 = 7 * 24 * 60;

        if self.api_port == 0 {
            return Err(ConfigError::ParsingError(
                "API_PORT must be a non-zero port number".to_string(),
            ));
        }

        if !(MIN_EXPIRY_MINUTES..=MAX_EXPIRY_MINUTES).contains(&self.jwt_access_token_expire_minutes) {
            return Err(ConfigError::ParsingError(format!(
                "JWT_ACCESS_TOKEN_EXPIRE_MINUTES must be between {} and {}",
                MIN_EXPIRY_MINUTES, MAX_EXPIRY_MINUTES
            )));
        }

        if !(1..=64).contains(&self.db_pool_size) {
            return Err(ConfigError::ParsingError(
                "DB_POOL_SIZE must be between 1 and 64".to_string(),
            ));
        }

        // bcrypt rejects costs outside this window
        if !(4..=31).contains(&self.password_hash_cost) {
            return Err(ConfigError::ParsingError(
                "PASSWORD_HASH_COST must be between 4 and 31".to_string(),
            ));
        }

        if self.default_admin_username.is_empty() {
            return Err(ConfigError::MissingOrInvalid(
                "DEFAULT_ADMIN_USERNAME".to_string(),
            ));
        }

        Ok(())
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok(); // Load environment variables from .env file

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret_key = match lookup("JWT_SECRET_KEY").filter(|s| !s.is_empty()) {
            Some(secret) => secret,
            None => generate_secret(),
        };

        let config = Self {
            api_host: lookup("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            api_port: parse_or(&lookup, "API_PORT", 8000)?,

            database_path: lookup("DATABASE_PATH").unwrap_or_else(|| "tinymq.db".to_string()),
            db_pool_size: parse_or(&lookup, "DB_POOL_SIZE", 8)?,

            jwt_secret_key,
            jwt_access_token_expire_minutes: parse_or(&lookup, "JWT_ACCESS_TOKEN_EXPIRE_MINUTES", 60)?,
            password_hash_cost: parse_or(&lookup, "PASSWORD_HASH_COST", bcrypt::DEFAULT_COST)?,

            default_admin_username: lookup("DEFAULT_ADMIN_USERNAME").unwrap_or_else(|| "admin".to_string()),
            default_admin_password: lookup("DEFAULT_ADMIN_PASSWORD").unwrap_or_else(|| "admin".to_string()),

            payload_preview_chars: parse_or(&lookup, "PAYLOAD_PREVIEW_CHARS", 100)?,
        };

        config.validate()?;

        Ok(config)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::ParsingError(format!("{} must be a valid number", key))),
        None => Ok(default),
    }
}

/// 64 hex characters of randomness, used when no secret is configured.
fn generate_secret() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.api_host, "0.0.0.0");
        assert_eq!(config.api_port, 8000);
        assert_eq!(config.database_path, "tinymq.db");
        assert_eq!(config.jwt_access_token_expire_minutes, 60);
        assert_eq!(config.default_admin_username, "admin");
        assert_eq!(config.payload_preview_chars, 100);
        assert_eq!(config.jwt_secret_key.len(), 64);
    }

    #[test]
    fn generated_secrets_differ_between_loads() {
        let a = Config::from_lookup(lookup_from(&[])).unwrap();
        let b = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_ne!(a.jwt_secret_key, b.jwt_secret_key);
    }

    #[test]
    fn explicit_values_override_defaults() {
        let config = Config::from_lookup(lookup_from(&[
            ("API_PORT", "9100"),
            ("JWT_SECRET_KEY", "s3cret"),
            ("DATABASE_PATH", "/tmp/x.db"),
            ("PASSWORD_HASH_COST", "4"),
        ]))
        .unwrap();
        assert_eq!(config.api_port, 9100);
        assert_eq!(config.jwt_secret_key, "s3cret");
        assert_eq!(config.database_path, "/tmp/x.db");
        assert_eq!(config.password_hash_cost, 4);
    }

    #[test]
    fn rejects_unparseable_port() {
        let err = Config::from_lookup(lookup_from(&[("API_PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::ParsingError(_)));
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(Config::from_lookup(lookup_from(&[("API_PORT", "0")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("JWT_ACCESS_TOKEN_EXPIRE_MINUTES", "0")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("DB_POOL_SIZE", "0")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("PASSWORD_HASH_COST", "2")])).is_err());
    }

    #[test]
    fn rejects_empty_admin_username() {
        let err = Config::from_lookup(lookup_from(&[("DEFAULT_ADMIN_USERNAME", "")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingOrInvalid(_)));
    }
}
