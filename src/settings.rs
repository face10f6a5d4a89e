//! Process settings read from the environment (a `.env` file is loaded first when present).

use crate::error::ConfigError;

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    pub port: u16,
    /// No URL means the in-process store.
    pub database_url: Option<String>,
    pub database_schema: String,
    pub max_connections: u32,
    /// HS256 secret for caller tokens.
    pub token_password: String,
    /// `PROD` hides the route table from the listing endpoint.
    pub env: String,
    pub max_body_bytes: usize,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let token_password = get("TOKEN_PASSWORD")
            .ok_or_else(|| ConfigError::Load("TOKEN_PASSWORD is not set".into()))?;
        Ok(Settings {
            port: parse_or(get("PORT"), "PORT", DEFAULT_PORT)?,
            database_url: get("DATABASE_URL"),
            database_schema: get("DATABASE_SCHEMA").unwrap_or_else(|| "public".into()),
            max_connections: parse_or(get("DATABASE_MAX_CONNECTIONS"), "DATABASE_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?,
            token_password,
            env: get("ENV").unwrap_or_default(),
            max_body_bytes: parse_or(get("MAX_BODY_BYTES"), "MAX_BODY_BYTES", DEFAULT_MAX_BODY_BYTES)?,
        })
    }

    pub fn is_production(&self) -> bool {
        self.env == "PROD"
    }
}

fn parse_or<T: std::str::FromStr>(raw: Option<String>, key: &str, default: T) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| ConfigError::Load(format!("{} must be a number, got '{}'", key, v))),
    }
}
