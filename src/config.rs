use crate::error::{Error, Result};
use crate::utils;

pub const DATABASE_URI_VAR: &str = "DATABASE_URI";
const DATABASE_URI_FALLBACK_VAR: &str = "database_uri";
pub const SEED_VAR: &str = "DEV_EVENTS_SEED";
pub const DEBUG_VAR: &str = "DEV_EVENTS_DEBUG";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub database_uri: String,
    pub seed_featured: bool,
    pub debug: bool,
}

impl AppConfig {
    /// Reads `.env` (when present) and then the process environment.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_uri = [DATABASE_URI_VAR, DATABASE_URI_FALLBACK_VAR]
            .iter()
            .filter_map(|key| lookup(key))
            .map(|value| value.trim().to_string())
            .find(|value| !value.is_empty())
            .ok_or_else(|| {
                Error::Configuration(format!(
                    "please define the {DATABASE_URI_VAR} environment variable (or put it in .env)"
                ))
            })?;

        let flag = |key: &str| lookup(key).map(|v| utils::is_truthy(&v)).unwrap_or(false);

        Ok(Self {
            database_uri,
            seed_featured: flag(SEED_VAR),
            debug: flag(DEBUG_VAR),
        })
    }
}
