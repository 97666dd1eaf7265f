use fundsync_core::errors::{Error, Result};
use fundsync_storage_sqlite::database_path;

pub const FUNDS_DATABASE_URL: &str = "FUNDS_DATABASE_URL";
pub const SALKKU_DATABASE_URL: &str = "SALKKU_DATABASE_URL";
pub const KIID_DATABASE_URL: &str = "KIID_DATABASE_URL";
pub const BACKEND_DATABASE_URL: &str = "BACKEND_DATABASE_URL";

/// Connection strings read from the environment (after `.env` is loaded).
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub funds_url: Option<String>,
    pub salkku_url: Option<String>,
    pub kiid_url: Option<String>,
    pub backend_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        Self {
            funds_url: read(FUNDS_DATABASE_URL),
            salkku_url: read(SALKKU_DATABASE_URL),
            kiid_url: read(KIID_DATABASE_URL),
            backend_url: read(BACKEND_DATABASE_URL),
        }
    }

    fn require<'a>(value: &'a Option<String>, key: &str) -> Result<&'a str> {
        value
            .as_deref()
            .map(database_path)
            .ok_or_else(|| Error::MissingConfigKey(key.to_string()))
    }

    pub fn funds_path(&self) -> Result<&str> {
        Self::require(&self.funds_url, FUNDS_DATABASE_URL)
    }

    pub fn salkku_path(&self) -> Result<&str> {
        Self::require(&self.salkku_url, SALKKU_DATABASE_URL)
    }

    pub fn kiid_path(&self) -> Result<&str> {
        Self::require(&self.kiid_url, KIID_DATABASE_URL)
    }

    pub fn backend_path(&self) -> Result<&str> {
        Self::require(&self.backend_url, BACKEND_DATABASE_URL)
    }
}
