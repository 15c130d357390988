//! Application settings loading from config.toml
//!
//! Every section is optional; missing values fall back to the defaults below.
//! `DATABASE_URL` in the environment (or `.env`) overrides `[database] url`.

use crate::config::database::{DEFAULT_DATABASE_URL, get_database_url};
use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the settings file.
pub const CONFIG_PATH_VAR: &str = "BEKYA_CONFIG";

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Store connection
    pub database: DatabaseSettings,
    /// Read-through cache
    pub cache: CacheSettings,
    /// Local deadlines on store calls
    pub requests: RequestSettings,
    /// Uploaded image storage
    pub storage: StorageSettings,
    /// Moderator accounts to seed on `init`
    pub admins: Vec<AdminSeed>,
}

/// `[database]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Connection URL
    pub url: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
        }
    }
}

/// `[cache]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// TTL for listing and offer queries
    pub default_ttl_secs: u64,
    /// TTL for a seller's own listings
    pub own_listings_ttl_secs: u64,
    /// Period of the expired-entry sweep
    pub sweep_interval_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            default_ttl_secs: 300,
            own_listings_ttl_secs: 180,
            sweep_interval_secs: 600,
        }
    }
}

impl CacheSettings {
    /// Default entry lifetime.
    #[must_use]
    pub const fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    /// Lifetime of "my listings" entries.
    #[must_use]
    pub const fn own_listings_ttl(&self) -> Duration {
        Duration::from_secs(self.own_listings_ttl_secs)
    }

    /// Sweep period.
    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// `[requests]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RequestSettings {
    /// Deadline for queries and mutations
    pub timeout_secs: u64,
    /// Deadline for image uploads
    pub upload_timeout_secs: u64,
}

impl Default for RequestSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            upload_timeout_secs: 30,
        }
    }
}

/// `[storage]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Directory uploaded images are written to
    pub root: PathBuf,
    /// URL prefix the directory is served under
    pub public_base_url: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            root: PathBuf::from("data/uploads"),
            public_base_url: "http://localhost:8080/uploads".to_string(),
        }
    }
}

/// One `[[admins]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct AdminSeed {
    /// Identity id
    pub id: String,
    /// Login name
    pub username: String,
    /// Email
    pub email: String,
    /// Contact phone
    #[serde(default)]
    pub phone: Option<String>,
    /// Area
    #[serde(default)]
    pub location: Option<String>,
}

impl Settings {
    /// Parses settings from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| Error::Config {
            message: format!("Failed to parse config.toml: {e}"),
        })
    }

    /// Connection URL after applying the `DATABASE_URL` override.
    #[must_use]
    pub fn database_url(&self) -> String {
        get_database_url(&self.database.url)
    }
}

/// Loads settings from a TOML file.
///
/// # Errors
/// Returns an error if the file cannot be read or the TOML is invalid.
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let path_ref = path.as_ref();
    tracing::debug!("Attempting to load configuration from: {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path_ref.display()),
    })?;
    Settings::from_toml(&contents)
}

/// Loads settings from `$BEKYA_CONFIG` or `./config.toml`; a missing file
/// yields the defaults.
pub fn load_default_settings() -> Result<Settings> {
    let path = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| "config.toml".to_string());
    if Path::new(&path).exists() {
        load_settings(path)
    } else {
        tracing::info!("No settings file at {path}, using defaults");
        Ok(Settings::default())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_full_settings() {
        let toml_str = r#"
            [database]
            url = "sqlite::memory:"

            [cache]
            default_ttl_secs = 60
            own_listings_ttl_secs = 30
            sweep_interval_secs = 120

            [requests]
            timeout_secs = 20

            [storage]
            root = "/tmp/bekya"
            public_base_url = "https://cdn.example.org/bekya"

            [[admins]]
            id = "admin-1"
            username = "moderator"
            email = "mod@example.org"
            location = "Cairo"
        "#;

        let settings = Settings::from_toml(toml_str).unwrap();
        assert_eq!(settings.database.url, "sqlite::memory:");
        assert_eq!(settings.cache.default_ttl(), Duration::from_secs(60));
        assert_eq!(settings.cache.own_listings_ttl(), Duration::from_secs(30));
        assert_eq!(settings.requests.timeout_secs, 20);
        assert_eq!(settings.requests.upload_timeout_secs, 30);
        assert_eq!(settings.storage.root, PathBuf::from("/tmp/bekya"));
        assert_eq!(settings.admins.len(), 1);
        assert_eq!(settings.admins[0].location.as_deref(), Some("Cairo"));
        assert!(settings.admins[0].phone.is_none());
    }

    #[test]
    fn test_empty_settings_use_defaults() {
        let settings = Settings::from_toml("").unwrap();
        assert_eq!(settings.cache.default_ttl(), Duration::from_secs(300));
        assert_eq!(settings.cache.own_listings_ttl(), Duration::from_secs(180));
        assert_eq!(settings.cache.sweep_interval(), Duration::from_secs(600));
        assert_eq!(settings.requests.timeout_secs, 15);
        assert!(settings.admins.is_empty());
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let result = Settings::from_toml("[cache\ndefault_ttl_secs = ");
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_load_settings_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[requests]\ntimeout_secs = 5").unwrap();
        let settings = load_settings(file.path()).unwrap();
        assert_eq!(settings.requests.timeout_secs, 5);
    }

    #[test]
    fn test_load_settings_missing_file() {
        let result = load_settings("/definitely/not/here/config.toml");
        assert!(matches!(result, Err(Error::Config { .. })));
    }
}
