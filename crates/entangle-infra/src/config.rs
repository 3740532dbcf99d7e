//! Configuration loading for Entangle.
//!
//! Reads `config.toml` from the data directory (`~/.entangle/` in production)
//! and deserializes it into [`GlobalConfig`]. Falls back to defaults when the
//! file is missing or malformed.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use entangle_types::config::GlobalConfig;

/// Environment variable that overrides the data directory.
pub const DATA_DIR_ENV: &str = "ENTANGLE_DATA_DIR";

/// Resolve the data directory.
///
/// Priority:
/// 1. `ENTANGLE_DATA_DIR` environment variable
/// 2. `~/.entangle`
/// 3. `./.entangle`
pub fn resolve_data_dir() -> PathBuf {
    data_dir_or_default(std::env::var_os(DATA_DIR_ENV))
}

fn data_dir_or_default(overridden: Option<OsString>) -> PathBuf {
    if let Some(dir) = overridden.filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".entangle");
    }
    PathBuf::from(".entangle")
}

/// Load configuration from `{data_dir}/config.toml`.
///
/// A missing file yields [`GlobalConfig::default()`]. A file that cannot be
/// read or parsed logs a warning and also yields the default.
pub async fn load_global_config(data_dir: &Path) -> GlobalConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return GlobalConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return GlobalConfig::default();
        }
    };

    match toml::from_str::<GlobalConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            GlobalConfig::default()
        }
    }
}

/// SQLite URL for the chat store: the configured one, or
/// `sqlite://{data_dir}/entangle.db?mode=rwc`. The URL must name a file;
/// `DatabasePool::new` refuses in-memory databases.
pub fn database_url(config: &GlobalConfig, data_dir: &Path) -> String {
    match &config.database.url {
        Some(url) => url.clone(),
        None => format!("sqlite://{}?mode=rwc", data_dir.join("entangle.db").display()),
    }
}
