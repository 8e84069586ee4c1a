use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use tracing::{info, warn};
use utils::assets::data_dir;

/// Runtime settings, read from the environment (and `.env` when present).
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// `None` selects the default database file under the data directory.
    pub database_url: Option<String>,
    pub storage_dir: PathBuf,
    /// `None` allows any origin.
    pub cors_origin: Option<String>,
}

impl Config {
    pub fn load() -> Self {
        if let Ok(path) = dotenvy::dotenv() {
            info!(path = %path.display(), "Loaded environment file");
        }
        Self {
            host: try_load("HOST", "0.0.0.0".to_string()),
            port: try_load("PORT", 8000),
            database_url: var("DATABASE_URL"),
            storage_dir: var("STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir().join("storage")),
            cors_origin: var("CORS_ORIGIN").filter(|origin| origin != "*"),
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            database_url: None,
            storage_dir: data_dir().join("storage"),
            cors_origin: None,
        }
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn try_load<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match var(key) {
        Some(raw) => raw.parse().unwrap_or_else(|e| {
            warn!("Invalid {key} value {raw:?}: {e}, using default: {default}");
            default
        }),
        None => {
            info!("{key} not set, using default: {default}");
            default
        }
    }
}
