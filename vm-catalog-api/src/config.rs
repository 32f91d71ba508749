use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// SQLite file; `None` keeps the catalog in memory
    #[serde(default = "default_db_path")]
    pub db_path: Option<PathBuf>,

    /// Create the `default` network and storage pool at startup
    #[serde(default = "default_seed_defaults")]
    pub seed_defaults: bool,
}

fn default_bind_addr() -> String {
    std::env::var("CATALOG_API_BIND").unwrap_or_else(|_| "0.0.0.0:3131".to_string())
}

fn default_db_path() -> Option<PathBuf> {
    std::env::var("CATALOG_DB_PATH")
        .ok()
        .filter(|path| !path.trim().is_empty())
        .map(PathBuf::from)
}

fn default_seed_defaults() -> bool {
    std::env::var("CATALOG_SEED_DEFAULTS")
        .ok()
        .map(|value| parse_flag(&value))
        .unwrap_or(true)
}

fn parse_flag(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            db_path: default_db_path(),
            seed_defaults: default_seed_defaults(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default()
    }
}
