//! Server configuration stored in `~/.cereal/config.json`.
//!
//! Every field has a default, so a missing config file is not an error:
//! the server runs against `~/.cereal/cereal.db` and the standard Granola
//! cache location out of the box.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::granola::GranolaConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Override for the SQLite database path. `None` means the default
    /// location under `~/.cereal/`.
    #[serde(default)]
    pub database_path: Option<String>,
    /// Email domain treated as internal when inferring clients from
    /// meeting attendees.
    #[serde(default = "default_internal_domain")]
    pub internal_domain: String,
    #[serde(default)]
    pub granola: GranolaConfig,
}

fn default_internal_domain() -> String {
    "gojilabs.com".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: None,
            internal_domain: default_internal_domain(),
            granola: GranolaConfig::default(),
        }
    }
}

/// Path to the config file: `~/.cereal/config.json`.
pub fn config_path() -> Result<PathBuf, String> {
    let home = dirs::home_dir().ok_or("Could not determine home directory")?;
    Ok(home.join(".cereal").join("config.json"))
}

impl Config {
    /// Load the config file, falling back to defaults when it doesn't
    /// exist. A file that exists but doesn't parse is an error rather
    /// than a silent fallback.
    pub fn load() -> Result<Config, String> {
        let path = config_path()?;
        if !path.exists() {
            return Ok(Config::default());
        }
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        serde_json::from_str(&raw).map_err(|e| format!("Invalid config {}: {}", path.display(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_fields_absent() {
        let cfg: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.internal_domain, "gojilabs.com");
        assert!(cfg.database_path.is_none());
        assert!(cfg.granola.cache_path.ends_with("cache-v3.json"));
    }

    #[test]
    fn partial_file_fills_gaps() {
        let cfg: Config =
            serde_json::from_str(r#"{"internalDomain": "example.com"}"#).unwrap();
        assert_eq!(cfg.internal_domain, "example.com");
        assert!(cfg.granola.cache_path.ends_with("cache-v3.json"));
    }

    #[test]
    fn camel_case_round_trip() {
        let cfg = Config {
            database_path: Some("/tmp/x.db".into()),
            ..Config::default()
        };
        let json = serde_json::to_string(&cfg).unwrap();
        assert!(json.contains("databasePath"));
        assert!(json.contains("internalDomain"));
        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(back.database_path.as_deref(), Some("/tmp/x.db"));
    }
}
