//! Granola integration for local cache transcript archiving.
//!
//! Reads meeting data from Granola's local cache file at
//! `~/Library/Application Support/Granola/cache-v3.json`.
//! No API keys or authentication required, purely local file access.

pub mod cache;

use serde::{Deserialize, Serialize};

/// Granola source configuration stored in ~/.cereal/config.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GranolaConfig {
    #[serde(default = "default_cache_path")]
    pub cache_path: String,
}

fn default_cache_path() -> String {
    dirs::home_dir()
        .unwrap_or_default()
        .join("Library/Application Support/Granola/cache-v3.json")
        .to_string_lossy()
        .to_string()
}

impl Default for GranolaConfig {
    fn default() -> Self {
        Self {
            cache_path: default_cache_path(),
        }
    }
}
