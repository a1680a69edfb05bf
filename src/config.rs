//! Persisted user preferences and runtime state.
//!
//! Two sibling JSON files under the platform per-user directories:
//!
//! - `config.json` — theme preference
//! - `state.json` — indicator position
//!
//! Neither file holds session state; the registry always starts empty.
//! Loads are lenient (missing or corrupt files yield defaults), writes are
//! atomic (temp file + rename) so a crash never leaves partial JSON behind.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::path::{Path, PathBuf};

/// User preferences (config.json).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Theme name: "system", "liquid-dark", "liquid-light", "solid-dark", "solid-light"
    #[serde(default = "default_theme")]
    pub theme: String,
}

fn default_theme() -> String {
    "system".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            theme: default_theme(),
        }
    }
}

/// Runtime state (state.json).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct State {
    /// Indicator X position (logical pixels from the left edge).
    #[serde(default)]
    pub indicator_x: Option<f64>,
    /// Indicator Y position (logical pixels from the top edge).
    #[serde(default)]
    pub indicator_y: Option<f64>,
}

fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("aura").join("config.json"))
}

fn state_path() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join("aura").join("state.json"))
}

/// Load config from disk, falling back to defaults.
pub fn load_config() -> Config {
    config_path().map(|p| load_json(&p)).unwrap_or_default()
}

/// Save config to disk.
pub fn save_config(config: &Config) -> std::io::Result<()> {
    let path = config_path().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::NotFound, "config dir not found")
    })?;
    save_json(config, &path)
}

/// Load state from disk, falling back to defaults.
pub fn load_state() -> State {
    state_path().map(|p| load_json(&p)).unwrap_or_default()
}

/// Save state to disk.
pub fn save_state(state: &State) -> std::io::Result<()> {
    let path = state_path().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::NotFound, "data dir not found")
    })?;
    save_json(state, &path)
}

fn load_json<T: DeserializeOwned + Default>(path: &Path) -> T {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|contents| serde_json::from_str(&contents).ok())
        .unwrap_or_default()
}

fn save_json<T: Serialize>(value: &T, path: &Path) -> std::io::Result<()> {
    let parent = path.parent().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no parent")
    })?;
    std::fs::create_dir_all(parent)?;

    let json = serde_json::to_string_pretty(value).map_err(std::io::Error::other)?;

    // Write-then-rename keeps the file whole under concurrent readers.
    use std::io::Write;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(json.as_bytes())?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
