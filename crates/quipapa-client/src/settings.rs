//! Client settings, persisted as TOML under the platform config directory.

use std::fs;
use std::path::PathBuf;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppSettings {
    pub notifications_enabled: bool,
    pub theme: String,
    /// Pre-filled on the sign-in screen.
    pub last_email: Option<String>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            notifications_enabled: true,
            theme: "light".to_string(),
            last_email: None,
        }
    }
}

impl AppSettings {
    fn path() -> Option<PathBuf> {
        let dirs = ProjectDirs::from("br", "quipapa", "Quipapa")?;
        Some(dirs.config_dir().join("settings.toml"))
    }

    /// Missing or corrupt files fall back to defaults; corruption is logged
    /// so the user can recover the file by hand.
    pub fn load() -> Self {
        match Self::path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    pub fn save(&self) -> std::io::Result<()> {
        let path = Self::path().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "no config directory")
        })?;
        self.save_to(&path)
    }

    pub fn load_from(path: &std::path::Path) -> Self {
        let Ok(text) = fs::read_to_string(path) else {
            return Self::default();
        };
        match toml::from_str(&text) {
            Ok(settings) => settings,
            Err(error) => {
                warn!(path = %path.display(), error = %error, "Corrupt settings file, using defaults");
                Self::default()
            }
        }
    }

    pub fn save_to(&self, path: &std::path::Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let text = toml::to_string_pretty(self)
            .map_err(|error| std::io::Error::new(std::io::ErrorKind::Other, error.to_string()))?;
        fs::write(path, text)
    }
}
