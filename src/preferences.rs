// Persistent user preferences
// Stored as JSON under the user config directory

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Listing sort order
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Directories first, then by name
    #[default]
    Name,
    /// Newest first
    Date,
    /// Directories first by name, then files largest first
    Size,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Name => "name",
            SortOrder::Date => "date",
            SortOrder::Size => "size",
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "name" => Ok(SortOrder::Name),
            "date" => Ok(SortOrder::Date),
            "size" => Ok(SortOrder::Size),
            other => Err(format!("Unknown sort order: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub sort_order: SortOrder,
}

/// Default location: `<config dir>/webdav-navigator/preferences.json`
fn default_path() -> PathBuf {
    let config_dir = dirs::config_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")));
    config_dir.join("webdav-navigator").join("preferences.json")
}

/// Reads and writes the preferences file
#[derive(Debug, Clone)]
pub struct PreferenceStore {
    path: PathBuf,
}

impl Default for PreferenceStore {
    fn default() -> Self {
        Self::at(default_path())
    }
}

impl PreferenceStore {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load preferences, falling back to defaults when the file is missing or unreadable
    pub fn load(&self) -> Preferences {
        if !self.path.exists() {
            return Preferences::default();
        }
        match fs::read_to_string(&self.path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(prefs) => prefs,
                Err(e) => {
                    tracing::warn!("Failed to parse preferences: {}", e);
                    Preferences::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read preferences: {}", e);
                Preferences::default()
            }
        }
    }

    pub fn save(&self, prefs: &Preferences) -> Result<(), String> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }
        let content = serde_json::to_string_pretty(prefs)
            .map_err(|e| format!("Failed to serialize preferences: {}", e))?;
        fs::write(&self.path, content).map_err(|e| format!("Failed to write preferences: {}", e))?;

        tracing::debug!("Preferences saved to {:?}", self.path);
        Ok(())
    }
}
