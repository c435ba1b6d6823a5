//! Application settings persistence for NotaMy.
//!
//! Stores the active note file, the body editor, the protection password hash
//! and the registry of known note files in a JSON file at an OS-appropriate
//! location.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Editor value meaning "read the body from standard input".
pub const STDIN_EDITOR: &str = "nul";

/// A registered note file the user can switch to with `setting <index>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteFileEntry {
    pub path: String,
    #[serde(default)]
    pub comment: String,
}

/// Persisted application settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    /// Canonical (possibly compressed) note file all commands operate on.
    pub note_file: String,
    /// Command used to edit note bodies; [`STDIN_EDITOR`] reads stdin instead.
    pub editor: String,
    /// Hex SHA-512 of the protection password, empty until one is set.
    pub password_hash: String,
    pub note_files: Vec<NoteFileEntry>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            note_file: default_note_file().to_string_lossy().to_string(),
            editor: STDIN_EDITOR.to_string(),
            password_hash: String::new(),
            note_files: Vec::new(),
        }
    }
}

impl AppSettings {
    /// Registers `path`, replacing the comment if it is already known.
    pub fn register_file(&mut self, path: String, comment: String) {
        match self.note_files.iter_mut().find(|entry| entry.path == path) {
            Some(entry) => entry.comment = comment,
            None => self.note_files.push(NoteFileEntry { path, comment }),
        }
    }

    /// Makes the registered file at `index` the active note file.
    pub fn select_file(&mut self, index: usize) -> Result<&NoteFileEntry, String> {
        let entry = self.note_files.get(index).ok_or_else(|| {
            format!(
                "no note file at index {index} ({} registered)",
                self.note_files.len()
            )
        })?;
        self.note_file = entry.path.clone();
        Ok(entry)
    }

    pub fn uses_stdin(&self) -> bool {
        self.editor.eq_ignore_ascii_case(STDIN_EDITOR)
    }
}

/// Returns the path to the settings JSON file.
///
/// - macOS / Linux: `~/.config/notamy/settings.json`
/// - Windows: `%APPDATA%/NotaMy/settings.json`
pub fn settings_file_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        base.join("NotaMy").join("settings.json")
    }
    #[cfg(not(target_os = "windows"))]
    {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config").join("notamy").join("settings.json")
    }
}

/// Returns the default note file: `~/Notes_Map.X`.
pub fn default_note_file() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Notes_Map.X")
}

/// Loads settings from disk; returns defaults if the file is missing or corrupt.
pub fn load_settings() -> AppSettings {
    load_settings_from(&settings_file_path())
}

pub fn load_settings_from(path: &Path) -> AppSettings {
    match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!("ignoring unreadable settings {}: {e}", path.display());
            AppSettings::default()
        }),
        Err(_) => AppSettings::default(),
    }
}

/// Saves settings to disk, creating parent directories as needed.
pub fn save_settings(settings: &AppSettings) -> Result<(), String> {
    save_settings_to(&settings_file_path(), settings)
}

pub fn save_settings_to(path: &Path, settings: &AppSettings) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create settings directory: {e}"))?;
    }
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| format!("Failed to serialize settings: {e}"))?;
    fs::write(path, json).map_err(|e| format!("Failed to write settings: {e}"))?;
    Ok(())
}
