use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, error, warn};

use crate::error::{HonyakuError, Result};

/// Model tags offered by default; the first one is the fallback model.
pub const MODEL_PRESETS: [&str; 3] = [
    "translategemma:4b",
    "translategemma:12b",
    "translategemma:27b",
];

const APP_DIR_NAME: &str = "honyaku";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Language of the user interface
    pub ui_language: String,
    /// Source language used when a request does not name one
    pub default_source_lang: String,
    /// Target language used when a request does not name one
    pub default_target_lang: String,
    /// Ollama endpoint URL
    pub ollama_url: String,
    /// Model used when a request does not name one
    pub default_model: String,
    /// Minimum level written to the log
    pub log_level: LogLevel,
    /// Log file location; empty means the platform default
    pub log_file_path: String,
    /// What closing the main window does
    pub close_behavior: CloseBehavior,
    /// Ask before acting on close
    pub show_close_confirmation: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            ui_language: "en".to_string(),
            default_source_lang: "en".to_string(),
            default_target_lang: "ru".to_string(),
            ollama_url: "http://localhost:11434".to_string(),
            default_model: MODEL_PRESETS[0].to_string(),
            log_level: LogLevel::Debug,
            log_file_path: String::new(),
            close_behavior: CloseBehavior::MinimizeToTray,
            show_close_confirmation: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseBehavior {
    Exit,
    MinimizeToTray,
}

impl std::str::FromStr for CloseBehavior {
    type Err = HonyakuError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "exit" => Ok(Self::Exit),
            "minimize" | "minimizetotray" | "minimize-to-tray" | "tray" => Ok(Self::MinimizeToTray),
            _ => Err(HonyakuError::Config(format!(
                "Invalid close behavior '{}'. Valid values: exit, minimize-to-tray",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Debug,
    Information,
    Warning,
    Error,
    Critical,
    None,
}

impl LogLevel {
    /// Filter directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_filter(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Information => "info",
            Self::Warning => "warn",
            // tracing has no level above error
            Self::Error | Self::Critical => "error",
            Self::None => "off",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = HonyakuError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" | "information" => Ok(Self::Information),
            "warn" | "warning" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            "critical" => Ok(Self::Critical),
            "none" => Ok(Self::None),
            _ => Err(HonyakuError::Config(format!(
                "Invalid log level '{}'. Valid levels: trace, debug, info, warn, error, critical, none",
                s
            ))),
        }
    }
}

impl AppSettings {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| HonyakuError::Config(format!("Failed to read settings file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| HonyakuError::Config(format!("Failed to parse settings file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)
            .map_err(|e| HonyakuError::Config(format!("Failed to serialize settings: {}", e)))?;

        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .map_err(|e| HonyakuError::Config(format!("Failed to create settings directory: {}", e)))?;
        }

        std::fs::write(path, content)
            .map_err(|e| HonyakuError::Config(format!("Failed to write settings file: {}", e)))?;

        Ok(())
    }
}

/// Read access to the current settings.
///
/// Services take this instead of a settings value so that edits made
/// between two operations are picked up by the next one.
pub trait SettingsProvider: Send + Sync {
    fn current(&self) -> AppSettings;
}

/// A plain settings value never changes.
impl SettingsProvider for AppSettings {
    fn current(&self) -> AppSettings {
        self.clone()
    }
}

/// Settings persisted as TOML on disk.
pub struct SettingsStore {
    path: PathBuf,
    current: RwLock<AppSettings>,
}

impl SettingsStore {
    /// Store backed by `path`; holds defaults until [`SettingsStore::load`] runs.
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            current: RwLock::new(AppSettings::default()),
        }
    }

    /// Store at the platform settings location.
    pub fn open_default() -> Result<Self> {
        Ok(Self::new(default_settings_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load settings from disk, falling back to defaults.
    ///
    /// A missing file is created with the defaults. A broken file is left
    /// alone and the defaults are used for this session.
    pub fn load(&self) -> AppSettings {
        // never write over a file we could not read
        let mut writable = true;

        if !self.path.exists() {
            debug!("Settings file {} not found, writing defaults", self.path.display());
            self.save();
        } else {
            match AppSettings::from_file(&self.path) {
                Ok(loaded) => self.replace(loaded),
                Err(e) => {
                    warn!("Failed to load settings, using defaults: {}", e);
                    writable = false;
                }
            }
        }

        if self.current().log_file_path.trim().is_empty() {
            match default_log_file_path() {
                Ok(path) => {
                    self.write_lock().log_file_path = path.to_string_lossy().to_string();
                    if writable {
                        self.save();
                    }
                }
                Err(e) => warn!("Failed to resolve default log path: {}", e),
            }
        }

        self.current()
    }

    /// Persist the current settings, logging failures.
    pub fn save(&self) {
        if let Err(e) = self.try_save() {
            error!("Failed to save settings: {}", e);
        }
    }

    pub fn try_save(&self) -> Result<()> {
        let snapshot = self.current();
        snapshot.save_to_file(&self.path)
    }

    /// Apply `edit` to the current settings and persist the result, logging failures.
    pub fn update<F: FnOnce(&mut AppSettings)>(&self, edit: F) -> AppSettings {
        {
            let mut guard = self.write_lock();
            edit(&mut guard);
        }
        self.save();
        self.current()
    }

    /// Apply `edit` only if the result can be written; a failed write is returned
    /// and the current settings stay as they were.
    pub fn try_update<F: FnOnce(&mut AppSettings)>(&self, edit: F) -> Result<AppSettings> {
        let mut next = self.current();
        edit(&mut next);
        next.save_to_file(&self.path)?;
        self.replace(next.clone());
        Ok(next)
    }

    pub fn update_log_level(&self, level: LogLevel) {
        if self.current().log_level == level {
            return;
        }
        self.update(|s| s.log_level = level);
    }

    fn replace(&self, settings: AppSettings) {
        *self.write_lock() = settings;
    }

    fn write_lock(&self) -> std::sync::RwLockWriteGuard<'_, AppSettings> {
        // A panic while holding the lock leaves plain data behind; keep using it.
        self.current.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SettingsProvider for SettingsStore {
    fn current(&self) -> AppSettings {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

fn project_dirs() -> Result<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", APP_DIR_NAME)
        .ok_or_else(|| HonyakuError::Config("Cannot determine home directory".to_string()))
}

pub fn default_settings_path() -> Result<PathBuf> {
    Ok(project_dirs()?.config_dir().join("settings.toml"))
}

pub fn default_log_file_path() -> Result<PathBuf> {
    Ok(project_dirs()?.data_dir().join("logs").join("app.log"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load_persists_settings() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");

        let store = SettingsStore::new(&path);
        store.load();
        store.update(|s| {
            s.ollama_url = "http://localhost:11434".to_string();
            s.close_behavior = CloseBehavior::Exit;
            s.show_close_confirmation = false;
        });

        let reloaded = SettingsStore::new(&path).load();
        assert_eq!(reloaded.ollama_url, "http://localhost:11434");
        assert_eq!(reloaded.close_behavior, CloseBehavior::Exit);
        assert!(!reloaded.show_close_confirmation);
    }

    #[test]
    fn test_load_missing_store_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("settings.toml");

        let settings = SettingsStore::new(&path).load();

        assert!(settings.show_close_confirmation);
        assert_eq!(settings.close_behavior, CloseBehavior::MinimizeToTray);
        assert_eq!(settings.default_source_lang, "en");
        assert_eq!(settings.default_target_lang, "ru");
        assert!(path.exists());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "ollama_url = \"http://gpu-box:11434\"\n").unwrap();

        let settings = SettingsStore::new(&path).load();

        assert_eq!(settings.ollama_url, "http://gpu-box:11434");
        assert_eq!(settings.default_model, "translategemma:4b");
        assert!(settings.show_close_confirmation);
    }

    #[test]
    fn test_broken_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");
        let broken = "ollama_url = \"http://gpu-box:11434\"\ndefault_model = \"mine\n";
        std::fs::write(&path, broken).unwrap();

        let settings = SettingsStore::new(&path).load();

        assert_eq!(settings.ollama_url, AppSettings::default().ollama_url);
        assert!(!settings.log_file_path.is_empty());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), broken);
    }

    #[test]
    fn test_try_update_writes_once_and_reports_failure() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");
        let store = SettingsStore::new(&path);

        let updated = store.try_update(|s| s.default_model = "translategemma:12b".to_string()).unwrap();
        assert_eq!(updated.default_model, "translategemma:12b");
        assert_eq!(AppSettings::from_file(&path).unwrap().default_model, "translategemma:12b");

        // a directory where the file should be makes the write fail
        let blocked = SettingsStore::new(dir.path());
        assert!(blocked.try_update(|s| s.show_close_confirmation = false).is_err());
        assert!(!blocked.current().show_close_confirmation);
    }

    #[test]
    fn test_parse_enums() {
        assert_eq!("exit".parse::<CloseBehavior>().unwrap(), CloseBehavior::Exit);
        assert_eq!("Warning".parse::<LogLevel>().unwrap(), LogLevel::Warning);
        assert!("loud".parse::<LogLevel>().is_err());
        assert_eq!(LogLevel::Critical.as_filter(), "error");
    }
}
