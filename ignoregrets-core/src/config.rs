//! Configuration module for snapshot filtering, retention and hook triggers
//!
//! Settings live in `.ignoregrets/config.yaml` at the repository root. The
//! loaded [`Settings`] value is passed explicitly into every operation that
//! needs it and is embedded in each snapshot manifest for later inspection.

use crate::{IgnoregretsError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Name of the per-repository state directory
pub const STATE_DIR: &str = ".ignoregrets";

/// Name of the directory holding snapshot archives, inside [`STATE_DIR`]
pub const SNAPSHOTS_DIR: &str = "snapshots";

/// Name of the configuration file, inside [`STATE_DIR`]
pub const CONFIG_FILE: &str = "config.yaml";

/// Default number of snapshots kept per commit
pub const DEFAULT_RETENTION: usize = 10;

/// Repository events that may trigger a snapshot or restore hook
pub const VALID_EVENTS: &[&str] = &["commit", "checkout"];

/// Filtering, retention and hook settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Number of snapshots to keep per commit (>= 1)
    #[serde(rename = "retention", default)]
    pub retention_count: usize,
    /// Events that trigger a snapshot
    #[serde(default)]
    pub snapshot_on: Vec<String>,
    /// Events that trigger a restore
    #[serde(default)]
    pub restore_on: Vec<String>,
    /// Whether repository hooks are installed
    #[serde(default)]
    pub hooks_enabled: bool,
    /// Base-name glob patterns removed from the candidate set
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Base-name glob patterns kept even when excluded
    #[serde(default)]
    pub include: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            retention_count: DEFAULT_RETENTION,
            snapshot_on: vec!["commit".to_string()],
            restore_on: vec!["checkout".to_string()],
            hooks_enabled: false,
            exclude: Vec::new(),
            include: Vec::new(),
        }
    }
}

impl Settings {
    /// Fill unset or non-positive fields with their defaults
    pub fn with_defaults_applied(mut self) -> Self {
        let defaults = Self::default();
        if self.retention_count == 0 {
            self.retention_count = defaults.retention_count;
        }
        if self.snapshot_on.is_empty() {
            self.snapshot_on = defaults.snapshot_on;
        }
        if self.restore_on.is_empty() {
            self.restore_on = defaults.restore_on;
        }
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.retention_count < 1 {
            return Err(IgnoregretsError::validation(
                "retention must be greater than 0",
            ));
        }
        for event in &self.snapshot_on {
            if !VALID_EVENTS.contains(&event.as_str()) {
                return Err(IgnoregretsError::validation(format!(
                    "invalid snapshot_on event: {event}"
                )));
            }
        }
        for event in &self.restore_on {
            if !VALID_EVENTS.contains(&event.as_str()) {
                return Err(IgnoregretsError::validation(format!(
                    "invalid restore_on event: {event}"
                )));
            }
        }
        Ok(())
    }

    /// Parse settings from YAML text, applying defaults
    pub fn from_yaml(text: &str) -> Result<Self> {
        // An empty document deserializes to unit, not a mapping
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let settings: Settings = serde_yaml::from_str(text)?;
        Ok(settings.with_defaults_applied())
    }

    /// Serialize settings to YAML text
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// Filesystem locations of the tool's state for one repository
#[derive(Debug, Clone)]
pub struct RepoLayout {
    root: PathBuf,
}

impl RepoLayout {
    /// Layout rooted at the repository working tree
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root.join(STATE_DIR)
    }

    pub fn snapshots_dir(&self) -> PathBuf {
        self.state_dir().join(SNAPSHOTS_DIR)
    }

    pub fn config_path(&self) -> PathBuf {
        self.state_dir().join(CONFIG_FILE)
    }

    /// Create the state and snapshots directories if missing
    pub fn ensure_dirs(&self) -> Result<()> {
        let snapshots = self.snapshots_dir();
        fs::create_dir_all(&snapshots).map_err(|e| {
            IgnoregretsError::storage(format!(
                "Failed to create directory {}: {}",
                snapshots.display(),
                e
            ))
        })
    }

    /// Load settings, writing the defaults first when no config file exists
    pub fn load_settings(&self) -> Result<Settings> {
        let path = self.config_path();
        if !path.exists() {
            let settings = Settings::default();
            self.save_settings(&settings)?;
            info!(path = %path.display(), "created default configuration");
            return Ok(settings);
        }

        let text = fs::read_to_string(&path)?;
        let settings = Settings::from_yaml(&text)?;
        debug!(path = %path.display(), ?settings, "loaded configuration");
        Ok(settings)
    }

    /// Load settings without creating anything; defaults when no config file exists
    pub fn read_settings(&self) -> Result<Settings> {
        let path = self.config_path();
        match fs::read_to_string(&path) {
            Ok(text) => Settings::from_yaml(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Settings::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write settings to the config file
    pub fn save_settings(&self, settings: &Settings) -> Result<()> {
        fs::create_dir_all(self.state_dir())?;
        fs::write(self.config_path(), settings.to_yaml()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.retention_count, 10);
        assert_eq!(settings.snapshot_on, vec!["commit"]);
        assert_eq!(settings.restore_on, vec!["checkout"]);
        assert!(!settings.hooks_enabled);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_from_yaml_applies_defaults() {
        let settings = Settings::from_yaml("retention: 0\nexclude: ['*.log']\n").unwrap();
        assert_eq!(settings.retention_count, DEFAULT_RETENTION);
        assert_eq!(settings.exclude, vec!["*.log"]);
        assert_eq!(settings.snapshot_on, vec!["commit"]);
    }

    #[test]
    fn test_from_yaml_empty_document() {
        assert_eq!(Settings::from_yaml("").unwrap(), Settings::default());
    }

    #[test]
    fn test_yaml_keys() {
        let yaml = Settings::default().to_yaml().unwrap();
        assert!(yaml.contains("retention: 10"));
        assert!(yaml.contains("hooks_enabled: false"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut settings = Settings::default();
        settings.retention_count = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.restore_on = vec!["push".to_string()];
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("push"));
    }

    #[test]
    fn test_load_creates_default_config() {
        let temp_dir = TempDir::new().unwrap();
        let layout = RepoLayout::new(temp_dir.path());

        let settings = layout.load_settings().unwrap();
        assert_eq!(settings, Settings::default());
        assert!(layout.config_path().exists());
    }

    #[test]
    fn test_read_does_not_create_config() {
        let temp_dir = TempDir::new().unwrap();
        let layout = RepoLayout::new(temp_dir.path());

        assert_eq!(layout.read_settings().unwrap(), Settings::default());
        assert!(!layout.state_dir().exists());

        let custom = Settings {
            retention_count: 2,
            ..Settings::default()
        };
        layout.save_settings(&custom).unwrap();
        assert_eq!(layout.read_settings().unwrap(), custom);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let layout = RepoLayout::new(temp_dir.path());

        let settings = Settings {
            retention_count: 3,
            include: vec![".env".to_string()],
            hooks_enabled: true,
            ..Settings::default()
        };
        layout.save_settings(&settings).unwrap();
        assert_eq!(layout.load_settings().unwrap(), settings);
    }

    #[test]
    fn test_ensure_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let layout = RepoLayout::new(temp_dir.path());
        layout.ensure_dirs().unwrap();
        assert!(layout.snapshots_dir().is_dir());
    }
}
