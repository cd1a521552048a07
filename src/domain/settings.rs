use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    /// Log verbosity: one of `trace`, `debug`, `info`, `warn`, `error`.
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default = "default_true")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_true")]
    pub show_file_line: bool,
    #[serde(default = "default_false")]
    pub show_thread_ids: bool,
    #[serde(default = "default_true")]
    pub show_target: bool,
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
    /// File rotation cadence: `daily`, `hourly`, `minutely`, or `never`.
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            file_logging_enabled: default_true(),
            console_logging_enabled: default_true(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            show_file_line: default_true(),
            show_thread_ids: default_false(),
            show_target: default_true(),
            ansi_colors: default_true(),
            rotation: default_rotation(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "wristlink".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}
fn default_discovery_timeout_ms() -> u64 {
    15_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// How long discovery scans for a matching watch before giving up.
    #[serde(default = "default_discovery_timeout_ms")]
    pub discovery_timeout_ms: u64,

    #[serde(default)]
    pub log_settings: LogSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            discovery_timeout_ms: default_discovery_timeout_ms(),
            log_settings: LogSettings::default(),
        }
    }
}

pub struct SettingsService {
    settings: Settings,
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new() -> anyhow::Result<Self> {
        Self::from_path(Self::get_settings_path()?)
    }

    fn from_path(settings_path: PathBuf) -> anyhow::Result<Self> {
        let settings = match Self::load_from_file(&settings_path) {
            Ok(settings) => settings,
            Err(_) => {
                // First run: write the defaults so there is a file to edit.
                let service = Self {
                    settings: Settings::default(),
                    settings_path,
                };
                service.save()?;
                return Ok(service);
            }
        };

        Ok(Self {
            settings,
            settings_path,
        })
    }

    fn get_settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push("Wristlink");
        fs::create_dir_all(&path)?;
        path.push("settings.json");
        Ok(path)
    }

    fn load_from_file(path: &PathBuf) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.settings_path, json)?;
        Ok(())
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(name: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("wristlink-settings-{}-{}", name, std::process::id()));
        path
    }

    #[test]
    fn test_first_run_persists_defaults() {
        let path = scratch_path("defaults.json");
        let _ = fs::remove_file(&path);

        let service = SettingsService::from_path(path.clone()).unwrap();
        assert!(path.exists());
        assert_eq!(service.get().discovery_timeout_ms, 15_000);

        // The written file round-trips to the same defaults.
        let reloaded = SettingsService::from_path(path.clone()).unwrap();
        assert_eq!(reloaded.get().log_settings.level, "info");

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_existing_file_is_loaded_with_defaults_filled_in() {
        let path = scratch_path("existing.json");
        fs::write(&path, r#"{ "discovery_timeout_ms": 2000 }"#).unwrap();

        let service = SettingsService::from_path(path.clone()).unwrap();
        assert_eq!(service.get().discovery_timeout_ms, 2000);
        assert_eq!(service.get().log_settings.rotation, "daily");

        let _ = fs::remove_file(&path);
    }
}
