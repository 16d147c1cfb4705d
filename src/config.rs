use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Context, Result, anyhow};
use crate::audio::default_player_command;

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5000";

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub server_url: Option<String>,
    pub audio_path: Option<PathBuf>,
    pub player_command: Option<String>,
    pub log_file: Option<PathBuf>,
}

/// Fully resolved runtime settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_url: String,
    pub audio_path: PathBuf,
    pub player_command: Vec<String>,
    pub log_file: PathBuf,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = serde_json::from_str(&config_content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    /// Layer command-line values over the file values. `None` keeps the file value.
    pub fn apply_overrides(
        &mut self,
        server_url: Option<String>,
        audio_path: Option<PathBuf>,
        player_command: Option<String>,
        log_file: Option<PathBuf>,
    ) {
        if server_url.is_some() {
            self.server_url = server_url;
        }
        if audio_path.is_some() {
            self.audio_path = audio_path;
        }
        if player_command.is_some() {
            self.player_command = player_command;
        }
        if log_file.is_some() {
            self.log_file = log_file;
        }
    }

    /// Fill unset values with defaults rooted at `data_dir`.
    pub fn resolve_in(&self, data_dir: &Path) -> Settings {
        let player_command = self
            .player_command
            .as_deref()
            .map(|cmd| cmd.split_whitespace().map(str::to_string).collect::<Vec<_>>())
            .filter(|parts| !parts.is_empty())
            .unwrap_or_else(default_player_command);

        Settings {
            server_url: self
                .server_url
                .clone()
                .filter(|url| !url.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string()),
            audio_path: self
                .audio_path
                .clone()
                .unwrap_or_else(|| data_dir.join("poem.mp3")),
            player_command,
            log_file: self
                .log_file
                .clone()
                .unwrap_or_else(|| data_dir.join("gift-hunt.log")),
        }
    }

    pub fn resolve(&self) -> Result<Settings> {
        Ok(self.resolve_in(&Self::get_data_dir()?))
    }

    fn get_data_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("gift-hunt"))
    }

    fn get_config_path() -> Result<PathBuf> {
        Ok(Self::get_data_dir()?.join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::new());

        let settings = config.resolve_in(dir.path());
        assert_eq!(settings.server_url, DEFAULT_SERVER_URL);
        assert_eq!(settings.audio_path, dir.path().join("poem.mp3"));
        assert_eq!(settings.log_file, dir.path().join("gift-hunt.log"));
        assert_eq!(settings.player_command, default_player_command());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = Config {
            server_url: Some("http://hunt.local:8080".to_string()),
            audio_path: Some(PathBuf::from("/tmp/voice.m4a")),
            player_command: Some("mpv --no-video".to_string()),
            log_file: None,
        };
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_fills_missing_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "server_url": "http://10.0.0.2:5000" }"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.server_url.as_deref(), Some("http://10.0.0.2:5000"));
        assert!(config.audio_path.is_none());
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "not json").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_overrides_win_over_file_values() {
        let mut config = Config {
            server_url: Some("http://from-file:5000".to_string()),
            audio_path: Some(PathBuf::from("file.mp3")),
            player_command: None,
            log_file: None,
        };
        config.apply_overrides(Some("http://from-cli:5000".to_string()), None, Some("afplay".to_string()), None);

        assert_eq!(config.server_url.as_deref(), Some("http://from-cli:5000"));
        assert_eq!(config.audio_path, Some(PathBuf::from("file.mp3")));

        let settings = config.resolve_in(Path::new("/data"));
        assert_eq!(settings.player_command, vec!["afplay".to_string()]);
    }

    #[test]
    fn test_blank_values_fall_back_to_defaults() {
        let config = Config {
            server_url: Some("  ".to_string()),
            player_command: Some("".to_string()),
            ..Config::default()
        };
        let settings = config.resolve_in(Path::new("/data"));
        assert_eq!(settings.server_url, DEFAULT_SERVER_URL);
        assert_eq!(settings.player_command, default_player_command());
    }
}
