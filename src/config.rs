use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::audio::{AAC_SAMPLE_RATES, Container, EncoderQuality, RecordingFormat};
use crate::storage;

#[derive(Debug, Deserialize, Serialize, PartialEq)]
pub struct Config {
    /// Where the recording lives; defaults to the XDG data directory
    #[serde(default)]
    pub documents_dir: Option<PathBuf>,

    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    #[serde(default = "default_channels")]
    pub channels: u16,

    #[serde(default = "default_container")]
    pub container: Container,

    #[serde(default = "default_quality")]
    pub quality: EncoderQuality,
}

fn default_sample_rate() -> u32 {
    RecordingFormat::default().sample_rate
}

fn default_channels() -> u16 {
    RecordingFormat::default().channels
}

fn default_container() -> Container {
    RecordingFormat::default().container
}

fn default_quality() -> EncoderQuality {
    RecordingFormat::default().quality
}

impl Default for Config {
    fn default() -> Self {
        Self {
            documents_dir: None,
            sample_rate: default_sample_rate(),
            channels: default_channels(),
            container: default_container(),
            quality: default_quality(),
        }
    }
}

impl Config {
    /// Load configuration from the default location (~/.config/taprec/config.json)
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from `config_path`, writing the defaults there if it is missing
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            tracing::info!(
                "Config file not found at {:?}, creating default config",
                config_path
            );
            let config = Self::default();
            config.save_to(config_path)?;
            return Ok(config);
        }

        let contents = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        let config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;

        tracing::info!("Loaded config from {:?}", config_path);
        Ok(config)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(config_path, contents)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        tracing::info!("Saved config to {:?}", config_path);
        Ok(())
    }

    /// Get the path to the configuration file
    fn config_path() -> Result<PathBuf> {
        let config_dir = if let Ok(dir) = std::env::var("XDG_CONFIG_HOME") {
            PathBuf::from(dir)
        } else {
            let home = std::env::var("HOME").context("HOME environment variable not set")?;
            PathBuf::from(home).join(".config")
        };

        Ok(config_dir.join("taprec").join("config.json"))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !(8000..=192_000).contains(&self.sample_rate) {
            return Err(anyhow::anyhow!(
                "sample_rate must be between 8000 and 192000, got {}",
                self.sample_rate
            ));
        }

        if !(1..=2).contains(&self.channels) {
            return Err(anyhow::anyhow!(
                "channels must be 1 or 2, got {}",
                self.channels
            ));
        }

        if self.container == Container::M4a && !AAC_SAMPLE_RATES.contains(&self.sample_rate) {
            return Err(anyhow::anyhow!(
                "sample_rate {} cannot be stored as AAC; use one of {:?} or \"container\": \"wav\"",
                self.sample_rate,
                AAC_SAMPLE_RATES
            ));
        }

        Ok(())
    }

    pub fn recording_format(&self) -> RecordingFormat {
        RecordingFormat {
            sample_rate: self.sample_rate,
            channels: self.channels,
            container: self.container,
            quality: self.quality,
        }
    }

    pub fn documents_dir(&self) -> Result<PathBuf> {
        match &self.documents_dir {
            Some(dir) => Ok(dir.clone()),
            None => storage::default_documents_dir(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_the_recording_format() {
        let config = Config::default();
        assert_eq!(config.sample_rate, 12000);
        assert_eq!(config.channels, 1);
        assert_eq!(config.quality, EncoderQuality::High);
        assert_eq!(config.container, Container::M4a);
        assert_eq!(config.recording_format(), RecordingFormat::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config: Config = serde_json::from_str(r#"{"quality": "max"}"#).unwrap();
        assert_eq!(config.quality, EncoderQuality::Max);
        assert_eq!(config.sample_rate, 12000);
        assert_eq!(config.documents_dir, None);
    }

    #[test]
    fn parses_every_field() {
        let config: Config = serde_json::from_str(
            r#"{
                "documents_dir": "/srv/memos",
                "sample_rate": 44100,
                "channels": 2,
                "container": "m4a",
                "quality": "low"
            }"#,
        )
        .unwrap();

        assert_eq!(config.documents_dir().unwrap(), PathBuf::from("/srv/memos"));
        let format = config.recording_format();
        assert_eq!(format.sample_rate, 44100);
        assert_eq!(format.channels, 2);
        assert_eq!(format.container, Container::M4a);
        assert_eq!(format.quality, EncoderQuality::Low);
    }

    #[test]
    fn rejects_unknown_container() {
        assert!(serde_json::from_str::<Config>(r#"{"container": "flac"}"#).is_err());
    }

    #[test]
    fn validate_checks_ranges() {
        let mut config = Config::default();
        config.sample_rate = 4000;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.channels = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.channels = 3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn aac_needs_a_standard_rate() {
        let mut config = Config::default();
        config.sample_rate = 10000;
        assert!(config.validate().is_err());

        config.container = Container::Wav;
        assert!(config.validate().is_ok());

        config.container = Container::M4a;
        config.sample_rate = 44100;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn default_artifact_is_m4a() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        let artifact = storage::Artifact::new(dir.path(), config.recording_format().container);
        assert!(artifact.path().ends_with("recording.m4a"));
    }

    #[test]
    fn load_creates_and_rereads_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taprec").join("config.json");

        let created = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(created, Config::default());

        std::fs::write(&path, r#"{"sample_rate": 16000}"#).unwrap();
        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.sample_rate, 16000);
    }

    #[test]
    fn load_reports_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
