//! Runtime configuration
//!
//! Loaded from a TOML file; every field has a default so a partial (or missing) file works.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::audio::buffer::JITTER_CAPACITY;
use crate::error::{Error, Result};
use crate::protocol::items::MAX_DATAPKT_LENGTH;
use crate::protocol::message::MAX_FRAME_LEN;
use crate::protocol::CompressionMode;

/// File name looked up in the platform config directory
pub const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub network: NetworkConfig,
    pub audio: AudioConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub host: String,
    pub port: u16,
    pub connect_timeout_secs: u64,
    /// Longest silence from the server before the link is dropped
    pub idle_timeout_secs: u64,
    pub keepalive_period_ticks: u32,
    pub keepalive_try_limit: u32,
    pub max_message_len: usize,
    pub client_description: String,
    /// Depth of the outbound message channel to the writer task
    pub send_queue_depth: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 50000,
            connect_timeout_secs: 5,
            idle_timeout_secs: 10,
            keepalive_period_ticks: 2,
            keepalive_try_limit: 3,
            max_message_len: MAX_DATAPKT_LENGTH,
            client_description: "sdr-client".to_string(),
            send_queue_depth: 64,
        }
    }
}

impl NetworkConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Output device id; the default device when unset
    pub output_device: Option<String>,
    pub input_device: Option<String>,
    pub volume: u8,
    pub compression_mode: u8,
    pub jitter_capacity: usize,
    pub capture_channel_depth: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            output_device: None,
            input_device: None,
            volume: 50,
            compression_mode: CompressionMode::Adpcm32.code(),
            jitter_capacity: JITTER_CAPACITY,
            capture_channel_depth: 32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is not set
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Platform config file location, e.g. `~/.config/sdr-audio-link/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "sdr-audio-link").map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    /// Load from `path`, or from the platform location when `None`. A missing file gives the
    /// defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Some(p) => p,
                None => {
                    debug!("No config directory available, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        if !path.exists() {
            info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(&path)?;
        let config = Self::from_toml(&text)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        let net = &self.network;
        if net.host.is_empty() {
            return Err(Error::Config("network.host is empty".into()));
        }
        if net.port == 0 {
            return Err(Error::Config("network.port must be non-zero".into()));
        }
        if net.connect_timeout_secs == 0 || net.idle_timeout_secs == 0 {
            return Err(Error::Config("network timeouts must be non-zero".into()));
        }
        if net.keepalive_period_ticks == 0 {
            return Err(Error::Config(
                "network.keepalive_period_ticks must be non-zero".into(),
            ));
        }
        if !(4..=MAX_FRAME_LEN).contains(&net.max_message_len) {
            return Err(Error::Config(format!(
                "network.max_message_len must be within 4..={}",
                MAX_FRAME_LEN
            )));
        }
        if net.send_queue_depth == 0 {
            return Err(Error::Config("network.send_queue_depth must be non-zero".into()));
        }

        let audio = &self.audio;
        if audio.volume > 99 {
            return Err(Error::Config("audio.volume must be within 0..=99".into()));
        }
        if audio.compression_mode > 12 {
            return Err(Error::Config(format!(
                "audio.compression_mode {} is not a known mode",
                audio.compression_mode
            )));
        }
        if audio.jitter_capacity < 2 {
            return Err(Error::Config("audio.jitter_capacity is too small".into()));
        }
        if audio.capture_channel_depth == 0 {
            return Err(Error::Config(
                "audio.capture_channel_depth must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert_eq!(config.network.port, 50000);
        assert_eq!(config.network.idle_timeout(), Duration::from_secs(10));
        assert_eq!(config.audio.compression_mode, 4);
        assert_eq!(config.audio.jitter_capacity, 24000);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [network]
            host = "sdr.example.net"

            [audio]
            volume = 75
            "#,
        )
        .unwrap();
        assert_eq!(config.network.address(), "sdr.example.net:50000");
        assert_eq!(config.audio.volume, 75);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_round_trip_through_toml() {
        let mut config = AppConfig::default();
        config.audio.output_device = Some("output:Speakers".into());
        let text = config.to_toml().unwrap();
        assert_eq!(AppConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn test_validation_errors() {
        assert!(matches!(
            AppConfig::from_toml("[audio]\nvolume = 120"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            AppConfig::from_toml("[network]\nmax_message_len = 9000"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            AppConfig::from_toml("[network]\nport = \"x\""),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let path = std::env::temp_dir().join("sdr-audio-link-missing-config.toml");
        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config, AppConfig::default());
    }
}
