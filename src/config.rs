//! Configuration file support: capture and storage defaults loaded from
//! a TOML file, with sane fallbacks when none exists.

use crate::errors::CameraError;
use crate::types::CapturePreset;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewfinderConfig {
    pub capture: CaptureDefaults,
    pub storage: StorageDefaults,
}

/// Defaults applied when controller options leave a field unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureDefaults {
    /// Preset used when the caller does not pass one ("high",
    /// "medium", "low", or "WxH").
    pub default_preset: String,
    /// Frames discarded after stream start while the sensor settles.
    pub warmup_frames: u32,
}

/// File output defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageDefaults {
    /// Directory for recordings started without an explicit path.
    pub output_directory: String,
    /// JPEG quality for compressed snapshots (1-100).
    pub jpeg_quality: u8,
}

impl Default for ViewfinderConfig {
    fn default() -> Self {
        Self {
            capture: CaptureDefaults {
                default_preset: "high".to_string(),
                warmup_frames: 5,
            },
            storage: StorageDefaults {
                output_directory: "./captures".to_string(),
                jpeg_quality: 90,
            },
        }
    }
}

impl ViewfinderConfig {
    /// Load configuration from a TOML file, falling back to defaults
    /// when the file does not exist.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, CameraError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| CameraError::IoError(format!("Failed to read config file: {}", e)))?;

        let config: ViewfinderConfig = toml::from_str(&contents).map_err(|e| {
            CameraError::ConfigurationFailed(format!("Failed to parse config file: {}", e))
        })?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to a TOML file, creating parent directories.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), CameraError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                CameraError::IoError(format!("Failed to create config directory: {}", e))
            })?;
        }

        let toml_string = toml::to_string_pretty(self).map_err(|e| {
            CameraError::ConfigurationFailed(format!("Failed to serialize config: {}", e))
        })?;

        fs::write(path, toml_string)
            .map_err(|e| CameraError::IoError(format!("Failed to write config file: {}", e)))?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    pub fn default_path() -> PathBuf {
        PathBuf::from("viewfinder.toml")
    }

    /// Load from the default location, or fall back to defaults.
    pub fn load_or_default() -> Self {
        Self::load_from_file(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    pub fn validate(&self) -> Result<(), String> {
        if self
            .capture
            .default_preset
            .parse::<CapturePreset>()
            .is_err()
        {
            return Err(format!(
                "Invalid default preset: {}",
                self.capture.default_preset
            ));
        }
        if self.capture.warmup_frames > 120 {
            return Err("Warmup frames must be at most 120".to_string());
        }
        if self.storage.jpeg_quality == 0 || self.storage.jpeg_quality > 100 {
            return Err("JPEG quality must be between 1 and 100".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = ViewfinderConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.capture.default_preset, "high");
        assert_eq!(config.capture.warmup_frames, 5);
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut bad = ViewfinderConfig::default();
        bad.capture.default_preset = "ultra".to_string();
        assert!(bad.validate().is_err());

        let mut bad = ViewfinderConfig::default();
        bad.storage.jpeg_quality = 0;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn save_and_load_round_trip() {
        let temp_dir = std::env::temp_dir();
        let config_path = temp_dir.join("test_viewfinder.toml");
        let _ = fs::remove_file(&config_path);

        let config = ViewfinderConfig::default();
        assert!(config.save_to_file(&config_path).is_ok());

        let loaded = ViewfinderConfig::load_from_file(&config_path).expect("load failed");
        assert_eq!(loaded.capture.warmup_frames, config.capture.warmup_frames);
        assert_eq!(loaded.storage.jpeg_quality, config.storage.jpeg_quality);

        let _ = fs::remove_file(&config_path);
    }

    #[test]
    fn toml_contains_expected_sections() {
        let config = ViewfinderConfig::default();
        let toml_string = toml::to_string_pretty(&config).expect("serialize failed");
        assert!(toml_string.contains("[capture]"));
        assert!(toml_string.contains("[storage]"));
        assert!(toml_string.contains("default_preset"));
    }

    #[test]
    fn missing_file_returns_defaults() {
        let result = ViewfinderConfig::load_from_file("nonexistent_viewfinder.toml");
        assert!(result.is_ok());
        assert_eq!(result.unwrap().capture.default_preset, "high");
    }
}
