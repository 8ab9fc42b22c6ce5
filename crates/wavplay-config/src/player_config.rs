//! Player configuration file format.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;

/// Frames per write call.
pub const DEFAULT_CHUNK_FRAMES: usize = 1024;

/// Software queue depth between the writer and the audio callback, in frames.
pub const DEFAULT_QUEUE_FRAMES: usize = 8192;

/// Settings for a playback run.
///
/// Every field is optional in the file; missing fields take their defaults.
///
/// # TOML Format
///
/// ```toml
/// device = "USB Audio"
/// chunk_frames = 1024
/// queue_frames = 8192
/// progress = true
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct PlayerConfig {
    /// Output device index, exact name, or partial name. `None` uses the default device.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,

    /// Maximum frames handed to the device per write.
    pub chunk_frames: usize,

    /// Frames buffered ahead of the hardware.
    pub queue_frames: usize,

    /// Show a progress bar while playing.
    pub progress: bool,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            device: None,
            chunk_frames: DEFAULT_CHUNK_FRAMES,
            queue_frames: DEFAULT_QUEUE_FRAMES,
            progress: false,
        }
    }
}

impl PlayerConfig {
    /// Load a configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        Self::from_toml(&content)
    }

    /// Load a configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: PlayerConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_frames == 0 {
            return Err(ConfigError::Invalid(
                "chunk_frames must be greater than 0".to_string(),
            ));
        }
        if self.queue_frames < self.chunk_frames {
            return Err(ConfigError::Invalid(format!(
                "queue_frames ({}) must be at least chunk_frames ({})",
                self.queue_frames, self.chunk_frames
            )));
        }
        Ok(())
    }

    /// Override the device.
    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = Some(device.into());
        self
    }

    /// Override the chunk size.
    pub fn with_chunk_frames(mut self, frames: usize) -> Self {
        self.chunk_frames = frames;
        self
    }

    /// Enable or disable the progress bar.
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = PlayerConfig::default();
        assert_eq!(config.chunk_frames, 1024);
        assert_eq!(config.queue_frames, 8192);
        assert!(config.device.is_none());
        assert!(!config.progress);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(PlayerConfig::from_toml("").unwrap(), PlayerConfig::default());
    }

    #[test]
    fn test_partial_toml() {
        let config = PlayerConfig::from_toml("device = \"USB\"\nprogress = true\n").unwrap();
        assert_eq!(config.device.as_deref(), Some("USB"));
        assert!(config.progress);
        assert_eq!(config.chunk_frames, DEFAULT_CHUNK_FRAMES);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = PlayerConfig::from_toml("volume = 3\n").unwrap_err();
        assert!(matches!(err, ConfigError::TomlParse(_)));
    }

    #[test]
    fn test_zero_chunk_rejected() {
        let err = PlayerConfig::from_toml("chunk_frames = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_queue_smaller_than_chunk_rejected() {
        let err = PlayerConfig::from_toml("chunk_frames = 4096\nqueue_frames = 1024\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(ref m) if m.contains("queue_frames")));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "chunk_frames = 512").unwrap();

        let config = PlayerConfig::load(file.path()).unwrap();
        assert_eq!(config.chunk_frames, 512);
    }

    #[test]
    fn test_load_missing_file() {
        let err = PlayerConfig::load("/no/such/wavplay.toml").unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn test_builder_overrides() {
        let config = PlayerConfig::default()
            .with_device("1")
            .with_chunk_frames(256)
            .with_progress(true);
        assert_eq!(config.device.as_deref(), Some("1"));
        assert_eq!(config.chunk_frames, 256);
        assert!(config.progress);
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = PlayerConfig::default().with_device("hw:0");
        let text = toml::to_string(&config).unwrap();
        assert_eq!(PlayerConfig::from_toml(&text).unwrap(), config);
    }
}
