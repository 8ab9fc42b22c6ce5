//! Configuration for the wavplay audio player.
//!
//! # Features
//!
//! - **Player settings**: [`PlayerConfig`] loaded from a TOML file
//! - **Paths**: platform-specific config directory and file resolution
//!
//! # Example
//!
//! ```rust,no_run
//! use wavplay_config::{PlayerConfig, resolve_config_path};
//!
//! let config = match resolve_config_path(None) {
//!     Some(path) => PlayerConfig::load(&path).unwrap(),
//!     None => PlayerConfig::default(),
//! };
//! println!("writing {} frames per chunk", config.chunk_frames);
//! ```

mod error;
mod player_config;

/// Platform-specific configuration paths.
pub mod paths;

pub use error::ConfigError;
pub use paths::{CONFIG_FILE_NAME, default_config_path, resolve_config_path, user_config_dir};
pub use player_config::{DEFAULT_CHUNK_FRAMES, DEFAULT_QUEUE_FRAMES, PlayerConfig};
