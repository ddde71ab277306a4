//! StageKit Settings Crate
//!
//! Loads and saves rig configuration files and provides the built-in rig
//! presets.

pub mod config;
pub mod error;
pub mod presets;

pub use config::{default_config_dir, default_config_path, RigConfig, RigParts};
pub use error::{ConfigError, SettingsError, SettingsResult};
