//! Rig configuration
//!
//! A [`RigConfig`] describes one physical rig: how to reach its controller,
//! how its logical axes are wired, how the engine should drive it, and the
//! profile replayed at connect. Files are TOML or JSON, chosen by extension.

use crate::error::{ConfigError, SettingsError, SettingsResult};
use serde::{Deserialize, Serialize};
use stagekit_communication::{
    ConnectionParams, ControllerProfile, EngineConfig, ProfileSettings, ProtocolEngine, Transport,
};
use stagekit_core::AxisMap;
use std::path::{Path, PathBuf};

/// File name used inside the config directory
pub const CONFIG_FILE_NAME: &str = "rig.toml";

/// Everything needed to build an engine for one rig
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigConfig {
    /// Display name
    pub name: String,
    /// Serial connection
    pub connection: ConnectionParams,
    /// Logical to physical axis wiring
    pub axis_map: AxisMap,
    /// Engine behaviour
    pub engine: EngineConfig,
    /// Configuration replayed at connect
    pub profile: ProfileSettings,
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            connection: ConnectionParams::default(),
            axis_map: AxisMap::identity(),
            engine: EngineConfig::default(),
            profile: ProfileSettings::default(),
        }
    }
}

/// A validated config split into the pieces the engine consumes
#[derive(Debug, Clone)]
pub struct RigParts {
    pub connection: ConnectionParams,
    pub axis_map: AxisMap,
    pub engine: EngineConfig,
    pub profile: ControllerProfile,
}

enum Format {
    Json,
    Toml,
}

fn format_for(path: &Path) -> Result<Format, ConfigError> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => Ok(Format::Json),
        Some("toml") => Ok(Format::Toml),
        other => Err(ConfigError::UnsupportedFormat(
            other.unwrap_or("<none>").to_string(),
        )),
    }
}

impl RigConfig {
    /// Load and validate a config file
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let format = format_for(path)?;
        let content = std::fs::read_to_string(path)?;

        let config: Self = match format {
            Format::Json => serde_json::from_str(&content)?,
            Format::Toml => toml::from_str(&content)?,
        };

        config.validate()?;
        tracing::info!("Loaded rig '{}' from {}", config.name, path.display());
        Ok(config)
    }

    /// Validate and write a config file, creating parent directories
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;

        let content = match format_for(path)? {
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Toml => toml::to_string_pretty(self)?,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        tracing::debug!("Saved rig '{}' to {}", self.name, path.display());
        Ok(())
    }

    /// Check the config can drive a rig
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.connection.baud_rate == 0 {
            return Err(ConfigError::ValueOutOfRange {
                key: "connection.baud_rate".to_string(),
                value: "0".to_string(),
            });
        }

        if !(5..=8).contains(&self.connection.data_bits) {
            return Err(ConfigError::ValueOutOfRange {
                key: "connection.data_bits".to_string(),
                value: self.connection.data_bits.to_string(),
            });
        }

        if !(1..=2).contains(&self.connection.stop_bits) {
            return Err(ConfigError::ValueOutOfRange {
                key: "connection.stop_bits".to_string(),
                value: self.connection.stop_bits.to_string(),
            });
        }

        let timeouts = &self.engine.timeouts;
        for (key, ms) in [
            ("engine.timeouts.motion_ms", timeouts.motion_ms),
            ("engine.timeouts.homing_ms", timeouts.homing_ms),
            ("engine.timeouts.program_ms", timeouts.program_ms),
            ("engine.timeouts.configuration_ms", timeouts.configuration_ms),
        ] {
            if ms == 0 {
                return Err(ConfigError::ValueOutOfRange {
                    key: key.to_string(),
                    value: "0".to_string(),
                });
            }
        }

        self.engine.validate()?;
        for request in &self.engine.park {
            for axis in request.targets.keys() {
                self.axis_map.physical(*axis)?;
            }
        }
        ControllerProfile::from_settings(&self.profile)?;
        Ok(())
    }

    /// Validate and split into engine inputs
    pub fn into_parts(self) -> Result<RigParts, ConfigError> {
        self.validate()?;
        let profile = ControllerProfile::from_settings(&self.profile)?;
        Ok(RigParts {
            connection: self.connection,
            axis_map: self.axis_map,
            engine: self.engine,
            profile,
        })
    }

    /// Build an engine for this rig on the given transport
    ///
    /// The engine is not connected; pass the returned profile to
    /// [`ProtocolEngine::connect`].
    pub fn build_engine(
        &self,
        transport: impl Transport + 'static,
    ) -> Result<(ProtocolEngine, ControllerProfile), ConfigError> {
        let parts = self.clone().into_parts()?;
        let engine = ProtocolEngine::new(transport, parts.axis_map, parts.engine)?;
        Ok((engine, parts.profile))
    }
}

/// Directory holding StageKit configuration
pub fn default_config_dir() -> SettingsResult<PathBuf> {
    dirs::config_dir()
        .or_else(dirs::home_dir)
        .map(|dir| dir.join("stagekit"))
        .ok_or_else(|| SettingsError::ConfigDirectory("no config or home directory".to_string()))
}

/// Default rig config file
pub fn default_config_path() -> SettingsResult<PathBuf> {
    Ok(default_config_dir()?.join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        RigConfig::default().validate().unwrap();
    }

    #[test]
    fn test_zero_baud_rejected() {
        let mut config = RigConfig::default();
        config.connection.baud_rate = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValueOutOfRange { .. })
        ));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = RigConfig::default();
        config.engine.timeouts.homing_ms = 0;
        match config.validate() {
            Err(ConfigError::ValueOutOfRange { key, .. }) => {
                assert_eq!(key, "engine.timeouts.homing_ms")
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_blank_extra_command_rejected() {
        let mut config = RigConfig::default();
        config.profile.extra_commands.push("   ".to_string());
        assert!(matches!(config.validate(), Err(ConfigError::InvalidRig(_))));
    }

    #[test]
    fn test_unknown_extension() {
        let err = RigConfig::load_from_file(Path::new("rig.yaml")).unwrap_err();
        assert!(matches!(
            err,
            SettingsError::Config(ConfigError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_into_parts_builds_profile() {
        let parts = RigConfig::default().into_parts().unwrap();
        let texts: Vec<&str> = parts.profile.commands().iter().map(|c| c.text()).collect();
        assert_eq!(texts, vec!["G21"]);
    }

    #[test]
    fn test_default_config_path() {
        if let Ok(path) = default_config_path() {
            assert!(path.ends_with("stagekit/rig.toml"));
        }
    }
}
