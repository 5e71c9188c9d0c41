//! Surface configuration schema and loader
//!
//! Configuration is stored as YAML.
//! Default location: `<config dir>/lcxl/surface.yaml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Device/parameter name pair the bank looks up on every track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MacroTarget {
    /// Display name of the device to search for (exact, case-sensitive)
    pub device_name: String,

    /// Display name of the parameter to bind (exact, case-sensitive)
    pub parameter_name: String,
}

impl Default for MacroTarget {
    fn default() -> Self {
        Self {
            device_name: "Auto Filter".to_string(),
            parameter_name: "Frequency".to_string(),
        }
    }
}

/// Root surface configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceConfig {
    /// Number of encoder slots in the track-bank window
    pub bank_size: usize,

    /// Lookup target applied to every slot
    pub target: MacroTarget,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            bank_size: 8,
            target: MacroTarget::default(),
        }
    }
}

/// Get the default surface config file path
///
/// Returns: `<config dir>/lcxl/surface.yaml`
pub fn default_surface_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("lcxl")
        .join("surface.yaml")
}

/// Load surface configuration from a YAML file
///
/// If the file doesn't exist, returns the defaults.
/// If the file exists but is invalid, logs a warning and returns the defaults.
pub fn load_surface_config(path: &Path) -> SurfaceConfig {
    if !path.exists() {
        log::info!("load_surface_config: no config at {:?}, using defaults", path);
        return SurfaceConfig::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_yaml::from_str::<SurfaceConfig>(&contents) {
            Ok(config) => {
                log::info!(
                    "load_surface_config: {} slot(s), target '{}' / '{}'",
                    config.bank_size,
                    config.target.device_name,
                    config.target.parameter_name
                );
                config
            }
            Err(e) => {
                log::warn!("load_surface_config: failed to parse config: {}", e);
                SurfaceConfig::default()
            }
        },
        Err(e) => {
            log::warn!("load_surface_config: failed to read config file: {}", e);
            SurfaceConfig::default()
        }
    }
}

/// Save surface configuration to a YAML file
///
/// Creates parent directories if they don't exist.
pub fn save_surface_config(config: &SurfaceConfig, path: &Path) -> anyhow::Result<()> {
    use anyhow::Context;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }

    let yaml =
        serde_yaml::to_string(config).context("Failed to serialize surface config to YAML")?;

    std::fs::write(path, yaml)
        .with_context(|| format!("Failed to write surface config file: {:?}", path))?;

    log::info!("save_surface_config: saved to {:?}", path);
    Ok(())
}
