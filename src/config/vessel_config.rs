//! Vessel Configuration - device registry and engine tuning as TOML values
//!
//! The device registry replaces the per-tool device dictionaries: every
//! device an operator can ask about is listed once, with the table that holds
//! its telemetry and the role of each channel. Each struct implements
//! `Default` so a missing file (or a missing section) behaves exactly like the
//! shipped installation.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use super::defaults;
use crate::types::Side;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config I/O error ({}): {}", .0.display(), .1)]
    Io(PathBuf, std::io::Error),

    #[error("Config parse error ({}): {}", .0.display(), .1)]
    Parse(PathBuf, toml::de::Error),

    #[error("Config serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config validation failed:\n  - {}", .0.join("\n  - "))]
    Validation(Vec<String>),
}

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for one vessel installation.
///
/// Load with `VesselConfig::load()` which searches:
/// 1. `$DECKWATCH_CONFIG` env var
/// 2. `./deckwatch.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VesselConfig {
    #[serde(default)]
    pub vessel: VesselInfo,

    /// Where and how telemetry tables are read
    #[serde(default)]
    pub data: DataConfig,

    /// Audit tolerances
    #[serde(default)]
    pub audit: AuditConfig,

    /// Device registry
    #[serde(default = "default_devices")]
    pub devices: Vec<DeviceSpec>,
}

impl Default for VesselConfig {
    fn default() -> Self {
        Self {
            vessel: VesselInfo::default(),
            data: DataConfig::default(),
            audit: AuditConfig::default(),
            devices: default_devices(),
        }
    }
}

impl VesselConfig {
    /// Load configuration using the standard search order:
    /// 1. `$DECKWATCH_CONFIG` environment variable
    /// 2. `./deckwatch.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(defaults::CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), vessel = %config.vessel.name, "Loaded vessel config from DECKWATCH_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from DECKWATCH_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "DECKWATCH_CONFIG points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from(defaults::LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!(vessel = %config.vessel.name, "Loaded vessel config from ./deckwatch.toml");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./deckwatch.toml, using defaults");
                }
            }
        }

        info!("No deckwatch.toml found, using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse and validate a TOML document.
    ///
    /// Unknown keys are logged as warnings; range violations are errors.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(PathBuf::new(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate the registry and thresholds for internal consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let (errors, warnings) = super::validation::validate_physical_ranges(self);
        for w in &warnings {
            warn!("{}", w);
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Resolve a device by name or alias (ASCII case-insensitive).
    pub fn device(&self, id: &str) -> Option<&DeviceSpec> {
        self.devices.iter().find(|d| d.matches(id))
    }
}

// ============================================================================
// Sections
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VesselInfo {
    #[serde(default = "default_vessel_name")]
    pub name: String,
}

impl Default for VesselInfo {
    fn default() -> Self {
        Self {
            name: default_vessel_name(),
        }
    }
}

fn default_vessel_name() -> String {
    "Unnamed Vessel".to_string()
}

/// Telemetry table location and cell conventions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Directory holding `<table>.csv` files
    pub dir: PathBuf,
    /// Timestamp column name
    pub time_column: String,
    /// chrono layout of the timestamp column
    pub timestamp_format: String,
    /// Cell text the logger writes for an unreadable sensor
    pub unreadable_token: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(defaults::DEFAULT_DATA_DIR),
            time_column: defaults::DEFAULT_TIME_COLUMN.to_string(),
            timestamp_format: defaults::DEFAULT_TIMESTAMP_FORMAT.to_string(),
            unreadable_token: defaults::DEFAULT_UNREADABLE_TOKEN.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Port/starboard angle disagreement reported above this (degrees)
    pub angle_mismatch_tolerance_deg: f64,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            angle_mismatch_tolerance_deg: defaults::DEFAULT_ANGLE_MISMATCH_TOLERANCE_DEG,
        }
    }
}

// ============================================================================
// Device Registry
// ============================================================================

/// One queryable device and the role of each of its channels.
///
/// Which operations a device supports follows from which channels are set:
/// two current channels enable the dual-channel phase classifier, one enables
/// the single-channel switch detector, angle channels enable swing counting,
/// a power channel enables energy integration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceSpec {
    /// Canonical identifier
    pub name: String,
    /// Alternative identifiers operators use
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Table (CSV file stem) holding this device's telemetry
    pub table: String,
    /// Redundant current channels (one or two)
    #[serde(default)]
    pub current_channels: Vec<String>,
    #[serde(default)]
    pub angle_port: Option<String>,
    #[serde(default)]
    pub angle_starboard: Option<String>,
    /// Active power channel (kW)
    #[serde(default)]
    pub power_channel: Option<String>,
    /// Mean current at or below this is steady
    #[serde(default = "default_steady_threshold")]
    pub steady_threshold: f64,
    /// Consecutive steady samples that close a rise run
    #[serde(default = "default_steady_window")]
    pub steady_window: usize,
}

fn default_steady_threshold() -> f64 {
    defaults::DEFAULT_STEADY_THRESHOLD
}

fn default_steady_window() -> usize {
    defaults::DEFAULT_STEADY_WINDOW
}

impl DeviceSpec {
    /// Minimal registry entry for a device with no channels assigned yet.
    pub fn new(name: &str, table: &str) -> Self {
        Self {
            name: name.to_string(),
            aliases: Vec::new(),
            table: table.to_string(),
            current_channels: Vec::new(),
            angle_port: None,
            angle_starboard: None,
            power_channel: None,
            steady_threshold: defaults::DEFAULT_STEADY_THRESHOLD,
            steady_window: defaults::DEFAULT_STEADY_WINDOW,
        }
    }

    pub fn matches(&self, id: &str) -> bool {
        let id = id.trim();
        self.name.eq_ignore_ascii_case(id) || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(id))
    }

    /// Both channels of a dual-sensor current measurement, if configured.
    pub fn dual_current(&self) -> Option<(&str, &str)> {
        match self.current_channels.as_slice() {
            [a, b] => Some((a.as_str(), b.as_str())),
            _ => None,
        }
    }

    /// The single on/off channel: the only current channel, or the power
    /// channel for devices that have no current sensor.
    pub fn switch_channel(&self) -> Option<&str> {
        match self.current_channels.as_slice() {
            [single] => Some(single.as_str()),
            [] => self.power_channel.as_deref(),
            _ => None,
        }
    }

    pub fn angle_channel(&self, side: Side) -> Option<&str> {
        match side {
            Side::Port => self.angle_port.as_deref(),
            Side::Starboard => self.angle_starboard.as_deref(),
        }
    }

    /// Every channel this device reads, deduplicated.
    pub fn all_channels(&self) -> Vec<&str> {
        let mut channels: Vec<&str> = self.current_channels.iter().map(String::as_str).collect();
        for extra in [&self.angle_port, &self.angle_starboard, &self.power_channel]
            .into_iter()
            .flatten()
        {
            if !channels.contains(&extra.as_str()) {
                channels.push(extra);
            }
        }
        channels
    }
}

/// The registry shipped with the installation.
pub fn default_devices() -> Vec<DeviceSpec> {
    vec![
        DeviceSpec {
            aliases: vec!["A架".to_string(), "a-frame".to_string(), "aframe".to_string()],
            current_channels: vec!["Ajia-3_v".to_string(), "Ajia-5_v".to_string()],
            angle_port: Some("Ajia-1_v".to_string()),
            angle_starboard: Some("Ajia-0_v".to_string()),
            ..DeviceSpec::new("a_frame", "Ajia_plc_1")
        },
        DeviceSpec {
            aliases: vec!["折臂吊车".to_string(), "crane".to_string()],
            current_channels: vec!["13-11-6_v".to_string()],
            power_channel: Some("13-11-6_v".to_string()),
            steady_threshold: 7.0,
            steady_window: 3,
            ..DeviceSpec::new("folding_crane", "device_13_11_meter_1311")
        },
        DeviceSpec {
            aliases: vec!["定位设备".to_string(), "positioning".to_string()],
            current_channels: vec!["P3_33".to_string()],
            ..DeviceSpec::new("dp", "Port3_ksbg_9")
        },
        DeviceSpec {
            aliases: vec!["一号门架".to_string()],
            power_channel: Some("1-5-6_v".to_string()),
            ..DeviceSpec::new("gantry_1", "device_1_5_meter_105")
        },
        DeviceSpec {
            aliases: vec!["二号门架".to_string()],
            power_channel: Some("13-14-6_v".to_string()),
            ..DeviceSpec::new("gantry_2", "device_13_14_meter_1314")
        },
        DeviceSpec {
            aliases: vec!["绞车".to_string()],
            power_channel: Some("1-15-6_v".to_string()),
            ..DeviceSpec::new("winch", "device_1_15_meter_115")
        },
    ]
}
