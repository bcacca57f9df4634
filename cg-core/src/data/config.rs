//! Configuration management
//!
//! One JSON file configures all three daemons. Every field has a default, so
//! a missing file or a partial file is fine; command line flags are merged on
//! top by the daemon binary and the result is validated once at startup.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::constants::{alert, binaries, fan, idle, paths, thermal, timing};
use crate::data::types::CurvePoint;
use crate::data::validation::{validate_config, validate_file_size};
use crate::engine::Curve;
use crate::error::{CoolguardError, Result};

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Upper bound for any external command, in seconds
    pub command_timeout_secs: f64,
    pub systemctl_bin: String,
    pub fan: FanConfig,
    pub idle: IdleConfig,
    pub thermal: ThermalConfig,
    pub alert: AlertConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            command_timeout_secs: timing::COMMAND_TIMEOUT.as_secs_f64(),
            systemctl_bin: binaries::SYSTEMCTL.to_string(),
            fan: FanConfig::default(),
            idle: IdleConfig::default(),
            thermal: ThermalConfig::default(),
            alert: AlertConfig::default(),
        }
    }
}

impl Config {
    /// Load from `path`; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config file at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        validate_file_size(path)?;

        let contents = fs::read_to_string(path).map_err(|e| {
            CoolguardError::config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config: Config = serde_json::from_str(&contents)?;

        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Default config file location
    pub fn default_path() -> PathBuf {
        PathBuf::from(paths::CONFIG_FILE)
    }

    pub fn validate(&self) -> Result<()> {
        validate_config(self)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.command_timeout_secs)
    }
}

/// Fan curve controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FanConfig {
    pub sensors_bin: String,
    pub liquidctl_bin: String,
    pub interval_secs: f64,
    /// Breakpoints as `[temperature, duty]` pairs
    pub curve: Vec<(f64, f64)>,
    pub min_duty: u8,
    pub max_duty: u8,
    pub min_duty_change: u8,
    pub min_temp_change: f64,
}

impl Default for FanConfig {
    fn default() -> Self {
        Self {
            sensors_bin: binaries::SENSORS.to_string(),
            liquidctl_bin: binaries::LIQUIDCTL.to_string(),
            interval_secs: fan::DEFAULT_INTERVAL_SECS,
            curve: fan::DEFAULT_CURVE.to_vec(),
            min_duty: fan::DEFAULT_MIN_DUTY,
            max_duty: fan::DEFAULT_MAX_DUTY,
            min_duty_change: fan::DEFAULT_MIN_DUTY_CHANGE,
            min_temp_change: fan::DEFAULT_MIN_TEMP_CHANGE,
        }
    }
}

impl FanConfig {
    pub fn curve_points(&self) -> Vec<CurvePoint> {
        self.curve.iter().copied().map(CurvePoint::from).collect()
    }

    pub fn set_curve_points(&mut self, points: &[CurvePoint]) {
        self.curve = points.iter().map(|p| (p.temperature, p.duty)).collect();
    }

    /// Build the sorted curve
    pub fn build_curve(&self) -> Result<Curve> {
        Curve::new(self.curve_points())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(self.interval_secs)
    }
}

/// Idle shutdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdleConfig {
    /// Busy percentage at or above which the host counts as in use
    pub threshold_percent: f64,
    /// Length of each utilization measurement
    pub sample_secs: f64,
    /// Number of consecutive idle rounds required
    pub checks: u32,
    /// Pause between rounds
    pub between_secs: f64,
    pub proc_stat: PathBuf,
}

impl Default for IdleConfig {
    fn default() -> Self {
        Self {
            threshold_percent: idle::DEFAULT_THRESHOLD_PERCENT,
            sample_secs: idle::DEFAULT_SAMPLE_SECS,
            checks: idle::DEFAULT_CHECKS,
            between_secs: idle::DEFAULT_BETWEEN_SECS,
            proc_stat: PathBuf::from(paths::PROC_STAT),
        }
    }
}

impl IdleConfig {
    pub fn sample_window(&self) -> Duration {
        Duration::from_secs_f64(self.sample_secs)
    }

    pub fn between(&self) -> Duration {
        Duration::from_secs_f64(self.between_secs)
    }
}

/// Thermal shutdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThermalConfig {
    pub sensors_bin: String,
    pub max_celsius: f64,
    pub persist_secs: u64,
    /// Volatile directory for the onset record
    pub state_dir: PathBuf,
}

impl Default for ThermalConfig {
    fn default() -> Self {
        Self {
            sensors_bin: binaries::SENSORS.to_string(),
            max_celsius: thermal::DEFAULT_MAX_CELSIUS,
            persist_secs: thermal::DEFAULT_PERSIST_SECS,
            state_dir: PathBuf::from(paths::STATE_DIR),
        }
    }
}

impl ThermalConfig {
    pub fn persist(&self) -> Duration {
        Duration::from_secs(self.persist_secs)
    }
}

/// Optional mail alert sent before a thermal shutdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// No recipient means no alert
    pub recipient: Option<String>,
    /// sendmail-compatible program reading the message on stdin
    pub mailer: String,
    pub mailer_args: Vec<String>,
    /// Command printing the mail credential on stdout, e.g.
    /// `["secret-tool", "lookup", "service", "coolguard"]`
    pub credential_command: Option<Vec<String>>,
    /// Environment variable holding the credential when no command is set
    pub credential_env: String,
    pub timeout_secs: f64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            recipient: None,
            mailer: binaries::MAILER.to_string(),
            mailer_args: vec!["-t".to_string()],
            credential_command: None,
            credential_env: alert::DEFAULT_CREDENTIAL_ENV.to_string(),
            timeout_secs: timing::ALERT_TIMEOUT.as_secs_f64(),
        }
    }
}

impl AlertConfig {
    pub fn is_enabled(&self) -> bool {
        self.recipient.as_deref().map_or(false, |r| !r.trim().is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_secs)
    }
}
