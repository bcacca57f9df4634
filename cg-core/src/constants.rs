//! Constants and configuration defaults for Coolguard
//!
//! Centralizes every default and limit used by the daemons. The numeric
//! defaults match the behaviour operators are used to from the shell-era
//! tooling, so an empty config file changes nothing.

use std::time::Duration;

/// System paths
pub mod paths {
    /// Default configuration file
    pub const CONFIG_FILE: &str = "/etc/coolguard/config.json";

    /// Volatile state directory, cleared on every boot
    pub const STATE_DIR: &str = "/run/coolguard";

    /// Aggregate CPU counters
    pub const PROC_STAT: &str = "/proc/stat";

    /// Journald socket, present on systemd hosts
    pub const JOURNALD_SOCKET: &str = "/run/systemd/journal/socket";
}

/// Names of records kept in the state directory
pub mod records {
    /// Onset of the current over-temperature streak (epoch seconds)
    pub const THERMAL_ONSET: &str = "since_epoch";
}

/// External binaries
pub mod binaries {
    pub const SENSORS: &str = "sensors";
    pub const LIQUIDCTL: &str = "liquidctl";
    pub const SYSTEMCTL: &str = "systemctl";
    pub const MAILER: &str = "msmtp";
}

/// Bounds applied to every external call
pub mod timing {
    use super::Duration;

    /// Upper bound for a single probe, actuator or power command
    pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

    /// Upper bound for credential lookup plus mail delivery
    pub const ALERT_TIMEOUT: Duration = Duration::from_secs(20);
}

/// Fan controller defaults
pub mod fan {
    /// Default curve as (temperature °C, duty %) pairs
    pub const DEFAULT_CURVE: &[(f64, f64)] = &[(30.0, 30.0), (50.0, 60.0), (80.0, 100.0)];

    pub const DEFAULT_MIN_DUTY: u8 = 20;
    pub const DEFAULT_MAX_DUTY: u8 = 100;

    /// Minimum duty change (percentage points) before a new value is written
    pub const DEFAULT_MIN_DUTY_CHANGE: u8 = 2;

    /// Minimum temperature change (°C) before a new value is written
    pub const DEFAULT_MIN_TEMP_CHANGE: f64 = 1.0;

    pub const DEFAULT_INTERVAL_SECS: f64 = 30.0;

    /// Loop interval floor; anything shorter just hammers the sensor binary
    pub const MIN_INTERVAL_SECS: f64 = 0.5;
}

/// Idle shutdown defaults
pub mod idle {
    /// Busy percentage below which a round counts as idle
    pub const DEFAULT_THRESHOLD_PERCENT: f64 = 10.0;
    pub const DEFAULT_SAMPLE_SECS: f64 = 1.0;
    pub const DEFAULT_CHECKS: u32 = 6;
    pub const DEFAULT_BETWEEN_SECS: f64 = 10.0;
}

/// Thermal shutdown defaults
pub mod thermal {
    pub const DEFAULT_MAX_CELSIUS: f64 = 90.0;

    /// How long the temperature must stay at or above the limit
    pub const DEFAULT_PERSIST_SECS: u64 = 600;
}

/// Alert defaults
pub mod alert {
    /// Environment variable the mailer reads the credential from
    pub const SECRET_ENV: &str = "COOLGUARD_MAIL_SECRET";

    /// Environment variable consulted when no credential command is set
    pub const DEFAULT_CREDENTIAL_ENV: &str = "COOLGUARD_MAIL_PASSWORD";

    pub const SUBJECT_PREFIX: &str = "[coolguard]";
}

/// Input limits
pub mod limits {
    /// Maximum number of curve points
    pub const MAX_CURVE_POINTS: usize = 32;

    /// Plausible sensor range (°C); anything outside is a malformed breakpoint
    pub const MIN_CURVE_TEMPERATURE: f64 = -50.0;
    pub const MAX_CURVE_TEMPERATURE: f64 = 150.0;

    /// Maximum config file size (1MB)
    pub const MAX_CONFIG_SIZE: u64 = 1024 * 1024;

    /// Maximum number of idle rounds
    pub const MAX_CHECKS: u32 = 1000;

    /// Maximum length of a record key
    pub const MAX_RECORD_KEY_LEN: usize = 64;
}

/// Control loop behaviour
pub mod control {
    /// Log every Nth consecutive failure after the first
    pub const ERROR_LOG_EVERY: u32 = 10;
}
