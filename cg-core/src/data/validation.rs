//! Configuration validation
//!
//! Everything a daemon needs is checked once, before the first tick. Any
//! failure here is a configuration error and the process refuses to start.

use std::path::Path;
use std::time::Duration;

use crate::constants::{fan, limits};
use crate::data::config::{AlertConfig, Config, FanConfig, IdleConfig, ThermalConfig};
use crate::data::types::CurvePoint;
use crate::engine::Curve;
use crate::error::{CoolguardError, Result};

/// Validates every section
pub fn validate_config(config: &Config) -> Result<()> {
    validate_seconds("command_timeout_secs", config.command_timeout_secs, 0.001)?;
    validate_program("systemctl_bin", &config.systemctl_bin)?;
    validate_fan_config(&config.fan)?;
    validate_idle_config(&config.idle)?;
    validate_thermal_config(&config.thermal)?;
    validate_alert_config(&config.alert)?;
    Ok(())
}

pub fn validate_fan_config(config: &FanConfig) -> Result<()> {
    validate_program("fan.sensors_bin", &config.sensors_bin)?;
    validate_program("fan.liquidctl_bin", &config.liquidctl_bin)?;
    validate_seconds("fan.interval_secs", config.interval_secs, fan::MIN_INTERVAL_SECS)?;
    validate_curve_points(&config.curve_points())?;
    Curve::new(config.curve_points())?;

    if config.max_duty > 100 {
        return Err(CoolguardError::invalid_config(
            "fan.max_duty",
            format!("{} is above 100%", config.max_duty),
        ));
    }
    if config.min_duty > config.max_duty {
        return Err(CoolguardError::invalid_config(
            "fan.min_duty",
            format!("{} is above max_duty {}", config.min_duty, config.max_duty),
        ));
    }
    if !config.min_temp_change.is_finite() || config.min_temp_change < 0.0 {
        return Err(CoolguardError::invalid_config(
            "fan.min_temp_change",
            "must be a non-negative number",
        ));
    }
    Ok(())
}

pub fn validate_idle_config(config: &IdleConfig) -> Result<()> {
    if !(0.0..=100.0).contains(&config.threshold_percent) {
        return Err(CoolguardError::invalid_config(
            "idle.threshold_percent",
            format!("{} is not a percentage", config.threshold_percent),
        ));
    }
    validate_seconds("idle.sample_secs", config.sample_secs, 0.01)?;
    validate_seconds("idle.between_secs", config.between_secs, 0.0)?;

    if config.checks == 0 || config.checks > limits::MAX_CHECKS {
        return Err(CoolguardError::invalid_config(
            "idle.checks",
            format!("must be between 1 and {}", limits::MAX_CHECKS),
        ));
    }
    Ok(())
}

pub fn validate_thermal_config(config: &ThermalConfig) -> Result<()> {
    validate_program("thermal.sensors_bin", &config.sensors_bin)?;
    if !config.max_celsius.is_finite() {
        return Err(CoolguardError::invalid_config(
            "thermal.max_celsius",
            "must be a finite temperature",
        ));
    }
    if !config.state_dir.is_absolute() {
        return Err(CoolguardError::invalid_config(
            "thermal.state_dir",
            format!("{:?} is not an absolute path", config.state_dir),
        ));
    }
    Ok(())
}

pub fn validate_alert_config(config: &AlertConfig) -> Result<()> {
    if !config.is_enabled() {
        return Ok(());
    }
    validate_program("alert.mailer", &config.mailer)?;
    validate_seconds("alert.timeout_secs", config.timeout_secs, 0.001)?;

    if let Some(recipient) = &config.recipient {
        if !recipient.contains('@') || recipient.contains(char::is_whitespace) {
            return Err(CoolguardError::invalid_config(
                "alert.recipient",
                format!("{:?} is not a mail address", recipient),
            ));
        }
    }
    if let Some(command) = &config.credential_command {
        match command.first() {
            Some(program) => validate_program("alert.credential_command", program)?,
            None => {
                return Err(CoolguardError::invalid_config(
                    "alert.credential_command",
                    "must not be empty",
                ))
            }
        }
    }
    Ok(())
}

/// Validates curve points for consistency
///
/// Order does not matter here; the curve sorts on construction.
pub fn validate_curve_points(points: &[CurvePoint]) -> Result<()> {
    if points.is_empty() {
        return Err(CoolguardError::InvalidCurve(
            "curve must have at least one point".into(),
        ));
    }

    if points.len() > limits::MAX_CURVE_POINTS {
        return Err(CoolguardError::InvalidCurve(format!(
            "curve exceeds maximum of {} points",
            limits::MAX_CURVE_POINTS
        )));
    }

    let temp_range = limits::MIN_CURVE_TEMPERATURE..=limits::MAX_CURVE_TEMPERATURE;
    for (index, point) in points.iter().enumerate() {
        if !temp_range.contains(&point.temperature) {
            return Err(CoolguardError::InvalidCurve(format!(
                "curve point {} has invalid temperature: {}°C",
                index, point.temperature
            )));
        }
        if !(0.0..=100.0).contains(&point.duty) {
            return Err(CoolguardError::InvalidCurve(format!(
                "curve point {} has invalid duty: {}%",
                index, point.duty
            )));
        }
    }

    Ok(())
}

/// Validates config file size
pub fn validate_file_size(path: &Path) -> Result<()> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| CoolguardError::config(format!("cannot read file metadata: {}", e)))?;

    if metadata.len() > limits::MAX_CONFIG_SIZE {
        return Err(CoolguardError::config(format!(
            "config file exceeds maximum size of {} bytes",
            limits::MAX_CONFIG_SIZE
        )));
    }

    Ok(())
}

fn validate_seconds(field: &str, value: f64, min: f64) -> Result<()> {
    if !value.is_finite() || value < min {
        return Err(CoolguardError::invalid_config(
            field,
            format!("{} must be a number of seconds >= {}", value, min),
        ));
    }
    if Duration::try_from_secs_f64(value).is_err() {
        return Err(CoolguardError::invalid_config(
            field,
            format!("{} seconds is too long", value),
        ));
    }
    Ok(())
}

fn validate_program(field: &str, program: &str) -> Result<()> {
    if program.trim().is_empty() || program.contains('\0') {
        return Err(CoolguardError::invalid_config(field, "program name is empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_curve_points() {
        assert!(validate_curve_points(&[CurvePoint::new(30.0, 20.0)]).is_ok());
        assert!(validate_curve_points(&[]).is_err());
        assert!(validate_curve_points(&[CurvePoint::new(30.0, 120.0)]).is_err());
        assert!(validate_curve_points(&[CurvePoint::new(400.0, 50.0)]).is_err());
        assert!(validate_curve_points(&[CurvePoint::new(f64::NAN, 50.0)]).is_err());
    }

    #[test]
    fn test_inverted_clamp_bounds_rejected() {
        let mut config = Config::default();
        config.fan.min_duty = 80;
        config.fan.max_duty = 60;
        assert!(matches!(
            config.validate(),
            Err(CoolguardError::InvalidConfig { ref field, .. }) if field == "fan.min_duty"
        ));
    }

    #[test]
    fn test_idle_bounds() {
        let mut config = Config::default();
        config.idle.checks = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.idle.threshold_percent = 150.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_relative_state_dir_rejected() {
        let mut config = Config::default();
        config.thermal.state_dir = "run/coolguard".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unrepresentable_durations_rejected() {
        let mut config = Config::default();
        config.fan.interval_secs = 1e20;
        assert!(matches!(
            config.validate(),
            Err(CoolguardError::InvalidConfig { ref field, .. }) if field == "fan.interval_secs"
        ));

        let mut config = Config::default();
        config.command_timeout_secs = 1e20;
        assert!(matches!(
            config.validate(),
            Err(CoolguardError::InvalidConfig { ref field, .. }) if field == "command_timeout_secs"
        ));

        let mut config = Config::default();
        config.idle.between_secs = 1e20;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_accepted_durations_convert() {
        let mut config = Config::default();
        config.fan.interval_secs = 86_400.0 * 365.0;
        config.command_timeout_secs = 3600.0;
        assert!(config.validate().is_ok());
        assert_eq!(config.fan.interval(), Duration::from_secs(86_400 * 365));
        assert_eq!(config.command_timeout(), Duration::from_secs(3600));
    }

    #[test]
    fn test_alert_only_checked_when_enabled() {
        let mut config = Config::default();
        config.alert.mailer = String::new();
        assert!(config.validate().is_ok());

        config.alert.recipient = Some("not an address".into());
        assert!(config.validate().is_err());
    }
}
