//! Temperature probe backed by `sensors -j`
//!
//! lm-sensors prints a nested JSON document per chip. The probe walks the
//! whole tree and keeps the highest `tempN_input` value, so the rest of the
//! crate only ever sees "the hottest reading right now".
//!
//! Other `*_input` keys (`fanN_input` in RPM, `inN_input` in volts) are
//! skipped. Counting them would let a fan spinning at 1200 RPM read as a
//! 1200°C sensor.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::constants::{binaries, timing};
use crate::error::{CoolguardError, Result};
use crate::hw::command::ExternalCommand;

/// Source of the current maximum temperature
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TemperatureProbe: Send + Sync {
    /// Hottest temperature currently reported, in °C
    async fn max_temperature(&self) -> Result<f64>;
}

#[derive(Debug, Clone)]
pub struct SensorsJsonProbe {
    sensors_bin: String,
    timeout: Duration,
}

impl SensorsJsonProbe {
    pub fn new(sensors_bin: impl Into<String>) -> Self {
        Self {
            sensors_bin: sensors_bin.into(),
            timeout: timing::COMMAND_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for SensorsJsonProbe {
    fn default() -> Self {
        Self::new(binaries::SENSORS)
    }
}

#[async_trait]
impl TemperatureProbe for SensorsJsonProbe {
    async fn max_temperature(&self) -> Result<f64> {
        let output = ExternalCommand::new(&self.sensors_bin)
            .arg("-j")
            .timeout(self.timeout)
            .output()
            .await
            .map_err(|e| CoolguardError::probe(e.to_string()))?;

        let max = parse_sensors_json(&output).map_err(|e| match e {
            CoolguardError::NoReadings(_) => CoolguardError::NoReadings(format!(
                "no temp*_input fields found in {} -j output",
                self.sensors_bin
            )),
            other => other,
        })?;

        debug!(sensors = %self.sensors_bin, max_celsius = max, "Read temperature");
        Ok(max)
    }
}

/// Maximum temperature in a `sensors -j` document
pub fn parse_sensors_json(output: &str) -> Result<f64> {
    let value: Value = serde_json::from_str(output)
        .map_err(|e| CoolguardError::probe(format!("sensors output is not valid JSON: {}", e)))?;

    max_temperature_input(&value)
        .ok_or_else(|| CoolguardError::NoReadings("no temp*_input fields found".into()))
}

/// Walk the tree and return the highest numeric `temp*_input` field
///
/// Fan (`fanN_input`) and voltage (`inN_input`) readings are not temperatures
/// and are skipped.
pub fn max_temperature_input(value: &Value) -> Option<f64> {
    match value {
        Value::Object(map) => map
            .iter()
            .filter_map(|(key, child)| {
                if is_temperature_input(key) {
                    child.as_f64().or_else(|| max_temperature_input(child))
                } else {
                    max_temperature_input(child)
                }
            })
            .reduce(f64::max),
        Value::Array(items) => items.iter().filter_map(max_temperature_input).reduce(f64::max),
        _ => None,
    }
}

fn is_temperature_input(key: &str) -> bool {
    key.starts_with("temp") && key.ends_with("_input")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SENSORS_OUTPUT: &str = r#"{
        "k10temp-pci-00c3": {
            "Adapter": "PCI adapter",
            "Tctl": { "temp1_input": 48.875 },
            "Tccd1": { "temp3_input": 61.25 }
        },
        "nct6798-isa-0290": {
            "Adapter": "ISA adapter",
            "in0": { "in0_input": 1.02, "in0_min": 0.0 },
            "fan1": { "fan1_input": 1180.0, "fan1_min": 0.0 },
            "SYSTIN": { "temp1_input": 34.0, "temp1_max": 80.0 }
        },
        "nvme-pci-0100": {
            "Adapter": "PCI adapter",
            "Composite": { "temp1_input": 44.85, "temp1_crit": 84.85 }
        }
    }"#;

    #[test]
    fn test_max_temperature_ignores_fans_and_limits() {
        assert_eq!(parse_sensors_json(SENSORS_OUTPUT).unwrap(), 61.25);
    }

    #[test]
    fn test_walks_arrays() {
        let value: Value = serde_json::json!([
            { "a": { "temp1_input": 40 } },
            [ { "temp2_input": 72.5 } ]
        ]);
        assert_eq!(max_temperature_input(&value), Some(72.5));
    }

    #[test]
    fn test_no_readings() {
        let err = parse_sensors_json(r#"{ "chip": { "fan1": { "fan1_input": 900 } } }"#).unwrap_err();
        assert!(matches!(err, CoolguardError::NoReadings(_)));
    }

    #[test]
    fn test_invalid_json_is_probe_error() {
        let err = parse_sensors_json("Can't access procfs/sysfs file").unwrap_err();
        assert!(matches!(err, CoolguardError::ProbeUnavailable(_)));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_missing_binary_is_probe_error() {
        let probe = SensorsJsonProbe::new("/nonexistent/sensors");
        let err = probe.max_temperature().await.unwrap_err();
        assert!(matches!(err, CoolguardError::ProbeUnavailable(_)));
    }
}
