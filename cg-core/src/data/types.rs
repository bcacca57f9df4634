//! Core data types for Coolguard

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoolguardError;

/// A single curve breakpoint: at `temperature` °C the fan runs at `duty` %
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub temperature: f64,
    pub duty: f64,
}

impl CurvePoint {
    pub const fn new(temperature: f64, duty: f64) -> Self {
        Self { temperature, duty }
    }
}

impl From<(f64, f64)> for CurvePoint {
    fn from((temperature, duty): (f64, f64)) -> Self {
        Self { temperature, duty }
    }
}

/// Parses the command line form `T:D`, e.g. `50:60`
impl FromStr for CurvePoint {
    type Err = CoolguardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = |reason: &str| CoolguardError::MalformedPoint {
            input: s.to_string(),
            reason: reason.to_string(),
        };

        let (temp, duty) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| malformed("expected TEMP:DUTY"))?;

        let temperature: f64 = temp
            .trim()
            .parse()
            .map_err(|_| malformed("temperature is not a number"))?;
        let duty: f64 = duty
            .trim()
            .parse()
            .map_err(|_| malformed("duty is not a number"))?;

        if !temperature.is_finite() || !duty.is_finite() {
            return Err(malformed("values must be finite"));
        }

        Ok(Self { temperature, duty })
    }
}

impl fmt::Display for CurvePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.temperature, self.duty)
    }
}

/// A secret handed to the notifier; never printed
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// One alert message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}
