//! Data types, configuration, persistence and validation

mod config;
mod persistence;
mod types;
mod validation;

pub use config::{AlertConfig, Config, FanConfig, IdleConfig, ThermalConfig};
pub use persistence::{FileRecordStore, MemoryRecordStore, RecordLock, RecordStore};
pub use types::{Alert, Credential, CurvePoint};
pub use validation::{
    validate_alert_config, validate_config, validate_curve_points, validate_fan_config,
    validate_file_size, validate_idle_config, validate_thermal_config,
};
