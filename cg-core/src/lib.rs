//! Coolguard Core Library
//!
//! Host health control for Linux: a fan curve controller, an idle shutdown
//! policy and a thermal shutdown policy, all driven by one control loop.
//!
//! # Module Structure
//!
//! - `engine/` - Pure decision logic (curve, hysteresis gate, condition timer)
//! - `data/` - Configuration, validation and the on-disk record store
//! - `hw/` - Probes, actuator and power control behind async traits
//! - `driver/` - Control policies and the loop that runs them
//!
//! # Example
//!
//! ```
//! use cg_core::{Curve, CurvePoint};
//!
//! let curve = Curve::new(vec![
//!     CurvePoint::new(30.0, 30.0),
//!     CurvePoint::new(50.0, 60.0),
//!     CurvePoint::new(80.0, 100.0),
//! ])
//! .unwrap();
//! assert_eq!(curve.evaluate(65.0), 80.0);
//! ```

// Grouped modules
pub mod data;
pub mod driver;
pub mod engine;
pub mod hw;

// Standalone modules
pub mod clock;
pub mod constants;
pub mod error;
pub mod notify;

// Re-export error types
pub use error::{CoolguardError, ErrorClass, Result};

// Re-export primary types from data/
pub use data::{
    Alert, AlertConfig, Config, Credential, CurvePoint, FanConfig, FileRecordStore, IdleConfig,
    MemoryRecordStore, RecordLock, RecordStore, ThermalConfig,
};

// Re-export validation functions from data/
pub use data::{
    validate_alert_config, validate_config, validate_curve_points, validate_fan_config,
    validate_file_size, validate_idle_config, validate_thermal_config,
};

// Re-export engine types
pub use engine::{
    clamp, evaluate, should_apply, Applied, ControlState, Curve, HysteresisGate,
    PersistentConditionTimer, TriggerDecision,
};

// Re-export collaborators from hw/
pub use hw::{
    Actuator, DryRunPower, ExternalCommand, LiquidctlActuator, PowerControl, ProcStatProbe,
    SensorsJsonProbe, SystemctlPower, TemperatureProbe, UtilizationProbe,
};

// Re-export control loop types
pub use driver::{
    ControlLoop, ControlPolicy, FanController, FanTick, IdleOutcome, IdleShutdown, LoopExit,
    RunMode, ShutdownHold, ShutdownSignal, ThermalOutcome, ThermalShutdown,
};

pub use clock::{Clock, ManualClock, SystemClock};
pub use notify::{
    AlertSender, CommandCredentialProvider, CredentialProvider, EnvCredentialProvider,
    MailCommandNotifier, Notifier,
};
