//! Host collaborators
//!
//! Everything that touches the machine: temperature and CPU probes, the fan
//! actuator and power control. Each sits behind a small async trait so the
//! control policies can be driven by test doubles.

mod actuator;
mod command;
mod cpu;
mod power;
mod sensors;

pub use actuator::{Actuator, LiquidctlActuator};
pub use command::ExternalCommand;
pub use cpu::{utilization_percent, CpuTimes, ProcStatProbe, UtilizationProbe};
pub use power::{DryRunPower, PowerControl, SystemctlPower};
pub use sensors::{max_temperature_input, parse_sensors_json, SensorsJsonProbe, TemperatureProbe};

#[cfg(test)]
pub use actuator::MockActuator;
#[cfg(test)]
pub use cpu::MockUtilizationProbe;
#[cfg(test)]
pub use power::MockPowerControl;
#[cfg(test)]
pub use sensors::MockTemperatureProbe;
