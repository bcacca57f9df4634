//! Control engine
//!
//! Pure decision logic: the fan curve, the write-suppression gate and the
//! persistent condition timer. Nothing in here talks to hardware.

mod curve;
mod hysteresis;
mod timer;

pub use curve::{clamp, evaluate, Curve};
pub use hysteresis::{should_apply, Applied, ControlState, HysteresisGate};
pub use timer::{PersistentConditionTimer, TriggerDecision};
