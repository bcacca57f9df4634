//! Write suppression for noisy sensors
//!
//! A new duty is only written when the temperature AND the duty both moved
//! enough since the last value that was actually applied. Requiring both keeps
//! sensor noise on a steep curve segment from reaching the actuator.

/// Returns true when both deltas meet their thresholds
pub fn should_apply(
    current_input: f64,
    current_output: f64,
    last_input: f64,
    last_output: f64,
    min_input_delta: f64,
    min_output_delta: f64,
) -> bool {
    (current_input - last_input).abs() >= min_input_delta
        && (current_output - last_output).abs() >= min_output_delta
}

/// Last value pair that reached the actuator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Applied {
    pub input: f64,
    pub output: f64,
}

/// In-memory control state of the fan loop
///
/// Starts empty so that the very first sample is always applied.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ControlState {
    last: Option<Applied>,
}

impl ControlState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<Applied> {
        self.last
    }

    /// Record a value that the actuator accepted
    pub fn record(&mut self, input: f64, output: f64) {
        self.last = Some(Applied { input, output });
    }
}

/// Dual-threshold gate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HysteresisGate {
    min_input_delta: f64,
    min_output_delta: f64,
}

impl HysteresisGate {
    pub fn new(min_input_delta: f64, min_output_delta: f64) -> Self {
        Self {
            min_input_delta: min_input_delta.max(0.0),
            min_output_delta: min_output_delta.max(0.0),
        }
    }

    /// Decide whether `(input, output)` should be written given `state`
    pub fn should_apply(&self, input: f64, output: f64, state: &ControlState) -> bool {
        match state.last() {
            None => true,
            Some(last) => should_apply(
                input,
                output,
                last.input,
                last.output,
                self.min_input_delta,
                self.min_output_delta,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_delta_below_threshold_suppresses() {
        assert!(!should_apply(51.0, 61.0, 50.0, 60.0, 1.0, 2.0));
    }

    #[test]
    fn test_input_delta_below_threshold_suppresses() {
        // Large duty swing from half a degree of noise on a steep segment
        assert!(!should_apply(50.5, 70.0, 50.0, 60.0, 1.0, 2.0));
    }

    #[test]
    fn test_both_deltas_at_threshold_apply() {
        assert!(should_apply(51.0, 62.0, 50.0, 60.0, 1.0, 2.0));
        assert!(should_apply(49.0, 58.0, 50.0, 60.0, 1.0, 2.0));
    }

    #[test]
    fn test_gate_opens_on_first_sample() {
        let gate = HysteresisGate::new(1.0, 2.0);
        let mut state = ControlState::new();
        assert!(gate.should_apply(20.0, 20.0, &state));

        state.record(20.0, 20.0);
        assert!(!gate.should_apply(20.0, 20.0, &state));
        assert!(gate.should_apply(25.0, 28.0, &state));
    }

    #[test]
    fn test_zero_thresholds_always_apply() {
        let gate = HysteresisGate::new(0.0, 0.0);
        let mut state = ControlState::new();
        state.record(40.0, 50.0);
        assert!(gate.should_apply(40.0, 50.0, &state));
    }
}
