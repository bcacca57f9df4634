//! Fan curve controller

use async_trait::async_trait;
use tracing::{debug, info};

use crate::data::FanConfig;
use crate::engine::{clamp, ControlState, Curve, HysteresisGate};
use crate::error::{CoolguardError, Result};
use crate::hw::{Actuator, TemperatureProbe};

use super::ControlPolicy;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FanTick {
    Applied { temperature: f64, duty: u8 },
    /// Change too small to be worth writing
    Suppressed { temperature: f64, duty: u8 },
}

pub struct FanController<P, A> {
    curve: Curve,
    min_duty: u8,
    max_duty: u8,
    gate: HysteresisGate,
    state: ControlState,
    probe: P,
    actuator: A,
}

impl<P: TemperatureProbe, A: Actuator> FanController<P, A> {
    /// Full duty range and no hysteresis until configured otherwise
    pub fn new(curve: Curve, probe: P, actuator: A) -> Self {
        Self {
            curve,
            min_duty: 0,
            max_duty: 100,
            gate: HysteresisGate::new(0.0, 0.0),
            state: ControlState::new(),
            probe,
            actuator,
        }
    }

    pub fn from_config(config: &FanConfig, probe: P, actuator: A) -> Result<Self> {
        let controller = Self::new(config.build_curve()?, probe, actuator)
            .with_duty_range(config.min_duty, config.max_duty)?
            .with_gate(HysteresisGate::new(
                config.min_temp_change,
                f64::from(config.min_duty_change),
            ));
        Ok(controller)
    }

    pub fn with_duty_range(mut self, min_duty: u8, max_duty: u8) -> Result<Self> {
        if min_duty > max_duty || max_duty > 100 {
            return Err(CoolguardError::invalid_config(
                "fan.min_duty",
                format!("duty range {}..={} is invalid", min_duty, max_duty),
            ));
        }
        self.min_duty = min_duty;
        self.max_duty = max_duty;
        Ok(self)
    }

    pub fn with_gate(mut self, gate: HysteresisGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn state(&self) -> &ControlState {
        &self.state
    }

    /// Clamped, rounded duty for `temperature`
    pub fn target_duty(&self, temperature: f64) -> u8 {
        let duty = clamp(
            self.curve.evaluate(temperature),
            f64::from(self.min_duty),
            f64::from(self.max_duty),
        );
        duty.round() as u8
    }
}

#[async_trait]
impl<P: TemperatureProbe, A: Actuator> ControlPolicy for FanController<P, A> {
    type Outcome = FanTick;

    fn name(&self) -> &'static str {
        "fan"
    }

    async fn tick(&mut self) -> Result<FanTick> {
        let temperature = self.probe.max_temperature().await?;
        if !temperature.is_finite() {
            return Err(CoolguardError::probe(format!("non-finite temperature {}", temperature)));
        }

        let duty = self.target_duty(temperature);

        if !self.gate.should_apply(temperature, f64::from(duty), &self.state) {
            debug!(temperature, duty, "Change below threshold, not applying");
            return Ok(FanTick::Suppressed { temperature, duty });
        }

        // State only moves once the actuator accepted the value
        self.actuator.set_duty(duty).await?;
        self.state.record(temperature, f64::from(duty));

        info!("Set fan speed to {}% for temp {:.1}°C", duty, temperature);
        Ok(FanTick::Applied { temperature, duty })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::CurvePoint;
    use crate::hw::{MockActuator, MockTemperatureProbe};
    use mockall::predicate::eq;
    use mockall::Sequence;

    fn default_curve() -> Curve {
        Curve::new(vec![
            CurvePoint::new(30.0, 30.0),
            CurvePoint::new(50.0, 60.0),
            CurvePoint::new(80.0, 100.0),
        ])
        .unwrap()
    }

    fn probe_returning(temps: Vec<f64>) -> MockTemperatureProbe {
        let mut probe = MockTemperatureProbe::new();
        let mut seq = Sequence::new();
        for t in temps {
            probe
                .expect_max_temperature()
                .times(1)
                .in_sequence(&mut seq)
                .returning(move || Ok(t));
        }
        probe
    }

    #[test]
    fn test_target_duty_clamps() {
        let controller = FanController::new(
            default_curve(),
            MockTemperatureProbe::new(),
            MockActuator::new(),
        )
        .with_duty_range(40, 90)
        .unwrap();

        assert_eq!(controller.target_duty(65.0), 80);
        assert_eq!(controller.target_duty(10.0), 40);
        assert_eq!(controller.target_duty(95.0), 90);
    }

    #[tokio::test]
    async fn test_hysteresis_suppresses_small_moves() {
        let probe = probe_returning(vec![65.0, 65.5, 70.0]);
        let mut actuator = MockActuator::new();
        actuator.expect_set_duty().with(eq(80)).times(1).returning(|_| Ok(()));
        actuator.expect_set_duty().with(eq(87)).times(1).returning(|_| Ok(()));

        let config = FanConfig::default();
        let mut controller = FanController::from_config(&config, probe, actuator).unwrap();

        assert_eq!(
            controller.tick().await.unwrap(),
            FanTick::Applied { temperature: 65.0, duty: 80 }
        );
        assert_eq!(
            controller.tick().await.unwrap(),
            FanTick::Suppressed { temperature: 65.5, duty: 81 }
        );
        assert_eq!(
            controller.tick().await.unwrap(),
            FanTick::Applied { temperature: 70.0, duty: 87 }
        );
    }

    #[tokio::test]
    async fn test_failed_actuation_leaves_state_untouched() {
        let probe = probe_returning(vec![65.0, 65.0]);
        let mut actuator = MockActuator::new();
        let mut seq = Sequence::new();
        actuator
            .expect_set_duty()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(CoolguardError::actuation("device busy")));
        actuator
            .expect_set_duty()
            .with(eq(80))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let mut controller =
            FanController::from_config(&FanConfig::default(), probe, actuator).unwrap();

        assert!(controller.tick().await.is_err());
        assert_eq!(controller.state().last(), None);

        // Same reading again: nothing was applied, so the gate is still open
        assert!(matches!(controller.tick().await.unwrap(), FanTick::Applied { duty: 80, .. }));
    }

    #[tokio::test]
    async fn test_probe_failure_does_not_actuate() {
        let mut probe = MockTemperatureProbe::new();
        probe
            .expect_max_temperature()
            .returning(|| Err(CoolguardError::NoReadings("empty".into())));
        let mut actuator = MockActuator::new();
        actuator.expect_set_duty().never();

        let mut controller =
            FanController::from_config(&FanConfig::default(), probe, actuator).unwrap();
        let err = controller.tick().await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_non_finite_reading_rejected() {
        let probe = probe_returning(vec![f64::NAN]);
        let mut actuator = MockActuator::new();
        actuator.expect_set_duty().never();

        let mut controller = FanController::new(default_curve(), probe, actuator);
        assert!(controller.tick().await.is_err());
    }
}
