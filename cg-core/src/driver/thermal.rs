//! Thermal shutdown
//!
//! Powers the host off once the hottest sensor has stayed at or above the
//! limit for the configured duration. The streak onset is persisted, so the
//! policy works the same whether it runs in a loop or once per timer firing.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, warn};

use crate::clock::Clock;
use crate::data::RecordStore;
use crate::engine::{PersistentConditionTimer, TriggerDecision};
use crate::error::{CoolguardError, Result};
use crate::hw::{PowerControl, TemperatureProbe};
use crate::notify::AlertSender;

use super::{request_power_off, ControlPolicy, ShutdownSignal};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThermalOutcome {
    Normal { temperature: f64 },
    /// Over the limit, shutdown in `remaining` seconds if it stays there
    Hot { temperature: f64, hot_for: u64, remaining: u64 },
    ShutdownRequested {
        temperature: f64,
        hot_for: u64,
        alerted: bool,
        powered_off: bool,
    },
}

pub struct ThermalShutdown<T, S, C, P> {
    probe: T,
    timer: PersistentConditionTimer<S>,
    clock: C,
    power: P,
    max_celsius: f64,
    alert: Option<AlertSender>,
    shutdown: Option<Arc<ShutdownSignal>>,
}

impl<T, S, C, P> ThermalShutdown<T, S, C, P>
where
    T: TemperatureProbe,
    S: RecordStore + Send + Sync,
    C: Clock + Send + Sync,
    P: PowerControl,
{
    pub fn new(
        probe: T,
        store: S,
        clock: C,
        power: P,
        max_celsius: f64,
        persist: Duration,
    ) -> Self {
        Self {
            probe,
            timer: PersistentConditionTimer::new(
                store,
                crate::constants::records::THERMAL_ONSET,
                persist,
            ),
            clock,
            power,
            max_celsius,
            alert: None,
            shutdown: None,
        }
    }

    pub fn with_alert(mut self, alert: Option<AlertSender>) -> Self {
        self.alert = alert;
        self
    }

    /// Keep `shutdown` from interrupting an alert and power off in progress
    pub fn with_shutdown(mut self, shutdown: Arc<ShutdownSignal>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn timer(&self) -> &PersistentConditionTimer<S> {
        &self.timer
    }

    async fn shut_down(&self, temperature: f64, hot_for: u64) -> ThermalOutcome {
        let _hold = self.shutdown.as_ref().map(|signal| signal.hold());
        let message = format!(
            "Temp {:.1}C >= {:.1}C for {}s; powering off.",
            temperature, self.max_celsius, hot_for
        );
        error!(temperature, max_celsius = self.max_celsius, hot_for, "{}", message);

        let alerted = match &self.alert {
            Some(alert) => alert.send_best_effort("Thermal shutdown", &message).await,
            None => false,
        };
        let powered_off = request_power_off(&self.power).await;

        ThermalOutcome::ShutdownRequested {
            temperature,
            hot_for,
            alerted,
            powered_off,
        }
    }
}

#[async_trait]
impl<T, S, C, P> ControlPolicy for ThermalShutdown<T, S, C, P>
where
    T: TemperatureProbe,
    S: RecordStore + Send + Sync,
    C: Clock + Send + Sync,
    P: PowerControl,
{
    type Outcome = ThermalOutcome;

    fn name(&self) -> &'static str {
        "thermal"
    }

    async fn tick(&mut self) -> Result<ThermalOutcome> {
        let temperature = self.probe.max_temperature().await?;
        if !temperature.is_finite() {
            return Err(CoolguardError::probe(format!("non-finite temperature {}", temperature)));
        }

        let hot = temperature >= self.max_celsius;
        let decision = self.timer.evaluate(hot, self.clock.now())?;

        match decision {
            TriggerDecision::Clear => Ok(ThermalOutcome::Normal { temperature }),
            TriggerDecision::Pending { elapsed, .. } => {
                let remaining = self.timer.required_secs().saturating_sub(elapsed);
                warn!(
                    "Temp {:.1}C >= {:.1}C for {}s, powering off in {}s unless it drops",
                    temperature, self.max_celsius, elapsed, remaining
                );
                Ok(ThermalOutcome::Hot {
                    temperature,
                    hot_for: elapsed,
                    remaining,
                })
            }
            TriggerDecision::Triggered { elapsed, .. } => Ok(self.shut_down(temperature, elapsed).await),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::data::{Credential, MemoryRecordStore};
    use crate::hw::{MockPowerControl, MockTemperatureProbe};
    use crate::notify::{MockCredentialProvider, MockNotifier};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    /// Probe whose reading the test can change between ticks
    struct Dial(Arc<AtomicU64>);

    impl Dial {
        fn new(celsius: f64) -> (Self, Arc<AtomicU64>) {
            let value = Arc::new(AtomicU64::new(celsius.to_bits()));
            (Self(Arc::clone(&value)), value)
        }
    }

    #[async_trait]
    impl TemperatureProbe for Dial {
        async fn max_temperature(&self) -> Result<f64> {
            Ok(f64::from_bits(self.0.load(Ordering::SeqCst)))
        }
    }

    fn set(dial: &AtomicU64, celsius: f64) {
        dial.store(celsius.to_bits(), Ordering::SeqCst);
    }

    #[tokio::test]
    async fn test_powers_off_after_persistent_heat() {
        let store = MemoryRecordStore::new();
        let clock = Arc::new(ManualClock::new(1_000));
        let (probe, _dial) = Dial::new(95.0);
        let mut power = MockPowerControl::new();
        power.expect_power_off().times(1).returning(|| Ok(()));

        let mut policy = ThermalShutdown::new(
            probe,
            &store,
            Arc::clone(&clock),
            power,
            90.0,
            Duration::from_secs(600),
        );

        assert_eq!(
            policy.tick().await.unwrap(),
            ThermalOutcome::Hot { temperature: 95.0, hot_for: 0, remaining: 600 }
        );
        clock.advance(599);
        assert!(matches!(policy.tick().await.unwrap(), ThermalOutcome::Hot { remaining: 1, .. }));

        clock.advance(1);
        assert_eq!(
            policy.tick().await.unwrap(),
            ThermalOutcome::ShutdownRequested {
                temperature: 95.0,
                hot_for: 600,
                alerted: false,
                powered_off: true,
            }
        );
    }

    #[tokio::test]
    async fn test_cooling_down_resets_streak() {
        let store = MemoryRecordStore::new();
        let clock = Arc::new(ManualClock::new(0));
        let (probe, dial) = Dial::new(92.0);
        let mut power = MockPowerControl::new();
        power.expect_power_off().never();

        let mut policy = ThermalShutdown::new(
            probe,
            &store,
            Arc::clone(&clock),
            power,
            90.0,
            Duration::from_secs(600),
        );

        policy.tick().await.unwrap();
        clock.set(300);
        set(&dial, 89.9);
        assert_eq!(policy.tick().await.unwrap(), ThermalOutcome::Normal { temperature: 89.9 });
        assert!(store.is_empty());

        clock.set(305);
        set(&dial, 90.0);
        policy.tick().await.unwrap();
        clock.set(700);
        assert!(matches!(
            policy.tick().await.unwrap(),
            ThermalOutcome::Hot { hot_for: 395, .. }
        ));
    }

    #[tokio::test]
    async fn test_alert_sent_before_power_off() {
        let store = MemoryRecordStore::new();
        let clock = ManualClock::new(50);
        let mut probe = MockTemperatureProbe::new();
        probe.expect_max_temperature().returning(|| Ok(101.0));

        let mut seq = mockall::Sequence::new();
        let mut credentials = MockCredentialProvider::new();
        credentials
            .expect_credential()
            .returning(|| Ok(Credential::new("pw")));
        let mut notifier = MockNotifier::new();
        notifier
            .expect_send()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|alert, _| alert.body.contains("101.0C >= 90.0C"))
            .returning(|_, _| Ok(()));
        let mut power = MockPowerControl::new();
        power
            .expect_power_off()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));

        let alert = AlertSender::new("ops@example.com", credentials, notifier);
        let mut policy =
            ThermalShutdown::new(probe, &store, clock, power, 90.0, Duration::ZERO)
                .with_alert(Some(alert));

        assert!(matches!(
            policy.tick().await.unwrap(),
            ThermalOutcome::ShutdownRequested { alerted: true, powered_off: true, .. }
        ));
    }

    #[tokio::test]
    async fn test_alert_failure_does_not_block_power_off() {
        let store = MemoryRecordStore::new();
        let mut probe = MockTemperatureProbe::new();
        probe.expect_max_temperature().returning(|| Ok(99.0));
        let mut credentials = MockCredentialProvider::new();
        credentials
            .expect_credential()
            .returning(|| Err(CoolguardError::Credential("keyring locked".into())));
        let mut notifier = MockNotifier::new();
        notifier.expect_send().never();
        let mut power = MockPowerControl::new();
        power.expect_power_off().times(1).returning(|| Ok(()));

        let alert = AlertSender::new("ops@example.com", credentials, notifier);
        let mut policy =
            ThermalShutdown::new(probe, &store, ManualClock::new(0), power, 90.0, Duration::ZERO)
                .with_alert(Some(alert));

        assert!(matches!(
            policy.tick().await.unwrap(),
            ThermalOutcome::ShutdownRequested { alerted: false, powered_off: true, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_signal_during_alert_still_powers_off() {
        use crate::data::Alert;
        use crate::driver::{ControlLoop, LoopExit, RunMode};
        use crate::notify::Notifier;

        struct SlowMailer;

        #[async_trait]
        impl Notifier for SlowMailer {
            async fn send(&self, _alert: &Alert, _credential: &Credential) -> Result<()> {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            }
        }

        let store = MemoryRecordStore::new();
        let mut probe = MockTemperatureProbe::new();
        probe.expect_max_temperature().returning(|| Ok(97.0));
        let mut credentials = MockCredentialProvider::new();
        credentials
            .expect_credential()
            .returning(|| Ok(Credential::new("pw")));
        let mut power = MockPowerControl::new();
        power.expect_power_off().times(1).returning(|| Ok(()));

        let shutdown = Arc::new(ShutdownSignal::new());
        let alert = AlertSender::new("ops@example.com", credentials, SlowMailer)
            .with_timeout(Duration::from_secs(20));
        let policy =
            ThermalShutdown::new(probe, &store, ManualClock::new(0), power, 90.0, Duration::ZERO)
                .with_alert(Some(alert))
                .with_shutdown(Arc::clone(&shutdown));
        let mut control =
            ControlLoop::new(policy, RunMode::SingleShot).with_shutdown(Arc::clone(&shutdown));

        let trigger = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            shutdown.trigger();
        });

        assert!(matches!(
            control.run().await.unwrap(),
            LoopExit::Completed(ThermalOutcome::ShutdownRequested {
                alerted: true,
                powered_off: true,
                ..
            })
        ));
        trigger.await.unwrap();
    }

    #[tokio::test]
    async fn test_probe_failure_leaves_record_alone() {
        let store = MemoryRecordStore::new();
        store.write(crate::constants::records::THERMAL_ONSET, "10\n").unwrap();

        let mut probe = MockTemperatureProbe::new();
        probe
            .expect_max_temperature()
            .returning(|| Err(CoolguardError::NoReadings("no inputs".into())));
        let mut power = MockPowerControl::new();
        power.expect_power_off().never();

        let mut policy = ThermalShutdown::new(
            probe,
            &store,
            ManualClock::new(20),
            power,
            90.0,
            Duration::from_secs(600),
        );

        assert!(policy.tick().await.is_err());
        assert_eq!(policy.timer().onset().unwrap(), Some(10));
    }
}
