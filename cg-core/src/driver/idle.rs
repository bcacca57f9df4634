//! Idle shutdown
//!
//! One invocation runs a bounded number of utilization rounds. Any busy round
//! ends the invocation without action; only when every round is idle is the
//! host powered off.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::data::IdleConfig;
use crate::error::Result;
use crate::hw::{PowerControl, UtilizationProbe};

use super::{request_power_off, ControlPolicy};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IdleOutcome {
    /// Round `round` (1-based) measured `utilization`% at or above the threshold
    Busy { round: u32, utilization: f64 },
    /// Every round was idle and power off was requested
    ShutdownRequested { rounds: u32, powered_off: bool },
}

pub struct IdleShutdown<U, P> {
    probe: U,
    power: P,
    threshold_percent: f64,
    checks: u32,
    sample_window: Duration,
    between: Duration,
}

impl<U: UtilizationProbe, P: PowerControl> IdleShutdown<U, P> {
    pub fn new(probe: U, power: P, config: &IdleConfig) -> Self {
        Self {
            probe,
            power,
            threshold_percent: config.threshold_percent,
            checks: config.checks.max(1),
            sample_window: config.sample_window(),
            between: config.between(),
        }
    }
}

#[async_trait]
impl<U: UtilizationProbe, P: PowerControl> ControlPolicy for IdleShutdown<U, P> {
    type Outcome = IdleOutcome;

    fn name(&self) -> &'static str {
        "idle"
    }

    async fn tick(&mut self) -> Result<IdleOutcome> {
        for round in 1..=self.checks {
            let utilization = self.probe.sample(self.sample_window).await?;
            debug!(round, checks = self.checks, utilization, "Idle check");

            if utilization >= self.threshold_percent {
                info!(
                    "CPU busy ({:.1}% >= {:.1}%) in round {}/{}, staying up",
                    utilization, self.threshold_percent, round, self.checks
                );
                return Ok(IdleOutcome::Busy { round, utilization });
            }

            if round < self.checks {
                tokio::time::sleep(self.between).await;
            }
        }

        info!("System idle for {} checks, shutting down", self.checks);
        let powered_off = request_power_off(&self.power).await;
        Ok(IdleOutcome::ShutdownRequested {
            rounds: self.checks,
            powered_off,
        })
    }
}
