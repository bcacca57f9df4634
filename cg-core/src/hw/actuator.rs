//! Fan duty actuator backed by liquidctl

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::constants::{binaries, timing};
use crate::error::{CoolguardError, Result};
use crate::hw::command::ExternalCommand;

/// Something that can set the fan duty
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Actuator: Send + Sync {
    /// Set all managed fans and pumps to `duty` percent (0-100)
    async fn set_duty(&self, duty: u8) -> Result<()>;
}

/// Runs `liquidctl set sync speed <duty>`
#[derive(Debug, Clone)]
pub struct LiquidctlActuator {
    liquidctl_bin: String,
    timeout: Duration,
}

impl LiquidctlActuator {
    pub fn new(liquidctl_bin: impl Into<String>) -> Self {
        Self {
            liquidctl_bin: liquidctl_bin.into(),
            timeout: timing::COMMAND_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn command(&self, duty: u8) -> ExternalCommand {
        ExternalCommand::new(&self.liquidctl_bin)
            .args(["set", "sync", "speed"])
            .arg(duty.to_string())
            .timeout(self.timeout)
    }
}

impl Default for LiquidctlActuator {
    fn default() -> Self {
        Self::new(binaries::LIQUIDCTL)
    }
}

#[async_trait]
impl Actuator for LiquidctlActuator {
    async fn set_duty(&self, duty: u8) -> Result<()> {
        if duty > 100 {
            return Err(CoolguardError::actuation(format!("duty {}% is out of range", duty)));
        }

        let command = self.command(duty);
        debug!(command = %command, "Applying fan duty");
        command
            .output()
            .await
            .map_err(|e| CoolguardError::actuation(e.to_string()))?;
        Ok(())
    }
}
