//! Host power control

use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::constants::{binaries, timing};
use crate::error::{CoolguardError, Result};
use crate::hw::command::ExternalCommand;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PowerControl: Send + Sync {
    /// Ask the init system to power the host off
    async fn power_off(&self) -> Result<()>;
}

#[async_trait]
impl<P: PowerControl + ?Sized> PowerControl for Box<P> {
    async fn power_off(&self) -> Result<()> {
        (**self).power_off().await
    }
}

/// Runs `systemctl poweroff`
#[derive(Debug, Clone)]
pub struct SystemctlPower {
    systemctl_bin: String,
    timeout: Duration,
}

impl SystemctlPower {
    pub fn new(systemctl_bin: impl Into<String>) -> Self {
        Self {
            systemctl_bin: systemctl_bin.into(),
            timeout: timing::COMMAND_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for SystemctlPower {
    fn default() -> Self {
        Self::new(binaries::SYSTEMCTL)
    }
}

#[async_trait]
impl PowerControl for SystemctlPower {
    async fn power_off(&self) -> Result<()> {
        info!(systemctl = %self.systemctl_bin, "Requesting power off");
        ExternalCommand::new(&self.systemctl_bin)
            .arg("poweroff")
            .timeout(self.timeout)
            .output()
            .await
            .map_err(|e| CoolguardError::PowerControl(e.to_string()))?;
        Ok(())
    }
}

/// Logs instead of powering off; used with `--dry-run`
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunPower;

#[async_trait]
impl PowerControl for DryRunPower {
    async fn power_off(&self) -> Result<()> {
        warn!("Dry run: not powering off");
        Ok(())
    }
}
