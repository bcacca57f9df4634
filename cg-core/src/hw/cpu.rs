//! CPU utilization from the aggregate `cpu` line of /proc/stat

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tracing::trace;

use crate::constants::paths;
use crate::error::{CoolguardError, Result};

/// Measures how busy the host is over a window
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UtilizationProbe: Send + Sync {
    /// Busy percentage (0-100) over `window`
    async fn sample(&self, window: Duration) -> Result<f64>;
}

/// Cumulative jiffy counters from one read of /proc/stat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuTimes {
    pub total: u64,
    /// idle + iowait
    pub idle: u64,
}

impl CpuTimes {
    /// Parse the first line of /proc/stat
    ///
    /// `cpu  user nice system idle iowait irq softirq steal ...`
    pub fn parse(stat: &str) -> Result<Self> {
        let line = stat
            .lines()
            .next()
            .ok_or_else(|| CoolguardError::probe("/proc/stat is empty"))?;

        let mut fields = line.split_whitespace();
        if fields.next() != Some("cpu") {
            return Err(CoolguardError::probe(format!(
                "unexpected first line in /proc/stat: {:?}",
                line
            )));
        }

        let values = fields
            .map(|f| f.parse::<u64>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| CoolguardError::probe(format!("bad counter in /proc/stat: {}", e)))?;

        if values.len() < 4 {
            return Err(CoolguardError::probe(format!(
                "/proc/stat cpu line has {} counters, need at least 4",
                values.len()
            )));
        }

        let idle = values[3] + values.get(4).copied().unwrap_or(0);
        let total = values.iter().sum();
        Ok(Self { total, idle })
    }
}

/// Busy percentage between two reads
///
/// A window in which no time elapsed (or the counters went backwards) reads
/// as fully idle.
pub fn utilization_percent(before: CpuTimes, after: CpuTimes) -> f64 {
    let total = after.total as i128 - before.total as i128;
    let idle = after.idle as i128 - before.idle as i128;
    if total <= 0 {
        return 0.0;
    }
    (100.0 * (total - idle) as f64 / total as f64).clamp(0.0, 100.0)
}

#[derive(Debug, Clone)]
pub struct ProcStatProbe {
    path: PathBuf,
}

impl ProcStatProbe {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_times(&self) -> Result<CpuTimes> {
        let stat = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            CoolguardError::probe(format!("failed to read {}: {}", self.path.display(), e))
        })?;
        CpuTimes::parse(&stat)
    }
}

impl Default for ProcStatProbe {
    fn default() -> Self {
        Self::new(paths::PROC_STAT)
    }
}

#[async_trait]
impl UtilizationProbe for ProcStatProbe {
    async fn sample(&self, window: Duration) -> Result<f64> {
        let before = self.read_times().await?;
        tokio::time::sleep(window).await;
        let after = self.read_times().await?;

        let usage = utilization_percent(before, after);
        trace!(usage, ?window, "Sampled CPU utilization");
        Ok(usage)
    }
}
