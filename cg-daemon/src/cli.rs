//! Command Line Interface
//!
//! Every flag is optional and overrides the matching config file field.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use cg_core::constants::paths;
use cg_core::{Config, CurvePoint};

#[derive(Parser, Debug)]
#[command(name = "coolguardd")]
#[command(version)]
#[command(about = "Coolguard - fan curve, idle and thermal shutdown daemons")]
#[command(long_about = "Coolguard - fan curve, idle and thermal shutdown daemons

EXAMPLES:
    coolguardd fan                                Run the fan curve loop
    coolguardd fan --curve 30:30 50:60 80:100     Override the curve
    coolguardd idle --threshold 5 --checks 12     Power off after a quiet minute
    coolguardd thermal --max-c 88 --persist-sec 300
    coolguardd thermal --dry-run                  Log instead of powering off

ENVIRONMENT VARIABLES:
    COOLGUARD_LOG            Log filter (trace, debug, info, warn, error)
    COOLGUARD_MAIL_PASSWORD  Mail credential when no credential command is set

FILES:
    /etc/coolguard/config.json       Configuration
    /run/coolguard/since_epoch       Over-temperature onset")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, default_value = paths::CONFIG_FILE)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Drive fan and pump duty from the hottest temperature sensor
    Fan(FanArgs),

    /// Power off when the CPU has been idle for several rounds
    Idle(IdleArgs),

    /// Power off when the host stays too hot for too long
    Thermal(ThermalArgs),
}

// ============================================================================
// Fan
// ============================================================================

#[derive(Args, Debug, Default)]
pub struct FanArgs {
    /// Curve breakpoints as TEMP:DUTY pairs
    #[arg(long, num_args = 1.., value_name = "TEMP:DUTY")]
    pub curve: Option<Vec<CurvePoint>>,

    /// Lowest duty ever applied (%)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub min_duty: Option<u8>,

    /// Highest duty ever applied (%)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub max_duty: Option<u8>,

    /// Smallest duty change worth writing (percentage points)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub min_duty_change: Option<u8>,

    /// Smallest temperature change worth reacting to (°C)
    #[arg(long)]
    pub min_temp_change: Option<f64>,

    /// Seconds between samples
    #[arg(long)]
    pub interval: Option<f64>,

    #[arg(long)]
    pub sensors_bin: Option<String>,

    #[arg(long)]
    pub liquidctl_bin: Option<String>,

    /// Apply the curve once and exit
    #[arg(long)]
    pub once: bool,
}

impl FanArgs {
    pub fn apply(&self, config: &mut Config) {
        let fan = &mut config.fan;
        if let Some(curve) = &self.curve {
            fan.set_curve_points(curve);
        }
        if let Some(v) = self.min_duty {
            fan.min_duty = v;
        }
        if let Some(v) = self.max_duty {
            fan.max_duty = v;
        }
        if let Some(v) = self.min_duty_change {
            fan.min_duty_change = v;
        }
        if let Some(v) = self.min_temp_change {
            fan.min_temp_change = v;
        }
        if let Some(v) = self.interval {
            fan.interval_secs = v;
        }
        if let Some(v) = &self.sensors_bin {
            fan.sensors_bin = v.clone();
        }
        if let Some(v) = &self.liquidctl_bin {
            fan.liquidctl_bin = v.clone();
        }
    }
}

// ============================================================================
// Idle
// ============================================================================

#[derive(Args, Debug, Default)]
pub struct IdleArgs {
    /// Busy percentage at or above which the host counts as in use
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Length of each utilization sample in seconds
    #[arg(long)]
    pub sample_sec: Option<f64>,

    /// Number of consecutive idle rounds required
    #[arg(long)]
    pub checks: Option<u32>,

    /// Seconds to wait between rounds
    #[arg(long)]
    pub between_sec: Option<f64>,

    #[arg(long)]
    pub systemctl_bin: Option<String>,

    /// Log instead of powering off
    #[arg(long)]
    pub dry_run: bool,
}

impl IdleArgs {
    pub fn apply(&self, config: &mut Config) {
        let idle = &mut config.idle;
        if let Some(v) = self.threshold {
            idle.threshold_percent = v;
        }
        if let Some(v) = self.sample_sec {
            idle.sample_secs = v;
        }
        if let Some(v) = self.checks {
            idle.checks = v;
        }
        if let Some(v) = self.between_sec {
            idle.between_secs = v;
        }
        if let Some(v) = &self.systemctl_bin {
            config.systemctl_bin = v.clone();
        }
    }
}

// ============================================================================
// Thermal
// ============================================================================

#[derive(Args, Debug, Default)]
pub struct ThermalArgs {
    /// Temperature limit (°C)
    #[arg(long)]
    pub max_c: Option<f64>,

    /// Seconds the limit must be exceeded before powering off
    #[arg(long)]
    pub persist_sec: Option<u64>,

    /// Directory holding the onset record
    #[arg(long)]
    pub state_dir: Option<PathBuf>,

    #[arg(long)]
    pub sensors_bin: Option<String>,

    #[arg(long)]
    pub systemctl_bin: Option<String>,

    /// Keep running and check every N seconds instead of once
    #[arg(long, value_name = "SECS")]
    pub interval: Option<f64>,

    /// Log instead of powering off
    #[arg(long)]
    pub dry_run: bool,
}

impl ThermalArgs {
    pub fn apply(&self, config: &mut Config) {
        let thermal = &mut config.thermal;
        if let Some(v) = self.max_c {
            thermal.max_celsius = v;
        }
        if let Some(v) = self.persist_sec {
            thermal.persist_secs = v;
        }
        if let Some(v) = &self.state_dir {
            thermal.state_dir = v.clone();
        }
        if let Some(v) = &self.sensors_bin {
            thermal.sensors_bin = v.clone();
        }
        if let Some(v) = &self.systemctl_bin {
            config.systemctl_bin = v.clone();
        }
    }
}
