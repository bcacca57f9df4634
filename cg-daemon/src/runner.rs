//! Builds the requested policy from configuration and drives it to completion

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use cg_core::{
    AlertSender, Config, ControlLoop, ControlPolicy, DryRunPower, FanController, FileRecordStore,
    IdleOutcome, IdleShutdown, LiquidctlActuator, LoopExit, PowerControl, ProcStatProbe, RunMode,
    SensorsJsonProbe, ShutdownSignal, SystemClock, SystemctlPower, ThermalOutcome,
    ThermalShutdown,
};

use crate::cli::{Cli, Commands, FanArgs, IdleArgs, ThermalArgs};

pub async fn run(cli: Cli, shutdown: Arc<ShutdownSignal>) -> Result<ExitCode> {
    let mut config = Config::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;

    match cli.command {
        Commands::Fan(args) => run_fan(&mut config, &args, shutdown).await,
        Commands::Idle(args) => run_idle(&mut config, &args, shutdown).await,
        Commands::Thermal(args) => run_thermal(&mut config, &args, shutdown).await,
    }
}

async fn run_fan(config: &mut Config, args: &FanArgs, shutdown: Arc<ShutdownSignal>) -> Result<ExitCode> {
    args.apply(config);
    config.validate().context("invalid configuration")?;

    let timeout = config.command_timeout();
    let fan = &config.fan;
    let controller = FanController::from_config(
        fan,
        SensorsJsonProbe::new(&fan.sensors_bin).with_timeout(timeout),
        LiquidctlActuator::new(&fan.liquidctl_bin).with_timeout(timeout),
    )?;

    info!(
        curve = ?fan.curve,
        min_duty = fan.min_duty,
        max_duty = fan.max_duty,
        min_duty_change = fan.min_duty_change,
        min_temp_change = fan.min_temp_change,
        "Fan controller configured"
    );

    let mode = if args.once {
        RunMode::SingleShot
    } else {
        RunMode::Continuous { interval: fan.interval() }
    };

    drive(controller, mode, shutdown).await?;
    Ok(ExitCode::SUCCESS)
}

async fn run_idle(config: &mut Config, args: &IdleArgs, shutdown: Arc<ShutdownSignal>) -> Result<ExitCode> {
    args.apply(config);
    config.validate().context("invalid configuration")?;

    let idle = &config.idle;
    info!(
        threshold = idle.threshold_percent,
        checks = idle.checks,
        sample_secs = idle.sample_secs,
        between_secs = idle.between_secs,
        "Idle check starting"
    );

    let policy = IdleShutdown::new(
        ProcStatProbe::new(&idle.proc_stat),
        power_control(config, args.dry_run),
        idle,
    );

    match drive(policy, RunMode::SingleShot, shutdown).await? {
        LoopExit::Completed(IdleOutcome::ShutdownRequested { powered_off: false, .. }) => {
            Ok(ExitCode::FAILURE)
        }
        _ => Ok(ExitCode::SUCCESS),
    }
}

async fn run_thermal(
    config: &mut Config,
    args: &ThermalArgs,
    shutdown: Arc<ShutdownSignal>,
) -> Result<ExitCode> {
    args.apply(config);
    config.validate().context("invalid configuration")?;

    let timeout = config.command_timeout();
    let thermal = &config.thermal;
    let alert = AlertSender::from_config(&config.alert, timeout);
    if let Some(alert) = &alert {
        info!(recipient = %alert.recipient(), "Shutdown alerts enabled");
    }

    let policy = ThermalShutdown::new(
        SensorsJsonProbe::new(&thermal.sensors_bin).with_timeout(timeout),
        FileRecordStore::new(&thermal.state_dir),
        SystemClock,
        power_control(config, args.dry_run),
        thermal.max_celsius,
        thermal.persist(),
    )
    .with_alert(alert)
    .with_shutdown(Arc::clone(&shutdown));

    let mode = match args.interval {
        Some(secs) => RunMode::Continuous {
            interval: interval_from_secs(secs)?,
        },
        None => RunMode::SingleShot,
    };

    match drive(policy, mode, shutdown).await? {
        LoopExit::Completed(ThermalOutcome::ShutdownRequested { powered_off: false, .. }) => {
            Ok(ExitCode::FAILURE)
        }
        _ => Ok(ExitCode::SUCCESS),
    }
}

fn interval_from_secs(secs: f64) -> Result<Duration> {
    match Duration::try_from_secs_f64(secs) {
        Ok(interval) if !interval.is_zero() => Ok(interval),
        _ => anyhow::bail!("--interval must be a positive number of seconds, got {}", secs),
    }
}

fn power_control(config: &Config, dry_run: bool) -> Box<dyn PowerControl> {
    if dry_run {
        warn!("Dry run: power off requests will only be logged");
        Box::new(DryRunPower)
    } else {
        Box::new(SystemctlPower::new(&config.systemctl_bin).with_timeout(config.command_timeout()))
    }
}

async fn drive<P: ControlPolicy>(
    policy: P,
    mode: RunMode,
    shutdown: Arc<ShutdownSignal>,
) -> Result<LoopExit<P::Outcome>> {
    let name = policy.name();
    let mut control = ControlLoop::new(policy, mode).with_shutdown(shutdown);
    let exit = control
        .run()
        .await
        .with_context(|| format!("{} policy failed", name))?;

    match &exit {
        LoopExit::Completed(outcome) => info!(policy = name, ?outcome, "Finished"),
        LoopExit::Stopped { ticks } => info!(policy = name, ticks, "Stopped"),
        LoopExit::Interrupted => warn!(policy = name, "Interrupted"),
    }
    Ok(exit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_from_secs() {
        assert_eq!(interval_from_secs(30.0).unwrap(), Duration::from_secs(30));
        assert_eq!(interval_from_secs(0.5).unwrap(), Duration::from_millis(500));
        assert!(interval_from_secs(0.0).is_err());
        assert!(interval_from_secs(-5.0).is_err());
        assert!(interval_from_secs(f64::NAN).is_err());
        assert!(interval_from_secs(1e20).is_err());
    }
}
