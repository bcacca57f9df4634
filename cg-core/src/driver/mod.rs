//! Control loop driver
//!
//! A [`ControlPolicy`] knows how to run one tick (probe, decide, act). The
//! [`ControlLoop`] decides how often to run it:
//!
//! - **Continuous**: tick, sleep for the interval, repeat until shut down.
//!   Transient errors are logged (first failure, then every Nth) and the loop
//!   carries on; configuration errors stop it.
//! - **Single shot**: tick once and return the outcome or the error. Used for
//!   timer-driven invocations, where the scheduler provides the cadence.

mod fan;
mod idle;
mod thermal;

pub use fan::{FanController, FanTick};
pub use idle::{IdleOutcome, IdleShutdown};
pub use thermal::{ThermalOutcome, ThermalShutdown};

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tracing::{debug, error, info, trace};

use crate::constants::control::ERROR_LOG_EVERY;
use crate::error::Result;
use crate::hw::PowerControl;

/// One probe-decide-act step
#[async_trait]
pub trait ControlPolicy: Send {
    type Outcome: fmt::Debug + Send;

    /// Short name used in log lines
    fn name(&self) -> &'static str;

    async fn tick(&mut self) -> Result<Self::Outcome>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    SingleShot,
    Continuous { interval: Duration },
}

/// How a loop ended
#[derive(Debug, Clone, PartialEq)]
pub enum LoopExit<O> {
    /// Single-shot tick finished
    Completed(O),
    /// Continuous loop stopped by the shutdown signal
    Stopped { ticks: u64 },
    /// Single-shot tick abandoned because of the shutdown signal
    Interrupted,
}

/// Cooperative shutdown shared between the signal handler and the loop
///
/// Triggering it wakes a loop sleeping between ticks. A policy that must not
/// be abandoned halfway (a power off in progress) takes a [`ShutdownHold`];
/// `wait` does not resolve while any hold is alive.
#[derive(Debug, Default)]
pub struct ShutdownSignal {
    triggered: AtomicBool,
    holds: AtomicUsize,
    notify: Notify,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.triggered.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Defer `wait` until the returned hold is dropped
    pub fn hold(self: &Arc<Self>) -> ShutdownHold {
        self.holds.fetch_add(1, Ordering::SeqCst);
        ShutdownHold {
            signal: Arc::clone(self),
        }
    }

    /// Resolves once `trigger` has been called and no hold is alive
    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking so a concurrent trigger or release is not missed
            notified.as_mut().enable();
            if self.is_triggered() && self.holds.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Keeps [`ShutdownSignal::wait`] pending until dropped
#[derive(Debug)]
pub struct ShutdownHold {
    signal: Arc<ShutdownSignal>,
}

impl Drop for ShutdownHold {
    fn drop(&mut self) {
        self.signal.holds.fetch_sub(1, Ordering::SeqCst);
        self.signal.notify.notify_waiters();
    }
}

pub struct ControlLoop<P> {
    policy: P,
    mode: RunMode,
    shutdown: Arc<ShutdownSignal>,
}

impl<P: ControlPolicy> ControlLoop<P> {
    pub fn new(policy: P, mode: RunMode) -> Self {
        Self {
            policy,
            mode,
            shutdown: Arc::new(ShutdownSignal::new()),
        }
    }

    pub fn with_shutdown(mut self, shutdown: Arc<ShutdownSignal>) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub async fn run(&mut self) -> Result<LoopExit<P::Outcome>> {
        match self.mode {
            RunMode::SingleShot => {
                let shutdown = Arc::clone(&self.shutdown);
                let name = self.policy.name();
                tokio::select! {
                    result = self.run_once() => result.map(LoopExit::Completed),
                    _ = shutdown.wait() => {
                        info!(policy = name, "Interrupted before the tick finished");
                        Ok(LoopExit::Interrupted)
                    }
                }
            }
            RunMode::Continuous { interval } => self.run_continuous(interval).await,
        }
    }

    pub async fn run_once(&mut self) -> Result<P::Outcome> {
        let outcome = self.policy.tick().await?;
        debug!(policy = self.policy.name(), ?outcome, "Tick complete");
        Ok(outcome)
    }

    async fn run_continuous(&mut self, interval: Duration) -> Result<LoopExit<P::Outcome>> {
        info!(policy = self.policy.name(), ?interval, "Control loop starting");

        let mut ticks: u64 = 0;
        let mut consecutive_errors: u32 = 0;

        loop {
            if self.shutdown.is_triggered() {
                break;
            }
            ticks += 1;

            match self.policy.tick().await {
                Ok(outcome) => {
                    if consecutive_errors > 0 {
                        info!(
                            policy = self.policy.name(),
                            "Recovered after {} failed ticks", consecutive_errors
                        );
                        consecutive_errors = 0;
                    }
                    trace!(policy = self.policy.name(), ?outcome, "Tick complete");
                }
                Err(e) if !e.is_transient() => {
                    error!(policy = self.policy.name(), error = %e, "Unrecoverable error, stopping");
                    return Err(e);
                }
                Err(e) => {
                    consecutive_errors += 1;
                    if consecutive_errors == 1 || consecutive_errors % ERROR_LOG_EVERY == 0 {
                        error!(
                            policy = self.policy.name(),
                            count = consecutive_errors,
                            error = %e,
                            "Tick failed"
                        );
                    } else {
                        debug!(policy = self.policy.name(), count = consecutive_errors, error = %e, "Tick failed");
                    }
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = self.shutdown.wait() => {
                    debug!("Control loop woken up by shutdown signal");
                }
            }
        }

        info!(policy = self.policy.name(), ticks, "Control loop stopped");
        Ok(LoopExit::Stopped { ticks })
    }
}

/// Ask for power off; failures are logged and reported, never raised
pub(crate) async fn request_power_off<P: PowerControl + ?Sized>(power: &P) -> bool {
    match power.power_off().await {
        Ok(()) => true,
        Err(e) => {
            error!(error = %e, "Power off request failed");
            false
        }
    }
}
