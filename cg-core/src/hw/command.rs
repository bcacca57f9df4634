//! Bounded external command execution
//!
//! Every probe, actuator and power call goes through here, so none of them can
//! hang the control loop: the child is killed when the timeout elapses.

use std::fmt;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::trace;

use crate::constants::timing;
use crate::error::{CoolguardError, Result};

#[derive(Clone)]
pub struct ExternalCommand {
    program: String,
    args: Vec<String>,
    envs: Vec<(String, String)>,
    stdin: Option<String>,
    timeout: Duration,
}

impl ExternalCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            stdin: None,
            timeout: timing::COMMAND_TIMEOUT,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Extra environment variable for the child; never logged
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Text written to the child's stdin
    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run to completion and return stdout
    ///
    /// Non-zero exit, spawn failure and timeout are all errors.
    pub async fn output(&self) -> Result<String> {
        trace!(command = %self, "Running external command");

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .envs(self.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(if self.stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command
            .spawn()
            .map_err(|e| CoolguardError::command(&self.program, format!("failed to start: {}", e)))?;

        let input = self.stdin.clone();
        let run = async move {
            if let (Some(input), Some(mut pipe)) = (input, child.stdin.take()) {
                pipe.write_all(input.as_bytes()).await?;
                pipe.shutdown().await?;
            }
            child.wait_with_output().await
        };

        let output = match tokio::time::timeout(self.timeout, run).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(CoolguardError::command(&self.program, format!("I/O error: {}", e)))
            }
            // Dropping the future drops the child, which kills it
            Err(_) => {
                return Err(CoolguardError::Timeout(format!(
                    "{} did not finish within {:?}",
                    self.program, self.timeout
                )))
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CoolguardError::command(
                &self.program,
                format!("exited with {}: {}", output.status, stderr.trim()),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl fmt::Display for ExternalCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

impl fmt::Debug for ExternalCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalCommand")
            .field("command", &self.to_string())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_captures_stdout() {
        let out = ExternalCommand::new("sh").args(["-c", "echo 42"]).output().await.unwrap();
        assert_eq!(out.trim(), "42");
    }

    #[tokio::test]
    async fn test_feeds_stdin_and_env() {
        let out = ExternalCommand::new("sh")
            .args(["-c", "cat; printf %s \"$CG_TEST_VAR\""])
            .env("CG_TEST_VAR", "-env")
            .stdin("from-stdin")
            .output()
            .await
            .unwrap();
        assert_eq!(out, "from-stdin-env");
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_error() {
        let err = ExternalCommand::new("sh")
            .args(["-c", "echo broken >&2; exit 3"])
            .output()
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("broken"), "{}", msg);
    }

    #[tokio::test]
    async fn test_missing_program_is_error() {
        let err = ExternalCommand::new("/nonexistent/coolguard-test-bin")
            .output()
            .await
            .unwrap_err();
        assert!(matches!(err, CoolguardError::Command { .. }));
    }

    #[tokio::test]
    async fn test_hung_command_times_out() {
        let err = ExternalCommand::new("sleep")
            .arg("5")
            .timeout(Duration::from_millis(100))
            .output()
            .await
            .unwrap_err();
        assert!(matches!(err, CoolguardError::Timeout(_)));
    }

    #[test]
    fn test_display_omits_environment() {
        let cmd = ExternalCommand::new("msmtp").arg("-t").env("SECRET", "hunter2");
        assert_eq!(cmd.to_string(), "msmtp -t");
        assert!(!format!("{:?}", cmd).contains("hunter2"));
    }
}
