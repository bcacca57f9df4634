//! Best-effort mail alerts
//!
//! The credential is looked up at send time and handed to the mailer through
//! its environment only. It never appears on a command line or in a log line.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::constants::alert as alert_defaults;
use crate::data::{Alert, AlertConfig, Credential};
use crate::error::{CoolguardError, Result};
use crate::hw::ExternalCommand;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn credential(&self) -> Result<Credential>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, alert: &Alert, credential: &Credential) -> Result<()>;
}

/// Reads the credential from a command's stdout, e.g. `secret-tool lookup ...`
#[derive(Debug, Clone)]
pub struct CommandCredentialProvider {
    command: Vec<String>,
    timeout: Duration,
}

impl CommandCredentialProvider {
    pub fn new(command: Vec<String>, timeout: Duration) -> Self {
        Self { command, timeout }
    }
}

#[async_trait]
impl CredentialProvider for CommandCredentialProvider {
    async fn credential(&self) -> Result<Credential> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| CoolguardError::Credential("credential command is empty".into()))?;

        let output = ExternalCommand::new(program)
            .args(args.iter().cloned())
            .timeout(self.timeout)
            .output()
            .await
            .map_err(|e| CoolguardError::Credential(e.to_string()))?;

        let secret = output.trim_end_matches(['\r', '\n']);
        if secret.is_empty() {
            return Err(CoolguardError::Credential(format!("{} printed nothing", program)));
        }
        Ok(Credential::new(secret))
    }
}

/// Reads the credential from an environment variable of this process
#[derive(Debug, Clone)]
pub struct EnvCredentialProvider {
    var: String,
}

impl EnvCredentialProvider {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

#[async_trait]
impl CredentialProvider for EnvCredentialProvider {
    async fn credential(&self) -> Result<Credential> {
        match std::env::var(&self.var) {
            Ok(secret) if !secret.is_empty() => Ok(Credential::new(secret)),
            _ => Err(CoolguardError::Credential(format!("{} is not set", self.var))),
        }
    }
}

/// Pipes an RFC 5322 message into a sendmail-compatible program
#[derive(Debug, Clone)]
pub struct MailCommandNotifier {
    mailer: String,
    args: Vec<String>,
    timeout: Duration,
}

impl MailCommandNotifier {
    pub fn new(mailer: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            mailer: mailer.into(),
            args,
            timeout,
        }
    }
}

#[async_trait]
impl Notifier for MailCommandNotifier {
    async fn send(&self, alert: &Alert, credential: &Credential) -> Result<()> {
        ExternalCommand::new(&self.mailer)
            .args(self.args.iter().cloned())
            .env(alert_defaults::SECRET_ENV, credential.expose())
            .stdin(render_message(alert))
            .timeout(self.timeout)
            .output()
            .await
            .map_err(|e| CoolguardError::Notification(e.to_string()))?;
        Ok(())
    }
}

/// Header values are single-line
fn header_value(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}

pub fn render_message(alert: &Alert) -> String {
    format!(
        "To: {}\nSubject: {}\nContent-Type: text/plain; charset=utf-8\n\n{}\n",
        header_value(&alert.recipient),
        header_value(&alert.subject),
        alert.body
    )
}

/// A configured alert channel
pub struct AlertSender {
    recipient: String,
    credentials: Box<dyn CredentialProvider>,
    notifier: Box<dyn Notifier>,
    timeout: Duration,
}

impl AlertSender {
    pub fn new(
        recipient: impl Into<String>,
        credentials: impl CredentialProvider + 'static,
        notifier: impl Notifier + 'static,
    ) -> Self {
        Self {
            recipient: recipient.into(),
            credentials: Box::new(credentials),
            notifier: Box::new(notifier),
            timeout: crate::constants::timing::ALERT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build from config; `None` when no recipient is configured
    pub fn from_config(config: &AlertConfig, command_timeout: Duration) -> Option<Self> {
        if !config.is_enabled() {
            return None;
        }
        let recipient = config.recipient.clone()?;
        let notifier =
            MailCommandNotifier::new(&config.mailer, config.mailer_args.clone(), config.timeout());

        let sender = match &config.credential_command {
            Some(command) => AlertSender::new(
                recipient,
                CommandCredentialProvider::new(command.clone(), command_timeout),
                notifier,
            ),
            None => AlertSender::new(
                recipient,
                EnvCredentialProvider::new(&config.credential_env),
                notifier,
            ),
        };
        Some(sender.with_timeout(config.timeout()))
    }

    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    /// Try to deliver; never fails and never takes longer than the timeout
    ///
    /// Returns whether the alert went out.
    pub async fn send_best_effort(&self, subject: &str, body: &str) -> bool {
        let alert = Alert {
            recipient: self.recipient.clone(),
            subject: format!("{} {}", alert_defaults::SUBJECT_PREFIX, subject),
            body: body.to_string(),
        };

        let attempt = async {
            let credential = self.credentials.credential().await?;
            self.notifier.send(&alert, &credential).await
        };

        match tokio::time::timeout(self.timeout, attempt).await {
            Ok(Ok(())) => {
                info!(recipient = %self.recipient, "Alert sent");
                true
            }
            Ok(Err(e)) => {
                warn!(recipient = %self.recipient, error = %e, "Failed to send alert");
                false
            }
            Err(_) => {
                warn!(recipient = %self.recipient, timeout = ?self.timeout, "Alert timed out");
                false
            }
        }
    }
}

impl std::fmt::Debug for AlertSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertSender")
            .field("recipient", &self.recipient)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn alert() -> Alert {
        Alert {
            recipient: "ops@example.com".into(),
            subject: "hot\nBcc: someone@example.com".into(),
            body: "CPU at 95C".into(),
        }
    }

    #[test]
    fn test_render_message_keeps_headers_single_line() {
        let message = render_message(&alert());
        let headers: Vec<_> = message.split("\n\n").next().unwrap().lines().collect();
        assert_eq!(headers.len(), 3);
        assert_eq!(headers[1], "Subject: hot Bcc: someone@example.com");
        assert!(message.ends_with("CPU at 95C\n"));
    }

    #[tokio::test]
    async fn test_sends_with_credential() {
        let mut credentials = MockCredentialProvider::new();
        credentials
            .expect_credential()
            .times(1)
            .returning(|| Ok(Credential::new("app-password")));

        let seen = Arc::new(Mutex::new(None));
        let seen_in_mock = Arc::clone(&seen);
        let mut notifier = MockNotifier::new();
        notifier.expect_send().times(1).returning(move |alert, credential| {
            *seen_in_mock.lock().unwrap() =
                Some((alert.subject.clone(), credential.expose().to_string()));
            Ok(())
        });

        let sender = AlertSender::new("ops@example.com", credentials, notifier);
        assert!(sender.send_best_effort("Thermal shutdown", "body").await);

        let (subject, secret) = seen.lock().unwrap().clone().unwrap();
        assert_eq!(subject, "[coolguard] Thermal shutdown");
        assert_eq!(secret, "app-password");
    }

    #[tokio::test]
    async fn test_missing_credential_skips_send() {
        let mut credentials = MockCredentialProvider::new();
        credentials
            .expect_credential()
            .returning(|| Err(CoolguardError::Credential("locked".into())));
        let mut notifier = MockNotifier::new();
        notifier.expect_send().never();

        let sender = AlertSender::new("ops@example.com", credentials, notifier);
        assert!(!sender.send_best_effort("subject", "body").await);
    }

    #[tokio::test]
    async fn test_notifier_failure_is_swallowed() {
        let mut credentials = MockCredentialProvider::new();
        credentials
            .expect_credential()
            .returning(|| Ok(Credential::new("x")));
        let mut notifier = MockNotifier::new();
        notifier
            .expect_send()
            .returning(|_, _| Err(CoolguardError::Notification("smtp down".into())));

        let sender = AlertSender::new("ops@example.com", credentials, notifier);
        assert!(!sender.send_best_effort("subject", "body").await);
    }

    struct HangingProvider;

    #[async_trait]
    impl CredentialProvider for HangingProvider {
        async fn credential(&self) -> Result<Credential> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_alert_is_bounded() {
        let mut notifier = MockNotifier::new();
        notifier.expect_send().never();

        let sender = AlertSender::new("ops@example.com", HangingProvider, notifier)
            .with_timeout(Duration::from_secs(5));
        assert!(!sender.send_best_effort("subject", "body").await);
    }

    #[tokio::test]
    async fn test_command_provider_trims_newline() {
        let provider = CommandCredentialProvider::new(
            vec!["echo".into(), "s3cret".into()],
            Duration::from_secs(5),
        );
        assert_eq!(provider.credential().await.unwrap().expose(), "s3cret");
    }

    #[tokio::test]
    async fn test_env_provider_missing_var() {
        let provider = EnvCredentialProvider::new("COOLGUARD_TEST_UNSET_VARIABLE");
        assert!(provider.credential().await.is_err());
    }

    #[tokio::test]
    async fn test_mail_notifier_passes_secret_in_environment() {
        let dir = tempfile::TempDir::new().unwrap();
        let out = dir.path().join("mail.txt");
        let script = format!(
            "cat > {0}; printf 'secret=%s\\n' \"${1}\" >> {0}",
            out.display(),
            alert_defaults::SECRET_ENV
        );
        let notifier =
            MailCommandNotifier::new("sh", vec!["-c".into(), script], Duration::from_secs(5));

        notifier.send(&alert(), &Credential::new("pw")).await.unwrap();

        let written = std::fs::read_to_string(&out).unwrap();
        assert!(written.starts_with("To: ops@example.com\n"));
        assert!(written.ends_with("secret=pw\n"));
    }

    #[test]
    fn test_from_config_disabled_without_recipient() {
        let config = AlertConfig::default();
        assert!(AlertSender::from_config(&config, Duration::from_secs(1)).is_none());

        let config = AlertConfig {
            recipient: Some("ops@example.com".into()),
            ..AlertConfig::default()
        };
        let sender = AlertSender::from_config(&config, Duration::from_secs(1)).unwrap();
        assert_eq!(sender.recipient(), "ops@example.com");
    }
}
