//! SMTP email notifier via `lettre` with STARTTLS support.

use lettre::{
    message::Mailbox, transport::smtp::authentication::Credentials, AsyncSmtpTransport,
    AsyncTransport, Message, Tokio1Executor,
};

use plantops_core::config::SmtpConfig;

use crate::templating::{email_subject, render_email_body};
use crate::traits::{AlertMessage, Notifier, NotifyError};

/// Sends alert emails via SMTP.
#[derive(Debug)]
pub struct EmailNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl EmailNotifier {
    /// Build from SMTP configuration. Returns `None` when no host is
    /// configured so unconfigured deployments skip the channel quietly.
    pub fn from_config(config: &SmtpConfig) -> Result<Option<Self>, NotifyError> {
        let Some(ref host) = config.host else {
            return Ok(None);
        };

        let from: Mailbox = config
            .from
            .parse()
            .map_err(|e: lettre::address::AddressError| NotifyError::Config(e.to_string()))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(|e| NotifyError::Config(e.to_string()))?
            .port(config.port);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Some(Self {
            transport: builder.build(),
            from,
        }))
    }
}

#[async_trait::async_trait]
impl Notifier for EmailNotifier {
    async fn send(&self, recipient: &str, alert: &AlertMessage) -> Result<(), NotifyError> {
        let to: Mailbox = recipient
            .parse()
            .map_err(|e: lettre::address::AddressError| NotifyError::Config(e.to_string()))?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email_subject(alert))
            .body(render_email_body(alert)?)
            .map_err(|e| NotifyError::Smtp(e.to_string()))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| NotifyError::Smtp(e.to_string()))?;

        tracing::info!(
            channel = "email",
            to = recipient,
            alert_id = alert.alert_id,
            "notification delivered"
        );

        Ok(())
    }

    fn channel_name(&self) -> &str {
        "email"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn smtp_config(host: Option<&str>) -> SmtpConfig {
        SmtpConfig {
            host: host.map(str::to_string),
            port: 587,
            username: None,
            password: None,
            from: "alerts@plantops.example".to_string(),
        }
    }

    #[test]
    fn unconfigured_host_builds_nothing() {
        assert!(EmailNotifier::from_config(&smtp_config(None))
            .unwrap()
            .is_none());
    }

    #[test]
    fn configured_host_builds_notifier() {
        let notifier = EmailNotifier::from_config(&smtp_config(Some("smtp.example.com")))
            .unwrap()
            .unwrap();
        assert_eq!(notifier.channel_name(), "email");
    }

    #[test]
    fn bad_from_address_is_a_config_error() {
        let mut config = smtp_config(Some("smtp.example.com"));
        config.from = "not-an-address".to_string();
        let err = EmailNotifier::from_config(&config).unwrap_err();
        assert!(err.to_string().contains("Configuration error"));
    }
}
