//! WhatsApp notifier via the Twilio Messages REST API.

use plantops_core::config::TwilioConfig;

use crate::templating::render_whatsapp_body;
use crate::traits::{AlertMessage, Notifier, NotifyError};

pub struct WhatsAppNotifier {
    http: reqwest::Client,
    account_sid: String,
    auth_token: String,
    from: String,
}

impl WhatsAppNotifier {
    /// Build from Twilio configuration. Returns `None` when credentials are
    /// absent so unconfigured deployments skip the channel quietly.
    pub fn from_config(config: &TwilioConfig) -> Option<Self> {
        let account_sid = config.account_sid.clone()?;
        let auth_token = config.auth_token.clone()?;
        let from = config.whatsapp_from.clone()?;

        Some(Self {
            http: reqwest::Client::new(),
            account_sid,
            auth_token,
            from,
        })
    }

    fn whatsapp_address(number: &str) -> String {
        if number.starts_with("whatsapp:") {
            number.to_string()
        } else {
            format!("whatsapp:{number}")
        }
    }
}

#[async_trait::async_trait]
impl Notifier for WhatsAppNotifier {
    async fn send(&self, recipient: &str, alert: &AlertMessage) -> Result<(), NotifyError> {
        let url = format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
            self.account_sid
        );

        let params = [
            ("From", Self::whatsapp_address(&self.from)),
            ("To", Self::whatsapp_address(recipient)),
            ("Body", render_whatsapp_body(alert)?),
        ];

        let response = self
            .http
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Config(format!(
                "twilio rejected message: {status}: {body}"
            )));
        }

        tracing::info!(
            channel = "whatsapp",
            to = recipient,
            alert_id = alert.alert_id,
            "notification delivered"
        );

        Ok(())
    }

    fn channel_name(&self) -> &str {
        "whatsapp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconfigured_credentials_build_nothing() {
        let config = TwilioConfig {
            account_sid: None,
            auth_token: None,
            whatsapp_from: None,
        };
        assert!(WhatsAppNotifier::from_config(&config).is_none());
    }

    #[test]
    fn whatsapp_addressing_is_prefixed_once() {
        assert_eq!(
            WhatsAppNotifier::whatsapp_address("+6391700000"),
            "whatsapp:+6391700000"
        );
        assert_eq!(
            WhatsAppNotifier::whatsapp_address("whatsapp:+6391700000"),
            "whatsapp:+6391700000"
        );
    }
}
