//! Fan-out of one alert to every user and enabled channel.
//!
//! Individual channel or recipient failures are logged and never block the
//! remaining deliveries.

use tracing::{debug, warn};

use plantops_core::types::NotificationChannels;
use plantops_db::models::User;

use crate::traits::{AlertMessage, Notifier};

/// Outcome counts for one dispatch round.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSummary {
    pub sent: usize,
    pub failed: usize,
    pub skipped: usize,
}

pub struct Dispatcher {
    email: Option<Box<dyn Notifier>>,
    whatsapp: Option<Box<dyn Notifier>>,
}

impl Dispatcher {
    pub fn new(email: Option<Box<dyn Notifier>>, whatsapp: Option<Box<dyn Notifier>>) -> Self {
        Self { email, whatsapp }
    }

    /// Deliver `alert` to every user over each enabled channel whose user
    /// field is set and whose transport is configured.
    pub async fn dispatch(
        &self,
        alert: &AlertMessage,
        channels: NotificationChannels,
        users: &[User],
    ) -> DispatchSummary {
        let mut summary = DispatchSummary::default();

        for user in users {
            if channels.email {
                match (&self.email, &user.email) {
                    (Some(notifier), email) if !email.is_empty() => {
                        self.deliver(notifier.as_ref(), email, user.id, alert, &mut summary)
                            .await;
                    }
                    _ => summary.skipped += 1,
                }
            }

            if channels.whatsapp {
                match (&self.whatsapp, &user.whatsapp_number) {
                    (Some(notifier), Some(number)) if !number.is_empty() => {
                        self.deliver(notifier.as_ref(), number, user.id, alert, &mut summary)
                            .await;
                    }
                    _ => summary.skipped += 1,
                }
            }
        }

        summary
    }

    async fn deliver(
        &self,
        notifier: &dyn Notifier,
        recipient: &str,
        user_id: i64,
        alert: &AlertMessage,
        summary: &mut DispatchSummary,
    ) {
        match notifier.send(recipient, alert).await {
            Ok(()) => {
                summary.sent += 1;
                debug!(
                    channel = notifier.channel_name(),
                    user_id,
                    alert_id = alert.alert_id,
                    "delivery ok"
                );
            }
            Err(e) => {
                summary.failed += 1;
                warn!(
                    channel = notifier.channel_name(),
                    user_id,
                    alert_id = alert.alert_id,
                    error = %e,
                    "delivery failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::NotifyError;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct MockNotifier {
        name: String,
        send_count: Arc<AtomicUsize>,
        should_fail: bool,
    }

    #[async_trait::async_trait]
    impl Notifier for MockNotifier {
        async fn send(&self, _recipient: &str, _alert: &AlertMessage) -> Result<(), NotifyError> {
            self.send_count.fetch_add(1, Ordering::SeqCst);
            if self.should_fail {
                Err(NotifyError::Config("mock failure".to_string()))
            } else {
                Ok(())
            }
        }

        fn channel_name(&self) -> &str {
            &self.name
        }
    }

    fn mock(name: &str, count: Arc<AtomicUsize>, should_fail: bool) -> Box<dyn Notifier> {
        Box::new(MockNotifier {
            name: name.to_string(),
            send_count: count,
            should_fail,
        })
    }

    fn user(id: i64, email: &str, whatsapp: Option<&str>) -> User {
        User {
            id,
            factory_id: 1,
            email: email.to_string(),
            whatsapp_number: whatsapp.map(str::to_string),
            role: "operator".to_string(),
            is_active: true,
        }
    }

    fn alert() -> AlertMessage {
        AlertMessage {
            alert_id: 1,
            rule_name: "R".to_string(),
            device_name: "D".to_string(),
            severity: "high".to_string(),
            triggered_at: Utc::now(),
            message: "m".to_string(),
            telemetry_snapshot: serde_json::Value::Null,
        }
    }

    #[tokio::test]
    async fn dispatches_to_enabled_channels_only() {
        let email_count = Arc::new(AtomicUsize::new(0));
        let whatsapp_count = Arc::new(AtomicUsize::new(0));
        let dispatcher = Dispatcher::new(
            Some(mock("email", email_count.clone(), false)),
            Some(mock("whatsapp", whatsapp_count.clone(), false)),
        );

        let users = vec![
            user(1, "a@example.com", Some("+63917")),
            user(2, "b@example.com", None),
        ];
        let channels = NotificationChannels {
            email: true,
            whatsapp: false,
        };

        let summary = dispatcher.dispatch(&alert(), channels, &users).await;
        assert_eq!(summary.sent, 2);
        assert_eq!(email_count.load(Ordering::SeqCst), 2);
        assert_eq!(whatsapp_count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn per_user_failure_does_not_block_others() {
        let email_count = Arc::new(AtomicUsize::new(0));
        let dispatcher = Dispatcher::new(Some(mock("email", email_count.clone(), true)), None);

        let users = vec![user(1, "a@example.com", None), user(2, "b@example.com", None)];
        let channels = NotificationChannels {
            email: true,
            whatsapp: false,
        };

        let summary = dispatcher.dispatch(&alert(), channels, &users).await;
        assert_eq!(summary.failed, 2);
        // Both attempts were made despite the first failing.
        assert_eq!(email_count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn missing_user_field_skips_channel() {
        let whatsapp_count = Arc::new(AtomicUsize::new(0));
        let dispatcher =
            Dispatcher::new(None, Some(mock("whatsapp", whatsapp_count.clone(), false)));

        let users = vec![user(1, "a@example.com", None)];
        let channels = NotificationChannels {
            email: false,
            whatsapp: true,
        };

        let summary = dispatcher.dispatch(&alert(), channels, &users).await;
        assert_eq!(summary.sent, 0);
        assert_eq!(summary.skipped, 1);
        assert_eq!(whatsapp_count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unconfigured_transport_skips_channel() {
        let dispatcher = Dispatcher::new(None, None);
        let users = vec![user(1, "a@example.com", Some("+63917"))];
        let channels = NotificationChannels {
            email: true,
            whatsapp: true,
        };

        let summary = dispatcher.dispatch(&alert(), channels, &users).await;
        assert_eq!(summary.sent, 0);
        assert_eq!(summary.skipped, 2);
    }
}
