//! Shared contract types crossing worker boundaries.

use serde::{Deserialize, Serialize};

/// Channel selection stored on a rule and carried in notification tasks.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct NotificationChannels {
    #[serde(default)]
    pub email: bool,
    #[serde(default)]
    pub whatsapp: bool,
}

impl NotificationChannels {
    /// Parse from a rule's JSON column; absent or malformed means "none".
    pub fn from_value(value: Option<&serde_json::Value>) -> Self {
        value
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channels_from_json() {
        let v = serde_json::json!({"email": true});
        let channels = NotificationChannels::from_value(Some(&v));
        assert!(channels.email);
        assert!(!channels.whatsapp);
    }

    #[test]
    fn channels_default_when_absent_or_malformed() {
        let none = NotificationChannels::from_value(None);
        assert!(!none.email && !none.whatsapp);

        let malformed = serde_json::json!("email");
        let fallback = NotificationChannels::from_value(Some(&malformed));
        assert!(!fallback.email && !fallback.whatsapp);
    }
}
