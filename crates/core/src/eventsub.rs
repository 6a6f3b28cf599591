use serde::Deserialize;
use serde_json::Value;

/// Value of the `Twitch-Eventsub-Message-Type` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Verification,
    Notification,
    Revocation,
    Other,
}

impl MessageType {
    pub fn from_header(value: &str) -> Self {
        match value {
            "webhook_callback_verification" => Self::Verification,
            "notification" => Self::Notification,
            "revocation" => Self::Revocation,
            _ => Self::Other,
        }
    }

    pub fn metric_label(self) -> &'static str {
        match self {
            Self::Verification => "verification",
            Self::Notification => "notification",
            Self::Revocation => "revocation",
            Self::Other => "other",
        }
    }
}

/// Body of an EventSub webhook request.
///
/// Only the fields the dispatcher needs are modelled; `event` is kept as raw
/// JSON and handed to consumers untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventSubPayload {
    #[serde(default, rename = "type")]
    pub event_type: Option<String>,
    #[serde(default)]
    pub event: Value,
    #[serde(default)]
    pub challenge: Option<String>,
    #[serde(default)]
    pub subscription: Option<SubscriptionInfo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubscriptionInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, rename = "type")]
    pub event_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl EventSubPayload {
    pub fn from_slice(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }

    /// Event type from the top-level `type`, else from `subscription.type`.
    pub fn resolved_type(&self) -> Option<&str> {
        self.event_type.as_deref().or_else(|| {
            self.subscription
                .as_ref()
                .and_then(|sub| sub.event_type.as_deref())
        })
    }

    pub fn subscription_id(&self) -> Option<&str> {
        self.subscription.as_ref().and_then(|sub| sub.id.as_deref())
    }

    pub fn subscription_status(&self) -> Option<&str> {
        self.subscription
            .as_ref()
            .and_then(|sub| sub.status.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_message_type_header() {
        assert_eq!(
            MessageType::from_header("webhook_callback_verification"),
            MessageType::Verification
        );
        assert_eq!(
            MessageType::from_header("notification"),
            MessageType::Notification
        );
        assert_eq!(MessageType::from_header("revocation"), MessageType::Revocation);
        assert_eq!(MessageType::from_header("something"), MessageType::Other);
    }

    #[test]
    fn top_level_type_wins() {
        let body = json!({
            "type": "channel.cheer",
            "subscription": { "type": "stream.online" },
            "event": { "bits": 50 }
        })
        .to_string();
        let payload = EventSubPayload::from_slice(body.as_bytes()).expect("payload");
        assert_eq!(payload.resolved_type(), Some("channel.cheer"));
        assert_eq!(payload.event, json!({ "bits": 50 }));
    }

    #[test]
    fn falls_back_to_subscription_type() {
        let body = json!({
            "subscription": { "id": "sub-1", "type": "stream.offline", "status": "enabled" },
            "event": {}
        })
        .to_string();
        let payload = EventSubPayload::from_slice(body.as_bytes()).expect("payload");
        assert_eq!(payload.resolved_type(), Some("stream.offline"));
        assert_eq!(payload.subscription_status(), Some("enabled"));
        assert_eq!(payload.subscription_id(), Some("sub-1"));
    }

    #[test]
    fn challenge_is_optional() {
        let payload = EventSubPayload::from_slice(br#"{"challenge":"abc"}"#).expect("payload");
        assert_eq!(payload.challenge.as_deref(), Some("abc"));
        assert_eq!(payload.event, Value::Null);
        assert_eq!(payload.resolved_type(), None);
    }
}
