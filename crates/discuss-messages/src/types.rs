use chrono::{DateTime, Utc};
use discuss_core::Channel;
use serde::{Deserialize, Serialize};

/// One inbound prompt as persisted in the `messages` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// UUIDv7, so ids sort by creation time.
    pub id: String,
    pub channel: Channel,
    /// Sender address on the channel (phone number or WhatsApp ID).
    pub channel_id: String,
    /// Display name the provider reported, if any.
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_channel_lowercase() {
        let now = Utc::now();
        let record = MessageRecord {
            id: "0190-a".to_string(),
            channel: Channel::Whatsapp,
            channel_id: "237670000000".to_string(),
            name: Some("Alice".to_string()),
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["channel"], "whatsapp");
        assert_eq!(json["name"], "Alice");
    }
}
