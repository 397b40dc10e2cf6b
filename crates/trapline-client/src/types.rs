use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Server-assigned message identifier.
///
/// The server sends ids as integers in JSON and as plain text in stream
/// frames, so both forms are normalized to their string representation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for MessageId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<u64> for MessageId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl<'de> Deserialize<'de> for MessageId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Int(i64),
            Text(String),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Int(n) => Self(n.to_string()),
            RawId::Text(s) => Self(s),
        })
    }
}

/// Recipient lists of a captured message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recipients {
    pub to: Vec<String>,
    #[serde(default)]
    pub cc: Vec<String>,
    #[serde(default)]
    pub bcc: Vec<String>,
    /// SMTP envelope recipients (RCPT TO)
    #[serde(default)]
    pub envelope: Vec<String>,
}

/// A message as listed by `GET /messages/` (no body information)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageSummary {
    pub id: MessageId,
    pub sender: String,
    pub recipients: Recipients,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub size: u64,
}

/// An attachment descriptor from the message detail endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub cid: Option<String>,
    #[serde(rename = "type", default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    pub href: String,
}

/// Full message information from `GET /messages/{id}.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageDetail {
    #[serde(flatten)]
    pub summary: MessageSummary,
    /// Download URL of the raw message
    pub href: String,
    /// Format name ("html", "plain", "source") to URL
    #[serde(default)]
    pub formats: BTreeMap<String, String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// Response body of the list endpoint.
///
/// Older servers wrap the list in `{"messages": [...]}`, newer ones
/// return the bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MessageList {
    Wrapped { messages: Vec<MessageSummary> },
    Bare(Vec<MessageSummary>),
}

impl MessageList {
    pub fn into_messages(self) -> Vec<MessageSummary> {
        match self {
            MessageList::Wrapped { messages } => messages,
            MessageList::Bare(messages) => messages,
        }
    }
}

/// Reply wrapper of servers that answer `{"code": "OK", "data": ...}`.
///
/// Failures come back with another `code` and an optional `message`.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    pub code: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl Envelope {
    pub const OK: &'static str = "OK";

    /// Bare replies never carry a string `code`
    pub fn wraps(body: &serde_json::Value) -> bool {
        body.get("code").is_some_and(serde_json::Value::is_string)
    }
}

/// Parse a server timestamp.
///
/// Accepts RFC 3339 as well as the naive forms the server writes
/// (`2024-05-01T10:00:00.123456` and `2024-05-01 10:00:00`), which are UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn deserialize_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_message_id_from_number_or_string() {
        let from_int: MessageId = serde_json::from_str("42").unwrap();
        let from_str: MessageId = serde_json::from_str("\"42\"").unwrap();
        assert_eq!(from_int, from_str);
        assert_eq!(from_int.as_str(), "42");
    }

    #[test]
    fn test_timestamp_forms() {
        let sqlite = parse_timestamp("2024-05-01 10:11:12").unwrap();
        assert_eq!(sqlite.hour(), 10);
        assert_eq!(sqlite.second(), 12);

        let iso = parse_timestamp("2024-05-01T10:11:12.500000").unwrap();
        assert_eq!(iso.day(), 1);

        let rfc = parse_timestamp("2024-05-01T12:11:12+02:00").unwrap();
        assert_eq!(rfc.hour(), 10);

        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_list_accepts_wrapped_and_bare() {
        let item = r#"{"id": 1, "sender": "a@example.com", "recipients": {"to": ["b@example.com"]},
                       "created_at": "2024-05-01 10:00:00", "subject": "Hi", "size": 12}"#;

        let wrapped: MessageList =
            serde_json::from_str(&format!(r#"{{"messages": [{}]}}"#, item)).unwrap();
        let bare: MessageList = serde_json::from_str(&format!("[{}]", item)).unwrap();

        let wrapped = wrapped.into_messages();
        assert_eq!(wrapped.len(), 1);
        assert_eq!(wrapped[0].recipients.to, vec!["b@example.com".to_string()]);
        assert_eq!(bare.into_messages(), wrapped);
    }

    #[test]
    fn test_detail_flattens_summary() {
        let json = r#"{
            "id": "7", "sender": "a@example.com", "recipients": {"to": []},
            "created_at": "2024-05-01T10:00:00", "subject": "Report", "size": 2048,
            "href": "/messages/7.eml",
            "formats": {"html": "/messages/7.html", "source": "/messages/7.source"},
            "attachments": [{"filename": "r.pdf", "type": "application/pdf", "size": 100,
                             "cid": "abc", "href": "/messages/7/parts/abc"}]
        }"#;
        let detail: MessageDetail = serde_json::from_str(json).unwrap();
        assert_eq!(detail.summary.id, MessageId::from("7"));
        assert_eq!(detail.formats.len(), 2);
        assert_eq!(detail.attachments[0].mime_type.as_deref(), Some("application/pdf"));
    }
}
