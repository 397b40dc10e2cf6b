//! Live event decoding
//!
//! The server announces changes either as comma-delimited text frames
//! (`add_message,12`) or as structured socket-style packets
//! (`{"type": "event", "name": "add_message", "args": [12]}`). Both are
//! decoded here into [`StreamEvent`] so nothing past the transport
//! needs to know which encoding was used.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{ClientError, ClientResult};
use crate::types::MessageId;

/// A change announced by the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A message was captured
    Add(MessageId),
    /// A message was deleted
    Delete(MessageId),
    /// All messages were deleted
    ClearAll,
}

#[derive(Debug, Deserialize)]
struct EventPacket {
    #[serde(rename = "type")]
    kind: Option<String>,
    name: String,
    #[serde(default)]
    args: Vec<Value>,
}

impl StreamEvent {
    /// Decode one text frame.
    ///
    /// Returns `Ok(None)` for well-formed frames carrying events this
    /// client does not care about.
    pub fn decode(frame: &str) -> ClientResult<Option<Self>> {
        let frame = frame.trim();
        if frame.starts_with('{') {
            Self::decode_packet(frame)
        } else {
            let mut parts = frame.split(',').map(str::trim);
            let name = parts.next().unwrap_or_default();
            let arg = parts.next().map(MessageId::from);
            Self::from_parts(name, arg)
        }
    }

    fn decode_packet(frame: &str) -> ClientResult<Option<Self>> {
        let packet: EventPacket =
            serde_json::from_str(frame).map_err(|e| ClientError::DecodeError(e.to_string()))?;

        if let Some(kind) = packet.kind.as_deref() {
            if kind != "event" {
                debug!("Ignoring {} packet", kind);
                return Ok(None);
            }
        }

        let arg = match packet.args.first() {
            Some(Value::Number(n)) => Some(MessageId::from(n.to_string())),
            Some(Value::String(s)) => Some(MessageId::from(s.as_str())),
            Some(other) => {
                return Err(ClientError::DecodeError(format!(
                    "unexpected argument {} for {}",
                    other, packet.name
                )))
            }
            None => None,
        };

        Self::from_parts(&packet.name, arg)
    }

    fn from_parts(name: &str, arg: Option<MessageId>) -> ClientResult<Option<Self>> {
        let needs_id = |arg: Option<MessageId>| {
            arg.filter(|id| !id.as_str().is_empty())
                .ok_or_else(|| ClientError::DecodeError(format!("{} without message id", name)))
        };

        match name {
            "add_message" => Ok(Some(StreamEvent::Add(needs_id(arg)?))),
            "delete_message" => Ok(Some(StreamEvent::Delete(needs_id(arg)?))),
            "delete_messages" => Ok(Some(StreamEvent::ClearAll)),
            "" => Err(ClientError::DecodeError("empty frame".to_string())),
            other => {
                debug!("Ignoring unknown event {}", other);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_frames() {
        assert_eq!(
            StreamEvent::decode("add_message,12").unwrap(),
            Some(StreamEvent::Add(MessageId::from("12")))
        );
        assert_eq!(
            StreamEvent::decode("delete_message,3\n").unwrap(),
            Some(StreamEvent::Delete(MessageId::from("3")))
        );
        assert_eq!(
            StreamEvent::decode("delete_messages").unwrap(),
            Some(StreamEvent::ClearAll)
        );
    }

    #[test]
    fn test_structured_frames() {
        assert_eq!(
            StreamEvent::decode(r#"{"type": "event", "name": "add_message", "args": [12], "endpoint": ""}"#)
                .unwrap(),
            Some(StreamEvent::Add(MessageId::from("12")))
        );
        assert_eq!(
            StreamEvent::decode(r#"{"name": "delete_message", "args": ["abc"]}"#).unwrap(),
            Some(StreamEvent::Delete(MessageId::from("abc")))
        );
        assert_eq!(
            StreamEvent::decode(r#"{"name": "delete_messages"}"#).unwrap(),
            Some(StreamEvent::ClearAll)
        );
        assert_eq!(
            StreamEvent::decode(r#"{"type": "heartbeat", "name": "ping"}"#).unwrap(),
            None
        );
    }

    #[test]
    fn test_unknown_and_malformed() {
        assert_eq!(StreamEvent::decode("something_else,1").unwrap(), None);
        assert!(StreamEvent::decode("add_message").is_err());
        assert!(StreamEvent::decode("add_message,").is_err());
        assert!(StreamEvent::decode("").is_err());
        assert!(StreamEvent::decode("{not json").is_err());
        assert!(StreamEvent::decode(r#"{"name": "add_message", "args": [{"id": 1}]}"#).is_err());
    }
}
