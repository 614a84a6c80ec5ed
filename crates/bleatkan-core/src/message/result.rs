//! Inbound results.
//!
//! Results are decoded structurally: a message with `payload` is a node
//! result, one with `entries` is a node list. Payloads with `states` are
//! state lists; payloads with `state` are either a thumbnail (when `png` is
//! present) or a bare state.

use super::kinds::MessageEvent;
use crate::error::{BleatError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// One node in a list result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    pub name: String,
}

/// One avatar state in a state list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    pub id: String,
    pub name: String,
}

/// Result from a single node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultWithPayload {
    pub event: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    pub name: String,
    pub payload: ResultPayload,
    #[serde(skip)]
    pub channel: String,
}

/// Result of a node list request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultWithEntryList {
    pub event: String,
    pub entries: Vec<Entry>,
    #[serde(skip)]
    pub channel: String,
}

/// A message received from the server.
///
/// `channel` is set by the receive pipeline after decoding and is never
/// serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ResultMessage {
    WithPayload(ResultWithPayload),
    WithEntryList(ResultWithEntryList),
}

/// List of avatar states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultPayloadStateList {
    pub event: String,
    pub states: Vec<State>,
}

/// A single state id, as returned by `peek` and `listen`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultPayloadState {
    pub event: String,
    pub state: String,
}

/// Thumbnail of a state. `png` is base64.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultPayloadPng {
    pub event: String,
    pub state: String,
    pub width: i32,
    pub height: i32,
    pub png: String,
}

/// Payload of a node result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ResultPayload {
    StateList(ResultPayloadStateList),
    State(ResultPayloadState),
    Png(ResultPayloadPng),
}

impl ResultMessage {
    /// Decode from JSON. The channel is left empty.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| BleatError::protocol(e.to_string(), json))
    }

    pub fn event(&self) -> &str {
        match self {
            ResultMessage::WithPayload(m) => &m.event,
            ResultMessage::WithEntryList(m) => &m.event,
        }
    }

    pub fn event_kind(&self) -> MessageEvent {
        MessageEvent::from_value(self.event())
    }

    /// Channel the message arrived on.
    pub fn channel(&self) -> &str {
        match self {
            ResultMessage::WithPayload(m) => &m.channel,
            ResultMessage::WithEntryList(m) => &m.channel,
        }
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        let channel = channel.into();
        match &mut self {
            ResultMessage::WithPayload(m) => m.channel = channel,
            ResultMessage::WithEntryList(m) => m.channel = channel,
        }
        self
    }

    /// Payload, if this is a node result.
    pub fn payload(&self) -> Option<&ResultPayload> {
        match self {
            ResultMessage::WithPayload(m) => Some(&m.payload),
            ResultMessage::WithEntryList(_) => None,
        }
    }
}

impl ResultPayload {
    pub fn event(&self) -> &str {
        match self {
            ResultPayload::StateList(p) => &p.event,
            ResultPayload::State(p) => &p.event,
            ResultPayload::Png(p) => &p.event,
        }
    }
}

impl ResultPayloadPng {
    /// Decode the base64 PNG body.
    pub fn png_bytes(&self) -> Result<Vec<u8>> {
        STANDARD
            .decode(self.png.trim())
            .map_err(|e| BleatError::Protocol {
                message: format!("thumbnail for state {} is not valid base64: {}", self.state, e),
                frame: None,
            })
    }

    /// Hash of the untransformed base64 body.
    pub fn png_hash(&self) -> blake3::Hash {
        blake3::hash(self.png.as_bytes())
    }
}

impl fmt::Debug for ResultPayloadPng {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hash = self.png_hash().to_hex();
        let short_hash = &hash.as_str()[..16];
        f.debug_struct("ResultPayloadPng")
            .field("event", &self.event)
            .field("state", &self.state)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("png_len", &self.png.len())
            .field("png_hash", &short_hash)
            .finish()
    }
}

impl<'de> Deserialize<'de> for ResultMessage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let obj = value
            .as_object()
            .ok_or_else(|| de::Error::custom("result must be a JSON object"))?;

        let has_payload = obj.contains_key("payload");
        let has_entries = obj.contains_key("entries");

        if has_payload {
            ResultWithPayload::deserialize(value)
                .map(ResultMessage::WithPayload)
                .map_err(de::Error::custom)
        } else if has_entries {
            ResultWithEntryList::deserialize(value)
                .map(ResultMessage::WithEntryList)
                .map_err(de::Error::custom)
        } else {
            Err(de::Error::custom("unsupported result type"))
        }
    }
}

impl<'de> Deserialize<'de> for ResultPayload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let obj = value
            .as_object()
            .ok_or_else(|| de::Error::custom("result payload must be a JSON object"))?;

        let has_states = obj.contains_key("states");
        let has_state = obj.contains_key("state");
        let has_png = obj.contains_key("png");

        if has_states {
            ResultPayloadStateList::deserialize(value)
                .map(ResultPayload::StateList)
                .map_err(de::Error::custom)
        } else if has_state && has_png {
            ResultPayloadPng::deserialize(value)
                .map(ResultPayload::Png)
                .map_err(de::Error::custom)
        } else if has_state {
            ResultPayloadState::deserialize(value)
                .map(ResultPayload::State)
                .map_err(de::Error::custom)
        } else {
            Err(de::Error::custom("unsupported result payload type"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_1PX: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNk+M9QDwADhgGAWjR9awAAAABJRU5ErkJggg==";

    #[test]
    fn test_decode_entry_list() {
        let message = ResultMessage::from_json(
            r#"{"event":"list","entries":[{"type":"stateEvents","id":"mini","name":"avatar state"}]}"#,
        )
        .unwrap();
        assert_eq!(message.event_kind(), MessageEvent::List);
        assert_eq!(message.channel(), "");
        match message {
            ResultMessage::WithEntryList(list) => {
                assert_eq!(list.entries.len(), 1);
                assert_eq!(list.entries[0].kind, "stateEvents");
                assert_eq!(list.entries[0].name, "avatar state");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_decode_state_list() {
        let message = ResultMessage::from_json(
            r#"{"event":"payload","type":"stateEvents","id":"mini","name":"avatar state",
                "payload":{"event":"list","states":[{"id":"0","name":"idle"},{"id":"1","name":"talk"}]}}"#,
        )
        .unwrap();
        match message.payload() {
            Some(ResultPayload::StateList(list)) => {
                assert_eq!(list.states.len(), 2);
                assert_eq!(list.states[1], State { id: "1".into(), name: "talk".into() });
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_decode_peek_and_thumb() {
        let peek: ResultPayload = serde_json::from_str(r#"{"event":"peek","state":"2"}"#).unwrap();
        assert!(matches!(peek, ResultPayload::State(ref p) if p.state == "2"));

        let json = format!(
            r#"{{"event":"thumb","state":"3","width":129,"height":129,"png":"{PNG_1PX}"}}"#
        );
        match serde_json::from_str::<ResultPayload>(&json).unwrap() {
            ResultPayload::Png(png) => {
                assert_eq!(png.event, "thumb");
                assert_eq!(png.state, "3");
                assert_eq!(png.width, 129);
                assert_eq!(png.height, 129);
                assert_eq!(png.png, PNG_1PX);
                assert_eq!(&png.png_bytes().unwrap()[1..4], b"PNG");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_decode_rejects_unknown_shapes() {
        assert!(ResultMessage::from_json(r#"{"event":"list"}"#).is_err());
        assert!(ResultMessage::from_json("not json").is_err());
        assert!(serde_json::from_str::<ResultPayload>(r#"{"event":"x"}"#).is_err());
    }

    #[test]
    fn test_channel_is_not_serialized() {
        let message = ResultMessage::from_json(r#"{"event":"list","entries":[]}"#)
            .unwrap()
            .with_channel("nodes");
        assert_eq!(message.channel(), "nodes");
        assert_eq!(
            serde_json::to_string(&message).unwrap(),
            r#"{"event":"list","entries":[]}"#
        );
    }

    #[test]
    fn test_png_debug_hides_body() {
        let png = ResultPayloadPng {
            event: "thumb".into(),
            state: "3".into(),
            width: 1,
            height: 1,
            png: PNG_1PX.into(),
        };
        let debug = format!("{png:?}");
        assert!(!debug.contains(PNG_1PX));
        assert!(debug.contains("png_len"));
    }

    #[test]
    fn test_png_bytes_rejects_garbage() {
        let png = ResultPayloadPng {
            event: "thumb".into(),
            state: "3".into(),
            width: 1,
            height: 1,
            png: "***".into(),
        };
        assert!(matches!(png.png_bytes(), Err(BleatError::Protocol { .. })));
    }
}
