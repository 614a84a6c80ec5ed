//! Outbound requests.
//!
//! Decoding picks the variant from the keys present, the same way the server
//! would: an `event` of `list` is a node list request, anything with a
//! `payload` is a node event. Inside a payload, `token` beats `state` beats a
//! bare `event`.

use crate::error::{BleatError, Result};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request to list nodes: `{"event":"list"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeList {
    pub event: String,
}

/// Request addressed to one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeEvent {
    pub event: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    pub payload: RequestPayload,
}

/// A request sent to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RequestMessage {
    NodeList(NodeList),
    NodeEvent(NodeEvent),
}

/// Payload carrying only an event (`list`, `peek`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPayload {
    pub event: String,
}

/// Payload carrying a listener token (`listen`, `unlisten`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTokenPayload {
    pub event: String,
    pub token: String,
}

/// Payload carrying a state id (`set`, `push`, `pop`, `thumb`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventStatePayload {
    pub event: String,
    pub state: String,
}

/// Payload of a node event request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RequestPayload {
    Event(EventPayload),
    EventToken(EventTokenPayload),
    EventState(EventStatePayload),
}

impl RequestMessage {
    pub fn event(&self) -> &str {
        match self {
            RequestMessage::NodeList(m) => &m.event,
            RequestMessage::NodeEvent(m) => &m.event,
        }
    }

    /// Encode as JSON.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| BleatError::protocol(e.to_string(), json))
    }
}

impl RequestPayload {
    pub fn event(&self) -> &str {
        match self {
            RequestPayload::Event(p) => &p.event,
            RequestPayload::EventToken(p) => &p.event,
            RequestPayload::EventState(p) => &p.event,
        }
    }

    /// Encode as JSON.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl<'de> Deserialize<'de> for RequestMessage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let obj = value
            .as_object()
            .ok_or_else(|| de::Error::custom("request must be a JSON object"))?;

        let is_list = obj.get("event").and_then(Value::as_str) == Some("list");
        let has_payload = obj.contains_key("payload");

        if is_list {
            NodeList::deserialize(value)
                .map(RequestMessage::NodeList)
                .map_err(de::Error::custom)
        } else if has_payload {
            NodeEvent::deserialize(value)
                .map(RequestMessage::NodeEvent)
                .map_err(de::Error::custom)
        } else {
            Err(de::Error::custom("unsupported request type"))
        }
    }
}

impl<'de> Deserialize<'de> for RequestPayload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let obj = value
            .as_object()
            .ok_or_else(|| de::Error::custom("request payload must be a JSON object"))?;

        let (has_token, has_state, has_event) = (
            obj.contains_key("token"),
            obj.contains_key("state"),
            obj.contains_key("event"),
        );

        if has_token {
            EventTokenPayload::deserialize(value)
                .map(RequestPayload::EventToken)
                .map_err(de::Error::custom)
        } else if has_state {
            EventStatePayload::deserialize(value)
                .map(RequestPayload::EventState)
                .map_err(de::Error::custom)
        } else if has_event {
            EventPayload::deserialize(value)
                .map(RequestPayload::Event)
                .map_err(de::Error::custom)
        } else {
            Err(de::Error::custom("unsupported payload type"))
        }
    }
}
