//! Request builders.
//!
//! Argument-free requests are built once and shared. The accessors return the
//! same `&'static` value on every call; builders that resolve to one of them
//! return an equal clone.

use super::kinds::{MessageEvent, MessagePayloadId, MessagePayloadType, PayloadEvent};
use super::request::{
    EventPayload, EventStatePayload, EventTokenPayload, NodeEvent, NodeList, RequestMessage,
    RequestPayload,
};
use crate::error::{BleatError, Result};
use std::sync::LazyLock;

static EVENT_LIST: LazyLock<RequestMessage> = LazyLock::new(|| {
    RequestMessage::NodeList(NodeList {
        event: MessageEvent::List.value().to_string(),
    })
});

static PAYLOAD_EVENT_LIST: LazyLock<RequestPayload> = LazyLock::new(|| {
    RequestPayload::Event(EventPayload {
        event: PayloadEvent::List.value().to_string(),
    })
});

static PAYLOAD_EVENT_PEEK: LazyLock<RequestPayload> = LazyLock::new(|| {
    RequestPayload::Event(EventPayload {
        event: PayloadEvent::Peek.value().to_string(),
    })
});

static LIST_STATE_MINI: LazyLock<RequestMessage> =
    LazyLock::new(|| node_event_mini(payload_event_list().clone()));

static PEEK_STATE_MINI: LazyLock<RequestMessage> =
    LazyLock::new(|| node_event_mini(payload_event_peek().clone()));

fn node_event_mini(payload: RequestPayload) -> RequestMessage {
    RequestMessage::NodeEvent(NodeEvent {
        event: MessageEvent::Payload.value().to_string(),
        kind: MessagePayloadType::StateEvents.value().to_string(),
        id: MessagePayloadId::Mini.value().to_string(),
        payload,
    })
}

/// `{"event":"list"}`: list every node on the server.
pub fn event_list() -> &'static RequestMessage {
    &EVENT_LIST
}

/// `{"event":"list"}` as a payload.
pub fn payload_event_list() -> &'static RequestPayload {
    &PAYLOAD_EVENT_LIST
}

/// `{"event":"peek"}` as a payload.
pub fn payload_event_peek() -> &'static RequestPayload {
    &PAYLOAD_EVENT_PEEK
}

/// List the avatar states of the `mini` node.
pub fn list_state_mini() -> &'static RequestMessage {
    &LIST_STATE_MINI
}

/// Current avatar state of the `mini` node.
pub fn peek_state_mini() -> &'static RequestMessage {
    &PEEK_STATE_MINI
}

/// Build a request.
///
/// `List` ignores every other argument. `Payload` needs a type of
/// `stateEvents`, an id and a payload.
pub fn create_request(
    event: MessageEvent,
    kind: Option<MessagePayloadType>,
    id: Option<MessagePayloadId>,
    payload: Option<RequestPayload>,
) -> Result<RequestMessage> {
    match event {
        MessageEvent::List => Ok(event_list().clone()),
        MessageEvent::Payload => match kind {
            Some(MessagePayloadType::StateEvents) => {
                let id = id.ok_or_else(|| {
                    BleatError::Argument(format!(
                        "Id cannot be Null for Request {} with Type {}",
                        MessageEvent::Payload,
                        MessagePayloadType::StateEvents
                    ))
                })?;
                if !id.is_known() {
                    return Err(BleatError::Argument("Id cannot be UNKNOWN".into()));
                }
                let payload = payload.ok_or_else(|| {
                    BleatError::Argument(format!(
                        "Payload cannot be Null for Request {} with Type {}",
                        MessageEvent::Payload,
                        MessagePayloadType::StateEvents
                    ))
                })?;
                Ok(RequestMessage::NodeEvent(NodeEvent {
                    event: event.value().to_string(),
                    kind: MessagePayloadType::StateEvents.value().to_string(),
                    id: id.value().to_string(),
                    payload,
                }))
            }
            Some(MessagePayloadType::Unknown) => {
                Err(BleatError::Argument("Type cannot be UNKNOWN".into()))
            }
            None => Err(BleatError::Argument(format!(
                "Type cannot be Null for Request {}",
                MessageEvent::Payload
            ))),
        },
        other => Err(BleatError::Argument(format!(
            "Event can't be {}, must be {} or {}",
            other,
            MessageEvent::List,
            MessageEvent::Payload
        ))),
    }
}

/// Build a payload.
///
/// `listen`/`unlisten` take a token, `set`/`push`/`pop`/`thumb` take a state
/// id; either is trimmed and must not be blank. `list`/`peek` ignore `value`.
pub fn create_payload(event: PayloadEvent, value: Option<&str>) -> Result<RequestPayload> {
    let required = |what: &str| {
        value
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                BleatError::Argument(format!(
                    "{what} Value for Payload {event} Event can't be Null or Blank"
                ))
            })
    };

    match event {
        PayloadEvent::Unknown => Err(BleatError::Argument("Payload Event can't be UNKNOWN".into())),
        PayloadEvent::List => Ok(payload_event_list().clone()),
        PayloadEvent::Peek => Ok(payload_event_peek().clone()),
        PayloadEvent::Listen | PayloadEvent::Unlisten => {
            Ok(RequestPayload::EventToken(EventTokenPayload {
                event: event.value().to_string(),
                token: required("Token")?,
            }))
        }
        PayloadEvent::Set | PayloadEvent::Push | PayloadEvent::Pop | PayloadEvent::Thumb => {
            Ok(RequestPayload::EventState(EventStatePayload {
                event: event.value().to_string(),
                state: required("State")?,
            }))
        }
    }
}

/// Build a request and its payload in one call.
pub fn create_request_with_payload(
    event: MessageEvent,
    kind: Option<MessagePayloadType>,
    id: Option<MessagePayloadId>,
    payload_event: PayloadEvent,
    payload_value: Option<&str>,
) -> Result<RequestMessage> {
    let payload = create_payload(payload_event, payload_value)?;
    create_request(event, kind, id, Some(payload))
}

fn mini_request(payload_event: PayloadEvent, value: &str) -> Result<RequestMessage> {
    create_request_with_payload(
        MessageEvent::Payload,
        Some(MessagePayloadType::StateEvents),
        Some(MessagePayloadId::Mini),
        payload_event,
        Some(value),
    )
}

/// Switch the `mini` node to a state.
pub fn create_set_state_mini(state_id: &str) -> Result<RequestMessage> {
    mini_request(PayloadEvent::Set, state_id)
}

/// Push a state on the `mini` node.
pub fn create_push_state_mini(state_id: &str) -> Result<RequestMessage> {
    mini_request(PayloadEvent::Push, state_id)
}

/// Pop a pushed state on the `mini` node.
pub fn create_pop_state_mini(state_id: &str) -> Result<RequestMessage> {
    mini_request(PayloadEvent::Pop, state_id)
}

/// Subscribe to state changes of the `mini` node under `token`.
pub fn create_listen_state_mini(token: &str) -> Result<RequestMessage> {
    mini_request(PayloadEvent::Listen, token)
}

pub fn create_unlisten_state_mini(token: &str) -> Result<RequestMessage> {
    mini_request(PayloadEvent::Unlisten, token)
}

/// Request the thumbnail of a state of the `mini` node.
pub fn create_thumbnail_state_mini(state_id: &str) -> Result<RequestMessage> {
    mini_request(PayloadEvent::Thumb, state_id)
}
