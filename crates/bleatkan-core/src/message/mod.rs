//! Wire messages.
//!
//! Requests go out as [`RequestMessage`], results come back as
//! [`ResultMessage`]. Both are JSON objects whose variant is chosen by the
//! keys present rather than by a tag field.

mod factory;
mod kinds;
mod request;
mod result;
mod validate;

pub use factory::{
    create_listen_state_mini, create_payload, create_pop_state_mini, create_push_state_mini,
    create_request, create_request_with_payload, create_set_state_mini,
    create_thumbnail_state_mini, create_unlisten_state_mini, event_list, list_state_mini,
    payload_event_list, payload_event_peek, peek_state_mini,
};
pub use kinds::{MessageEvent, MessagePayloadId, MessagePayloadType, PayloadEvent};
pub use request::{
    EventPayload, EventStatePayload, EventTokenPayload, NodeEvent, NodeList, RequestMessage,
    RequestPayload,
};
pub use result::{
    Entry, ResultMessage, ResultPayload, ResultPayloadPng, ResultPayloadState,
    ResultPayloadStateList, ResultWithEntryList, ResultWithPayload, State,
};
pub use validate::{validate_payload, validate_request};
