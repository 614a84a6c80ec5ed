//! Structural request validation.
//!
//! Every violated field is reported, not just the first, in the form
//! `Request: event (x);type (y);Payload: state (is blank);`.

use super::kinds::{MessageEvent, MessagePayloadId, MessagePayloadType, PayloadEvent};
use super::request::{RequestMessage, RequestPayload};
use crate::error::{BleatError, Result};
use std::fmt::Write as _;

/// Check a request against the known variant set.
pub fn validate_request(request: &RequestMessage) -> Result<()> {
    let mut errors = String::new();

    match request {
        RequestMessage::NodeList(m) => {
            if MessageEvent::from_value(&m.event) != MessageEvent::List {
                let _ = write!(errors, "event ({});", m.event);
            }
        }
        RequestMessage::NodeEvent(m) => {
            if MessageEvent::from_value(&m.event) != MessageEvent::Payload {
                let _ = write!(errors, "event ({});", m.event);
            }
            if !MessagePayloadType::from_value(&m.kind).is_known() {
                let _ = write!(errors, "type ({});", m.kind);
            }
            if !MessagePayloadId::from_value(&m.id).is_known() {
                let _ = write!(errors, "id ({});", m.id);
            }
            if let Err(e) = validate_payload(&m.payload) {
                errors.push_str(&e.to_string());
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(BleatError::State(format!("Request: {errors}")))
    }
}

/// Check a payload against the events its variant allows.
pub fn validate_payload(payload: &RequestPayload) -> Result<()> {
    let mut errors = String::new();

    match payload {
        RequestPayload::Event(p) => {
            if !matches!(
                PayloadEvent::from_value(&p.event),
                PayloadEvent::List | PayloadEvent::Peek
            ) {
                let _ = write!(errors, "event ({});", p.event);
            }
        }
        RequestPayload::EventToken(p) => {
            if !matches!(
                PayloadEvent::from_value(&p.event),
                PayloadEvent::Listen | PayloadEvent::Unlisten
            ) {
                let _ = write!(errors, "event ({});", p.event);
            }
            if p.token.trim().is_empty() {
                errors.push_str("token (is blank);");
            }
        }
        RequestPayload::EventState(p) => {
            if !matches!(
                PayloadEvent::from_value(&p.event),
                PayloadEvent::Set | PayloadEvent::Push | PayloadEvent::Pop | PayloadEvent::Thumb
            ) {
                let _ = write!(errors, "event ({});", p.event);
            }
            if p.state.trim().is_empty() {
                errors.push_str("state (is blank);");
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(BleatError::State(format!("Payload: {errors}")))
    }
}

impl RequestMessage {
    /// See [`validate_request`].
    pub fn validate(&self) -> Result<()> {
        validate_request(self)
    }
}

impl RequestPayload {
    /// See [`validate_payload`].
    pub fn validate(&self) -> Result<()> {
        validate_payload(self)
    }
}
