//! `<channel>:<json>` framing.
//!
//! Frames from the server may carry trailing NUL padding after the JSON body.

use crate::error::{BleatError, Result};

/// Prefix `json` with its channel.
pub fn frame(channel: &str, json: &str) -> String {
    let mut out = String::with_capacity(channel.len() + 1 + json.len());
    out.push_str(channel);
    out.push(':');
    out.push_str(json);
    out
}

/// Split a frame into its channel and JSON body.
///
/// The first `:` must come before the first `{` and must not be the first
/// byte. The body runs up to the first NUL, if any.
pub fn unframe(text: &str) -> Result<(&str, &str)> {
    let bytes = text.as_bytes();
    let colon = match bytes.iter().position(|&b| b == b':') {
        Some(i) if i > 0 => i,
        _ => return Err(BleatError::protocol("Received message missing '<channel>:'", text)),
    };
    if let Some(brace) = bytes.iter().position(|&b| b == b'{') {
        if brace < colon {
            return Err(BleatError::protocol("Received message missing '<channel>:'", text));
        }
    }

    let channel = &text[..colon];
    if channel.trim().is_empty() {
        return Err(BleatError::protocol("Received message with blank channel name", text));
    }

    let body = &text[colon + 1..];
    let body = match body.find('\0') {
        Some(nul) => &body[..nul],
        None => body,
    };
    Ok((channel, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame() {
        assert_eq!(frame("nodes", r#"{"event":"list"}"#), r#"nodes:{"event":"list"}"#);
    }

    #[test]
    fn test_unframe() {
        let (channel, body) = unframe(r#"nodes:{"event":"list","entries":[]}"#).unwrap();
        assert_eq!(channel, "nodes");
        assert_eq!(body, r#"{"event":"list","entries":[]}"#);
    }

    #[test]
    fn test_unframe_strips_nul_padding() {
        let (channel, body) = unframe("nodes:{\"a\":1}\0\0\0\0").unwrap();
        assert_eq!(channel, "nodes");
        assert_eq!(body, r#"{"a":1}"#);
    }

    #[test]
    fn test_unframe_colon_inside_body() {
        let (channel, body) = unframe(r#"nodes:{"name":"a:b"}"#).unwrap();
        assert_eq!(channel, "nodes");
        assert_eq!(body, r#"{"name":"a:b"}"#);
    }

    #[test]
    fn test_unframe_rejects_malformed() {
        assert!(unframe(r#"{"event":"list"}"#).is_err());
        assert!(unframe(r#":{"event":"list"}"#).is_err());
        assert!(unframe(r#"{"a":"b"}:x"#).is_err());
        assert!(unframe(r#"   :{"event":"list"}"#).is_err());
        assert!(unframe("").is_err());
    }
}
