//! Instance descriptor files.
//!
//! Each running veadotube instance rewrites a small JSON file roughly once a
//! second: `{"time": <unix seconds>, "name": "...", "server": "host:port"}`.

use crate::config::DiscoveryConfig;
use crate::error::{BleatError, Result};
use serde::{Deserialize, Serialize};

/// Contents of one descriptor file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VtInstance {
    /// Last refresh, unix seconds.
    pub time: i64,
    pub name: String,
    /// `host:port` of the WebSocket server.
    pub server: String,
}

impl VtInstance {
    /// Decode and check descriptor contents.
    ///
    /// `now` and `timeout_secs` define the staleness window: a record whose
    /// `time` is older than `now - timeout_secs` is rejected.
    pub fn parse(contents: &str, now: i64, timeout_secs: i64) -> Result<Self> {
        if contents.trim().is_empty() || contents.len() <= 2 {
            return Err(BleatError::Format("descriptor is empty".into()));
        }

        let record: VtInstance = serde_json::from_str(contents)
            .map_err(|e| BleatError::Format(format!("descriptor is not valid JSON: {e}")))?;

        if record.time <= 0 {
            return Err(BleatError::Format("descriptor missing timestamp".into()));
        }
        if record.time < now - timeout_secs {
            return Err(BleatError::Format(format!(
                "descriptor expired: time {} is older than {}s",
                record.time, timeout_secs
            )));
        }
        if record.name.trim().is_empty() {
            return Err(BleatError::Format("descriptor missing name".into()));
        }
        if record.server.trim().is_empty() || record.server.len() < DiscoveryConfig::SERVER_MIN_LEN
        {
            return Err(BleatError::Format(format!(
                "descriptor missing server ({:?})",
                record.server
            )));
        }

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_719_655_700;

    fn body(time: i64, name: &str, server: &str) -> String {
        serde_json::json!({ "time": time, "name": name, "server": server }).to_string()
    }

    #[test]
    fn test_parse_valid() {
        let record = VtInstance::parse(&body(NOW - 2, "veadotube mini", "127.0.0.1:40214"), NOW, 10)
            .unwrap();
        assert_eq!(record.name, "veadotube mini");
        assert_eq!(record.server, "127.0.0.1:40214");
        assert_eq!(record.time, NOW - 2);
    }

    #[test]
    fn test_parse_edge_of_window() {
        assert!(VtInstance::parse(&body(NOW - 10, "mini", "localhost:1"), NOW, 10).is_ok());
        assert!(VtInstance::parse(&body(NOW - 11, "mini", "localhost:1"), NOW, 10).is_err());
    }

    #[test]
    fn test_parse_rejects() {
        let cases = [
            String::new(),
            "{}".to_string(),
            "   \n".to_string(),
            "{\"time\": 17".to_string(),
            body(0, "mini", "127.0.0.1:40214"),
            body(-5, "mini", "127.0.0.1:40214"),
            body(NOW, " ", "127.0.0.1:40214"),
            body(NOW, "mini", ""),
            body(NOW, "mini", ":0"),
            body(NOW, "mini", "a:0"),
        ];
        for contents in cases {
            let err = VtInstance::parse(&contents, NOW, 10).unwrap_err();
            assert!(matches!(err, BleatError::Format(_)), "{contents:?}");
        }
    }
}
