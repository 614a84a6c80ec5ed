//! Instance identifiers.
//!
//! veadotube names each descriptor file after the running instance:
//! `<kind>-<launch timestamp, 16 hex digits>-<process id, 8 hex digits>`,
//! e.g. `mini-08dc982355adb2b7-00002020`. The timestamp is in .NET ticks.

use crate::error::{BleatError, Result};
use crate::time::universal_ticks_to_unix_seconds;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

const TIMESTAMP_HEX_LEN: usize = 16;
const PROCESS_HEX_LEN: usize = 8;

/// Identity of one running veadotube instance.
///
/// Equal iff kind, timestamp and process id are equal. Ordered by launch
/// timestamp, then by canonical string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceId {
    kind: String,
    timestamp: i64,
    process: u32,
    canonical: String,
}

impl InstanceId {
    /// Build an ID from its parts.
    pub fn new(kind: impl Into<String>, timestamp: i64, process: u32) -> Result<Self> {
        let kind = kind.into();
        if timestamp <= 0 {
            return Err(BleatError::Argument("Timestamp must be greater than 0".into()));
        }
        if process == 0 {
            return Err(BleatError::Argument("Process must be greater than 0".into()));
        }
        if kind.trim().is_empty() {
            return Err(BleatError::Argument(
                "Instance ID String must not be empty or blank".into(),
            ));
        }
        if !kind.chars().all(char::is_alphabetic) {
            return Err(BleatError::Argument(
                "Instance ID String Invalid: 1st part contains non-letter characters".into(),
            ));
        }

        let canonical = format_id(&kind, timestamp, process);
        Ok(Self {
            kind,
            timestamp,
            process,
            canonical,
        })
    }

    /// Parse a canonical ID string. Surrounding whitespace is ignored.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(format_error("Instance ID String must not be empty or blank"));
        }

        let parts: Vec<&str> = input.split('-').collect();
        if parts.len() != 3 {
            return Err(format_error(
                "Instance ID String Invalid: Must be 3 parts, separated by dashes (-)",
            ));
        }
        if parts[1].len() != TIMESTAMP_HEX_LEN {
            return Err(format_error(
                "Instance ID String Invalid: 2nd part must be 16 Characters long",
            ));
        }
        if parts[2].len() != PROCESS_HEX_LEN {
            return Err(format_error(
                "Instance ID String Invalid: 3nd part must be 8 Characters long",
            ));
        }

        let timestamp = parse_hex(parts[1])
            .and_then(|v| i64::from_str_radix(v, 16).ok())
            .ok_or_else(|| {
                format_error("Instance ID String Invalid: 2nd part is not valid Hex Value")
            })?;
        let process = parse_hex(parts[2])
            .and_then(|v| u32::from_str_radix(v, 16).ok())
            .ok_or_else(|| {
                format_error("Instance ID String Invalid: 3rd part is not valid Hex Value")
            })?;

        let kind = parts[0];
        if kind.is_empty() || !kind.chars().all(char::is_alphabetic) {
            return Err(format_error(
                "Instance ID String Invalid: 1st part contains non-letter characters",
            ));
        }

        // Zero fields are well-formed hex but not a valid instance.
        Self::new(kind, timestamp, process)
    }

    /// Instance kind, e.g. `mini`.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Launch timestamp in .NET ticks.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn process(&self) -> u32 {
        self.process
    }

    /// Launch time in unix seconds.
    pub fn launch_unix_seconds(&self) -> i64 {
        universal_ticks_to_unix_seconds(self.timestamp)
    }

    /// Canonical string form.
    pub fn as_str(&self) -> &str {
        &self.canonical
    }
}

fn format_id(kind: &str, timestamp: i64, process: u32) -> String {
    format!("{kind}-{timestamp:016x}-{process:08x}")
}

fn format_error(message: &str) -> BleatError {
    BleatError::Format(message.to_string())
}

/// `from_str_radix` accepts a leading sign; hex digits only here.
fn parse_hex(value: &str) -> Option<&str> {
    value
        .chars()
        .all(|c| c.is_ascii_hexdigit())
        .then_some(value)
}

impl FromStr for InstanceId {
    type Err = BleatError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

impl Ord for InstanceId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then_with(|| self.canonical.cmp(&other.canonical))
    }
}

impl PartialOrd for InstanceId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID_1: &str = "mini-08dc982355adb2b7-00002020";
    const ID_2: &str = "mini-08dc9cd35f178af0-00005ff0";

    #[test]
    fn test_parse_fields() {
        let id = InstanceId::parse(ID_1).unwrap();
        assert_eq!(id.kind(), "mini");
        assert_eq!(id.timestamp(), 638_552_524_708_491_959);
        assert_eq!(id.process(), 8224);

        let id = InstanceId::parse(ID_2).unwrap();
        assert_eq!(id.timestamp(), 638_557_678_827_178_736);
        assert_eq!(id.process(), 24560);
    }

    #[test]
    fn test_round_trip() {
        for s in [ID_1, ID_2, "mini-08dc8d3c583c0587-00000f38"] {
            assert_eq!(InstanceId::parse(s).unwrap().to_string(), s);
        }
        assert_eq!(InstanceId::parse(&format!("  {ID_1}\n")).unwrap().as_str(), ID_1);
    }

    #[test]
    fn test_new_matches_parse() {
        let built = InstanceId::new("mini", 638_552_524_708_491_959, 8224).unwrap();
        let parsed: InstanceId = ID_1.parse().unwrap();
        assert_eq!(built, parsed);
        assert_eq!(built.to_string(), ID_1);
    }

    #[test]
    fn test_new_rejects_invalid_fields() {
        let err = InstanceId::new("mini", 0, 1).unwrap_err();
        assert_eq!(err.to_string(), "Timestamp must be greater than 0");

        let err = InstanceId::new("mini", 1, 0).unwrap_err();
        assert_eq!(err.to_string(), "Process must be greater than 0");

        assert!(InstanceId::new("  ", 1, 1).is_err());
        assert!(InstanceId::new("mini2", 1, 1).is_err());
    }

    #[test]
    fn test_parse_errors() {
        let cases = [
            ("", "Instance ID String must not be empty or blank"),
            ("   ", "Instance ID String must not be empty or blank"),
            (
                "mini-08dc982355adb2b7",
                "Instance ID String Invalid: Must be 3 parts, separated by dashes (-)",
            ),
            (
                "mini-08dc9823-00002020",
                "Instance ID String Invalid: 2nd part must be 16 Characters long",
            ),
            (
                "mini-08dc982355adb2b7-2020",
                "Instance ID String Invalid: 3nd part must be 8 Characters long",
            ),
            (
                "mini-08dc9cd35f178afx-00005ff0",
                "Instance ID String Invalid: 2nd part is not valid Hex Value",
            ),
            (
                "mini-+8dc9cd35f178af0-00005ff0",
                "Instance ID String Invalid: 2nd part is not valid Hex Value",
            ),
            (
                "mini-08dc9cd35f178af0-0000zzzz",
                "Instance ID String Invalid: 3rd part is not valid Hex Value",
            ),
            (
                "min1-08dc9cd35f178af0-00005ff0",
                "Instance ID String Invalid: 1st part contains non-letter characters",
            ),
        ];

        for (input, message) in cases {
            let err = InstanceId::parse(input).unwrap_err();
            assert!(matches!(err, BleatError::Format(_)), "{input}");
            assert_eq!(err.to_string(), message, "{input}");
        }
    }

    #[test]
    fn test_parse_rejects_zero_fields() {
        let err = InstanceId::parse("mini-0000000000000000-00000000").unwrap_err();
        assert!(matches!(err, BleatError::Argument(_)));
        assert_eq!(err.to_string(), "Timestamp must be greater than 0");

        let err = InstanceId::parse("mini-08dc9cd35f178af0-00000000").unwrap_err();
        assert!(matches!(err, BleatError::Argument(_)));
        assert_eq!(err.to_string(), "Process must be greater than 0");

        assert!(InstanceId::parse("mini-0000000000000001-00000001").is_ok());
    }

    #[test]
    fn test_ordering() {
        let id1 = InstanceId::parse(ID_1).unwrap();
        let id2 = InstanceId::parse(ID_2).unwrap();
        assert!(id1 < id2);
        assert_eq!(id2.cmp(&id1), Ordering::Greater);
        assert_eq!(id1.cmp(&InstanceId::parse(ID_1).unwrap()), Ordering::Equal);
    }

    #[test]
    fn test_ordering_ties_break_on_string() {
        let t = 638_552_524_708_491_959;
        let a = InstanceId::new("mini", t, 0x10).unwrap();
        let b = InstanceId::new("mini", t, 0x20).unwrap();
        assert_eq!(a.cmp(&b), a.to_string().cmp(&b.to_string()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_uppercase_hex_is_normalised() {
        let upper = InstanceId::parse("mini-08DC982355ADB2B7-00002020").unwrap();
        let lower = InstanceId::parse(ID_1).unwrap();
        assert_eq!(upper, lower);
        assert_eq!(upper.cmp(&lower), Ordering::Equal);
    }

    #[test]
    fn test_launch_unix_seconds() {
        let id = InstanceId::parse(ID_1).unwrap();
        assert_eq!(id.launch_unix_seconds(), 1_719_655_670);
    }
}
