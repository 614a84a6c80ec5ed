//! Known protocol values.
//!
//! Messages carry these as plain strings; the enums give them names and an
//! `Unknown` fallback for anything a newer server might send.

use std::fmt;

macro_rules! protocol_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident => $value:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            /// Value not recognised.
            Unknown,
            $($(#[$vmeta])* $variant,)+
        }

        impl $name {
            /// Every known value, excluding `Unknown`.
            pub const KNOWN: &'static [$name] = &[$($name::$variant,)+];

            /// Wire value. `Unknown` renders as `UNKNOWN`.
            pub fn value(&self) -> &'static str {
                match self {
                    $name::Unknown => "UNKNOWN",
                    $($name::$variant => $value,)+
                }
            }

            /// Look up a wire value, falling back to `Unknown`.
            pub fn from_value(value: &str) -> Self {
                match value {
                    $($value => $name::$variant,)+
                    _ => $name::Unknown,
                }
            }

            pub fn is_known(&self) -> bool {
                !matches!(self, $name::Unknown)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.value())
            }
        }
    };
}

protocol_enum! {
    /// Top-level `event` of a message.
    pub enum MessageEvent {
        Error => "error",
        Payload => "payload",
        List => "list",
    }
}

protocol_enum! {
    /// `type` of a node event.
    pub enum MessagePayloadType {
        StateEvents => "stateEvents",
    }
}

protocol_enum! {
    /// `id` of the node a request targets.
    pub enum MessagePayloadId {
        Mini => "mini",
    }
}

protocol_enum! {
    /// `event` inside a payload.
    pub enum PayloadEvent {
        /// List all states.
        List => "list",
        /// Current state.
        Peek => "peek",
        /// Thumbnail of a state.
        Thumb => "thumb",
        /// Switch to a state.
        Set => "set",
        /// Push a state on top of the current one.
        Push => "push",
        /// Pop a pushed state.
        Pop => "pop",
        /// Subscribe to state changes.
        Listen => "listen",
        /// Unsubscribe from state changes.
        Unlisten => "unlisten",
    }
}
