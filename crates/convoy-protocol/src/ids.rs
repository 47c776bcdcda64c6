//! Canonical ID types for the coordination engine.
//!
//! IDs are opaque String wrappers (serde-transparent). Entities use random
//! UUIDs; message IDs carry a time-based prefix so the queue stays human
//! scannable, with a random suffix against concurrent enqueuers. Uniqueness
//! is still enforced at the storage layer, never assumed from generation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! typed_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create from any string value.
            pub fn from_string(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Create a new ID using UUID v4 (random).
            pub fn new_uuid() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            /// View as string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new_uuid()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

typed_id!(
    /// Unique identifier for a shipment.
    ShipmentId
);
typed_id!(
    /// Unique identifier for a risk record.
    RiskId
);
typed_id!(
    /// Globally unique identifier for a queued agent message.
    MessageId
);
typed_id!(
    /// Unique identifier for an agent activity record.
    ActivityId
);

impl MessageId {
    /// Generate a message ID with a time prefix and random suffix.
    ///
    /// The timestamp keeps queue dumps readable in enqueue order; the
    /// suffix disambiguates concurrent enqueuers. The queue rejects
    /// duplicates regardless, so a collision only costs a retry.
    pub fn generate(now: DateTime<Utc>) -> Self {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        Self(format!(
            "msg-{}-{}",
            now.format("%Y%m%d%H%M%S%3f"),
            &suffix[..8]
        ))
    }
}
