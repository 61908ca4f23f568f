//! Call model — canonical call record, lifecycle states, and the failures
//! that can stop a push from becoming a call.
//!
//! The controller in [`lifecycle`] is the only place call state changes.

pub mod audio;
pub mod identity;
pub mod lifecycle;
pub mod ports;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Display name used when a push carries neither a caller name nor a number.
pub const UNKNOWN_CALLER: &str = "Unknown";

/// Stable identifier of one call, adopted verbatim from the payload or
/// generated at first sight.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CallId(String);

impl CallId {
    /// Fresh random identifier (UUID v4, hyphenated).
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wrap an identifier that has already been validated by the resolver.
    pub(crate) fn from_validated(id: &str) -> Self {
        Self(id.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether an identifier reported back by the call UI refers to this call.
    ///
    /// Exact match, or both sides parse to the same UUID (call UIs tend to
    /// echo UUIDs uppercased).
    pub fn matches(&self, other: &str) -> bool {
        if self.0 == other {
            return true;
        }
        match (Uuid::parse_str(&self.0), Uuid::parse_str(other)) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

impl std::fmt::Display for CallId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a call record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CallSource {
    PushKit,
    ResumedActivity,
}

/// Canonical representation of one incoming call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRecord {
    pub id: CallId,
    /// Resolved display name: caller name, else caller number, else [`UNKNOWN_CALLER`].
    pub caller_name: String,
    /// Raw caller identifier, possibly empty.
    pub caller_number: String,
    pub is_video: bool,
    /// Original payload, kept for downstream consumers and never parsed again.
    pub raw_payload: serde_json::Value,
    pub source: CallSource,
    pub received_at: DateTime<Utc>,
}

/// Pick the name shown on the incoming-call UI.
pub fn display_caller(caller_name: &str, caller_number: &str) -> String {
    if !caller_name.is_empty() {
        caller_name.to_string()
    } else if !caller_number.is_empty() {
        caller_number.to_string()
    } else {
        UNKNOWN_CALLER.to_string()
    }
}

/// Lifecycle state of the tracked call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CallState {
    /// Record built, UI not yet shown.
    Pending,
    /// UI presentation requested.
    Ringing,
    Answered,
    Declined,
    Ended,
    TimedOut,
}

impl CallState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            CallState::Answered | CallState::Declined | CallState::Ended | CallState::TimedOut
        )
    }

    /// Still occupies the single call slot. An answered call stays live until
    /// it is ended so that its audio can be released.
    pub fn is_live(self) -> bool {
        matches!(self, CallState::Pending | CallState::Ringing | CallState::Answered)
    }
}

/// User or system action reported by the call UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    Accept,
    Decline,
    End,
    Timeout,
}

impl std::fmt::Display for UserAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            UserAction::Accept => "accept",
            UserAction::Decline => "decline",
            UserAction::End => "end",
            UserAction::Timeout => "timeout",
        };
        f.write_str(name)
    }
}

/// Reasons a push or resumed activity does not become a call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("activity cannot be resumed: {0}")]
    UnresumableActivity(String),

    #[error("invalid call identifier {id:?}: {reason}")]
    InvalidCallIdentifier { id: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_caller_fallbacks() {
        assert_eq!(display_caller("Alice", "+1555"), "Alice");
        assert_eq!(display_caller("", "+1555"), "+1555");
        assert_eq!(display_caller("", ""), "Unknown");
    }

    #[test]
    fn test_call_id_matches_uuid_case_insensitively() {
        let id = CallId::from_validated("3f2c1e8a-7b44-4d1e-9c1a-0b8e2f6d4a10");
        assert!(id.matches("3F2C1E8A-7B44-4D1E-9C1A-0B8E2F6D4A10"));
        assert!(!id.matches("00000000-0000-0000-0000-000000000000"));
    }

    #[test]
    fn test_call_id_opaque_match_is_exact() {
        let id = CallId::from_validated("abc-123");
        assert!(id.matches("abc-123"));
        assert!(!id.matches("ABC-123"));
    }

    #[test]
    fn test_terminal_and_live_states() {
        assert!(!CallState::Ringing.is_terminal());
        assert!(CallState::Answered.is_terminal());
        assert!(CallState::Answered.is_live());
        assert!(!CallState::Declined.is_live());
        assert!(!CallState::TimedOut.is_live());
    }

    #[test]
    fn test_generated_ids_are_distinct() {
        assert_ne!(CallId::generate(), CallId::generate());
    }
}
