//! Call identity resolution.
//!
//! Picks the identifier a call is tracked under and refuses identifiers the
//! call UI could not echo back reliably.

use uuid::Uuid;

use super::{BridgeError, CallId};

/// Longest opaque identifier accepted.
const MAX_OPAQUE_ID_LEN: usize = 128;

/// How strictly explicitly supplied identifiers are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdPolicy {
    /// Any well-formed token; UUID-shaped tokens must still parse as UUIDs.
    #[default]
    Opaque,
    /// Every supplied identifier must be a UUID.
    StrictUuid,
}

impl IdPolicy {
    pub fn from_strict(strict: bool) -> Self {
        if strict {
            IdPolicy::StrictUuid
        } else {
            IdPolicy::Opaque
        }
    }
}

/// Resolve the final call identifier.
///
/// Precedence: non-empty `metadata.call_id`, then non-empty payload-level
/// `call_id`, then a freshly generated UUID. A supplied identifier is adopted
/// verbatim once it validates; it is never replaced by a generated one.
pub fn resolve_call_id(
    metadata_id: Option<&str>,
    payload_id: Option<&str>,
    policy: IdPolicy,
) -> Result<CallId, BridgeError> {
    let candidate = metadata_id
        .filter(|id| !id.is_empty())
        .or_else(|| payload_id.filter(|id| !id.is_empty()));

    match candidate {
        Some(id) => {
            validate(id, policy)?;
            Ok(CallId::from_validated(id))
        }
        None => Ok(CallId::generate()),
    }
}

fn validate(id: &str, policy: IdPolicy) -> Result<(), BridgeError> {
    let invalid = |reason: &str| BridgeError::InvalidCallIdentifier {
        id: id.to_string(),
        reason: reason.to_string(),
    };

    if policy == IdPolicy::StrictUuid || looks_like_uuid(id) {
        return Uuid::parse_str(id)
            .map(|_| ())
            .map_err(|e| invalid(&format!("not a UUID ({})", e)));
    }

    if id.len() > MAX_OPAQUE_ID_LEN {
        return Err(invalid("too long"));
    }
    if id.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(invalid("contains whitespace or control characters"));
    }
    Ok(())
}

/// 8-4-4-4-12 layout, regardless of whether the groups are hex.
fn looks_like_uuid(id: &str) -> bool {
    let bytes = id.as_bytes();
    bytes.len() == 36 && [8, 13, 18, 23].iter().all(|&i| bytes[i] == b'-')
}

#[cfg(test)]
mod tests {
    use super::*;

    const UUID: &str = "6a1f3b52-0c9d-4e0b-8a73-2d5e9f41c7b8";

    #[test]
    fn test_metadata_id_wins() {
        let id = resolve_call_id(Some(UUID), Some("abc-123"), IdPolicy::Opaque).unwrap();
        assert_eq!(id.as_str(), UUID);
    }

    #[test]
    fn test_empty_metadata_id_falls_back_to_payload_id() {
        let id = resolve_call_id(Some(""), Some("abc-123"), IdPolicy::Opaque).unwrap();
        assert_eq!(id.as_str(), "abc-123");
    }

    #[test]
    fn test_generates_when_nothing_supplied() {
        let id = resolve_call_id(Some(""), None, IdPolicy::StrictUuid).unwrap();
        assert!(Uuid::parse_str(id.as_str()).is_ok());
    }

    #[test]
    fn test_same_metadata_id_resolves_identically() {
        let a = resolve_call_id(Some("xyz"), None, IdPolicy::Opaque).unwrap();
        let b = resolve_call_id(Some("xyz"), None, IdPolicy::Opaque).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_strict_policy_rejects_non_uuid() {
        let err = resolve_call_id(Some("xyz"), None, IdPolicy::StrictUuid).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidCallIdentifier { ref id, .. } if id == "xyz"));
    }

    #[test]
    fn test_uuid_shaped_garbage_is_rejected() {
        let bogus = "zzzzzzzz-zzzz-zzzz-zzzz-zzzzzzzzzzzz";
        let err = resolve_call_id(Some(bogus), None, IdPolicy::Opaque).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidCallIdentifier { .. }));
    }

    #[test]
    fn test_whitespace_id_is_rejected_not_replaced() {
        let err = resolve_call_id(None, Some("abc 123"), IdPolicy::Opaque).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidCallIdentifier { .. }));

        let long = "a".repeat(MAX_OPAQUE_ID_LEN + 1);
        assert!(resolve_call_id(Some(&long), None, IdPolicy::Opaque).is_err());
    }
}
