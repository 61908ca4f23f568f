//! Push payload normalization
//!
//! Turns an untyped VoIP push dictionary into a [`CallRecord`]. The resume
//! path (calls restarted from call history) lives in [`resume`].
//!
//! Informal payload shape:
//!
//! ```text
//! { "call_id"?: string, "isVideo"?: bool,
//!   "metadata"?: { "call_id"?: string, "caller_name"?: string,
//!                  "caller_number"?: string, "isVideo"?: bool } }
//! ```

pub mod resume;

use chrono::Utc;
use serde_json::{Map, Value};

use crate::calling::identity::{resolve_call_id, IdPolicy};
use crate::calling::{display_caller, BridgeError, CallRecord, CallSource};

/// Untyped push dictionary as delivered by the push subsystem.
pub type Payload = Map<String, Value>;

/// Kind of push the delivery subsystem handed us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushType {
    Voip,
    Other(String),
}

impl PushType {
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("voip") {
            PushType::Voip
        } else {
            PushType::Other(s.to_string())
        }
    }
}

/// Read a string field, defaulting to empty when missing or not a string.
pub(crate) fn string_field(map: &Payload, key: &str) -> String {
    map.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Normalize a VoIP push.
///
/// Returns `Ok(None)` when the push has no `metadata` mapping: such pushes are
/// ignored rather than treated as failures. A `metadata` value that is present
/// but not a mapping is [`BridgeError::MalformedPayload`].
pub fn normalize_push(payload: &Payload, policy: IdPolicy) -> Result<Option<CallRecord>, BridgeError> {
    let metadata = match payload.get("metadata") {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Object(m)) => m,
        Some(other) => {
            return Err(BridgeError::MalformedPayload(format!(
                "metadata is {}, expected a mapping",
                json_kind(other)
            )))
        }
    };

    let caller_name = string_field(metadata, "caller_name");
    let caller_number = string_field(metadata, "caller_number");

    let is_video = payload
        .get("isVideo")
        .and_then(Value::as_bool)
        .or_else(|| metadata.get("isVideo").and_then(Value::as_bool))
        .unwrap_or(false);

    let id = resolve_call_id(
        metadata.get("call_id").and_then(Value::as_str),
        payload.get("call_id").and_then(Value::as_str),
        policy,
    )?;

    tracing::debug!(
        "Normalized push: call_id={}, caller_name={:?}, caller_number={:?}, video={}",
        id,
        caller_name,
        caller_number,
        is_video
    );

    Ok(Some(CallRecord {
        id,
        caller_name: display_caller(&caller_name, &caller_number),
        caller_number,
        is_video,
        raw_payload: Value::Object(payload.clone()),
        source: CallSource::PushKit,
        received_at: Utc::now(),
    }))
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "a mapping",
    }
}
