//! Resumed activities — a call restarted from the system call history.

use chrono::Utc;
use serde_json::Value;

use super::string_field;
use crate::calling::ports::CallHandle;
use crate::calling::{display_caller, BridgeError, CallId, CallRecord, CallSource};

/// What the resume subsystem hands over. Both parts are required.
pub struct ResumeActivity {
    pub handle: Option<Box<dyn CallHandle>>,
    pub is_video: Option<bool>,
}

/// Build a call record from a resumed activity.
///
/// A missing handle, a missing video classification or a handle that fails
/// to decode makes the activity unresumable. The record always gets a fresh
/// identifier.
pub fn normalize_resume(activity: &ResumeActivity) -> Result<CallRecord, BridgeError> {
    let handle = activity
        .handle
        .as_ref()
        .ok_or_else(|| BridgeError::UnresumableActivity("no call handle".to_string()))?;
    let is_video = activity
        .is_video
        .ok_or_else(|| BridgeError::UnresumableActivity("no video classification".to_string()))?;

    let mut decoded = handle
        .decrypt()
        .map_err(|e| BridgeError::UnresumableActivity(format!("handle decode failed: {:#}", e)))?;

    let caller_name = string_field(&decoded, "nameCaller");
    let caller_number = string_field(&decoded, "handle");
    decoded.insert("isVideo".to_string(), Value::Bool(is_video));

    Ok(CallRecord {
        id: CallId::generate(),
        caller_name: display_caller(&caller_name, &caller_number),
        caller_number,
        is_video,
        raw_payload: Value::Object(decoded),
        source: CallSource::ResumedActivity,
        received_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    struct FixedHandle(Value);

    impl CallHandle for FixedHandle {
        fn decrypt(&self) -> anyhow::Result<Map<String, Value>> {
            match &self.0 {
                Value::Object(m) => Ok(m.clone()),
                _ => anyhow::bail!("undecodable handle"),
            }
        }
    }

    fn activity(handle: Option<Value>, is_video: Option<bool>) -> ResumeActivity {
        ResumeActivity {
            handle: handle.map(|v| Box::new(FixedHandle(v)) as Box<dyn CallHandle>),
            is_video,
        }
    }

    #[test]
    fn test_resume_builds_record() {
        let a = activity(Some(json!({"nameCaller": "Carol", "handle": "+3312"})), Some(true));
        let record = normalize_resume(&a).unwrap();
        assert_eq!(record.caller_name, "Carol");
        assert_eq!(record.caller_number, "+3312");
        assert!(record.is_video);
        assert_eq!(record.source, CallSource::ResumedActivity);
        assert_eq!(record.raw_payload["isVideo"], json!(true));
    }

    #[test]
    fn test_resume_without_handle_or_video_flag_fails() {
        let no_handle = activity(None, Some(false));
        assert!(matches!(
            normalize_resume(&no_handle),
            Err(BridgeError::UnresumableActivity(_))
        ));

        let no_video = activity(Some(json!({"nameCaller": "Carol"})), None);
        assert!(matches!(
            normalize_resume(&no_video),
            Err(BridgeError::UnresumableActivity(_))
        ));
    }

    #[test]
    fn test_resume_with_undecodable_handle_fails() {
        let a = activity(Some(json!("garbage")), Some(false));
        assert!(matches!(
            normalize_resume(&a),
            Err(BridgeError::UnresumableActivity(_))
        ));
    }

    #[test]
    fn test_resume_empty_handle_shows_unknown() {
        let a = activity(Some(json!({})), Some(false));
        assert_eq!(normalize_resume(&a).unwrap().caller_name, "Unknown");
    }
}
