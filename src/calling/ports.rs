//! Collaborator interfaces the call core depends on.
//!
//! Platform adapters implement these at the boundary. Implementations are
//! invoked while the controller holds its state lock, so they must not call
//! back into the controller synchronously.

use std::future::Future;

use anyhow::Result;

use super::{CallId, CallRecord, UserAction};

/// Native incoming-call UI.
pub trait CallPresenter: Send + Sync {
    /// Show the incoming-call interface for this record.
    fn present_incoming_call(&self, record: &CallRecord);

    /// Let the UI complete its own pending action for `action`.
    fn acknowledge(&self, id: &CallId, action: UserAction);

    /// Take down the UI for a call ended from the application side.
    fn dismiss(&self, id: &CallId);
}

/// Device audio session. All calls are expected to be idempotent.
pub trait AudioSession: Send + Sync {
    fn set_manual_audio_mode(&self, manual: bool);
    fn activate(&self);
    fn deactivate(&self);
}

/// Remote registration of the push token.
pub trait TokenSink: Send + Sync {
    fn report_push_token(&self, token: &str) -> impl Future<Output = Result<()>> + Send;
}

/// Opaque call handle supplied by a resumed activity.
pub trait CallHandle: Send + Sync {
    /// Decode the handle into a `{nameCaller, handle}` mapping.
    fn decrypt(&self) -> Result<serde_json::Map<String, serde_json::Value>>;
}
