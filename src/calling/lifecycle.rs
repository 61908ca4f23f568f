//! Call lifecycle controller.
//!
//! Owns the single tracked call and serializes every entry point (push
//! arrival, resumed activity, UI actions, timeouts, app-side hang-up) through
//! one lock. Collaborators are invoked while the lock is held so that a
//! transition and its side effects are never interleaved with another one.
//!
//! ```text
//! Pending -> Ringing -> Answered -> Ended
//!                    -> Declined | Ended | TimedOut
//! ```

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;

use super::audio::AudioCoordinator;
use super::identity::IdPolicy;
use super::ports::{AudioSession, CallPresenter};
use super::{BridgeError, CallId, CallRecord, CallSource, CallState, UserAction};
use crate::push::resume::{normalize_resume, ResumeActivity};
use crate::push::{normalize_push, Payload, PushType};

/// Callback telling the push subsystem we are done with a delivery.
pub type PushCompletion = Box<dyn FnOnce() + Send + 'static>;

/// What to do with a distinct call arriving while another one is live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusyPolicy {
    /// Drop the newcomer; the live call is untouched.
    #[default]
    Reject,
    /// End the live call and present the newcomer.
    Replace,
}

#[derive(Debug, Clone)]
pub struct ControllerSettings {
    /// Delay between requesting the call UI and completing the push delivery.
    pub completion_delay: Duration,
    pub busy_policy: BusyPolicy,
    pub id_policy: IdPolicy,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            completion_delay: Duration::from_secs(1),
            busy_policy: BusyPolicy::default(),
            id_policy: IdPolicy::default(),
        }
    }
}

/// Result of handing a push or resumed activity to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArrivalOutcome {
    /// The call UI was requested for this call.
    Presented(CallId),
    /// Not a call push (wrong push type or no metadata).
    Ignored,
    /// Same call is already live or was the last one to finish; nothing re-presented.
    Duplicate(CallId),
    /// Another call is live and the busy policy rejected this one.
    Busy { live: CallId, rejected: CallId },
    /// Normalization failed.
    Dropped(BridgeError),
}

/// Result of a UI action or hang-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Applied(CallState),
    /// Event did not refer to the live call.
    Ignored,
}

/// Read-only view of the tracked call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallSnapshot {
    pub id: CallId,
    pub state: CallState,
    pub source: CallSource,
}

struct TrackedCall {
    id: CallId,
    source: CallSource,
    state: CallState,
    /// Released once the call is over.
    record: Option<CallRecord>,
}

impl TrackedCall {
    fn finish(&mut self, state: CallState) {
        debug_assert!(state.is_terminal() && !state.is_live());
        self.state = state;
        self.record = None;
    }
}

pub struct CallController {
    presenter: Arc<dyn CallPresenter>,
    audio: AudioCoordinator,
    settings: ControllerSettings,
    runtime: Handle,
    tracked: Mutex<Option<TrackedCall>>,
}

impl CallController {
    /// Build the controller. Must be called from within a tokio runtime; the
    /// runtime is kept to schedule deferred push completions from any thread.
    pub fn new(
        presenter: Arc<dyn CallPresenter>,
        audio: Arc<dyn AudioSession>,
        settings: ControllerSettings,
    ) -> Result<Self> {
        let runtime =
            Handle::try_current().context("Call controller must be created inside a tokio runtime")?;
        Ok(Self {
            presenter,
            audio: AudioCoordinator::new(audio),
            settings,
            runtime,
            tracked: Mutex::new(None),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Option<TrackedCall>> {
        // A panicking collaborator must not wedge call handling.
        self.tracked.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Entry point for the push delivery subsystem.
    ///
    /// `completion` is always invoked exactly once: after the configured delay
    /// when a call UI was requested, immediately otherwise.
    pub fn on_incoming_push(
        &self,
        push_type: &PushType,
        payload: &Payload,
        completion: PushCompletion,
    ) -> ArrivalOutcome {
        tracing::debug!("Incoming push ({:?}): {}", push_type, serde_json::Value::Object(payload.clone()));

        if *push_type != PushType::Voip {
            tracing::debug!("Ignoring non-VoIP push {:?}", push_type);
            completion();
            return ArrivalOutcome::Ignored;
        }

        let record = match normalize_push(payload, self.settings.id_policy) {
            Ok(Some(record)) => record,
            Ok(None) => {
                tracing::debug!("Push has no metadata, ignoring");
                completion();
                return ArrivalOutcome::Ignored;
            }
            Err(e) => {
                tracing::warn!("Dropping push: {}", e);
                completion();
                return ArrivalOutcome::Dropped(e);
            }
        };

        let outcome = self.begin(record);
        if matches!(outcome, ArrivalOutcome::Presented(_)) {
            let delay = self.settings.completion_delay;
            self.runtime.spawn(async move {
                tokio::time::sleep(delay).await;
                tracing::debug!("Completing push delivery");
                completion();
            });
        } else {
            completion();
        }
        outcome
    }

    /// Entry point for a call restarted from the call history.
    pub fn on_resume_activity(&self, activity: &ResumeActivity) -> ArrivalOutcome {
        match normalize_resume(activity) {
            Ok(record) => self.begin(record),
            Err(e) => {
                tracing::warn!("Refusing to resume call: {}", e);
                ArrivalOutcome::Dropped(e)
            }
        }
    }

    /// Track a new record and request its UI (Pending -> Ringing).
    fn begin(&self, record: CallRecord) -> ArrivalOutcome {
        let mut guard = self.lock();

        if let Some(done) = guard.as_ref().filter(|t| !t.state.is_live()) {
            if done.id.matches(record.id.as_str()) {
                tracing::info!("Call {} already finished as {:?}, ignoring redelivery", done.id, done.state);
                return ArrivalOutcome::Duplicate(done.id.clone());
            }
        }

        if let Some(live) = guard.as_mut().filter(|t| t.state.is_live()) {
            if live.id.matches(record.id.as_str()) {
                tracing::info!("Call {} is already {:?}, not presenting again", live.id, live.state);
                return ArrivalOutcome::Duplicate(live.id.clone());
            }
            match self.settings.busy_policy {
                BusyPolicy::Reject => {
                    tracing::warn!(
                        "Rejecting call {} from {}: call {} is {:?}",
                        record.id,
                        record.caller_name,
                        live.id,
                        live.state
                    );
                    return ArrivalOutcome::Busy {
                        live: live.id.clone(),
                        rejected: record.id,
                    };
                }
                BusyPolicy::Replace => {
                    tracing::info!("Replacing call {} with {}", live.id, record.id);
                    self.presenter.dismiss(&live.id);
                    self.audio.deactivate();
                    live.finish(CallState::Ended);
                }
            }
        }

        let mut call = TrackedCall {
            id: record.id.clone(),
            source: record.source,
            state: CallState::Pending,
            record: None,
        };

        tracing::info!(
            "Presenting {} call {} from {} ({:?})",
            if record.is_video { "video" } else { "audio" },
            record.id,
            record.caller_name,
            record.source
        );
        self.presenter.present_incoming_call(&record);
        call.state = CallState::Ringing;
        call.record = Some(record);

        let id = call.id.clone();
        *guard = Some(call);
        ArrivalOutcome::Presented(id)
    }

    /// Entry point for actions reported by the call UI.
    pub fn on_user_action(&self, action: UserAction, call_id: &str) -> EventOutcome {
        let mut guard = self.lock();

        let Some(call) = guard.as_mut().filter(|t| t.state.is_live() && t.id.matches(call_id)) else {
            tracing::debug!("Ignoring stale {} for call {}", action, call_id);
            return EventOutcome::Ignored;
        };

        let next = match (call.state, action) {
            (CallState::Ringing, UserAction::Accept) => CallState::Answered,
            (CallState::Ringing, UserAction::Decline) => CallState::Declined,
            (CallState::Ringing, UserAction::End) => CallState::Ended,
            (CallState::Ringing, UserAction::Timeout) => CallState::TimedOut,
            (CallState::Answered, UserAction::Decline | UserAction::End) => CallState::Ended,
            (state, action) => {
                tracing::debug!("Ignoring {} for call {} in state {:?}", action, call.id, state);
                return EventOutcome::Ignored;
            }
        };

        if action != UserAction::Timeout {
            self.presenter.acknowledge(&call.id, action);
        }

        if next == CallState::Answered {
            call.state = next;
            self.audio.activate();
        } else {
            call.finish(next);
            self.audio.deactivate();
        }

        tracing::info!("Call {} -> {:?} ({})", call.id, next, action);
        EventOutcome::Applied(next)
    }

    /// Hang up the live call from the application side.
    pub fn end_active_call(&self) -> EventOutcome {
        let mut guard = self.lock();

        let Some(call) = guard.as_mut().filter(|t| t.state.is_live()) else {
            tracing::debug!("No live call to end");
            return EventOutcome::Ignored;
        };

        self.presenter.dismiss(&call.id);
        call.finish(CallState::Ended);
        self.audio.deactivate();
        tracing::info!("Call {} -> Ended (hang-up)", call.id);
        EventOutcome::Applied(CallState::Ended)
    }

    /// The OS activated the audio session on its own.
    ///
    /// Only mirrored while a call is live; a late activation for a finished
    /// call must not leave audio routed.
    pub fn on_system_audio_activated(&self) {
        let guard = self.lock();
        match guard.as_ref().filter(|t| t.state.is_live()) {
            Some(_) => self.audio.on_system_activated(),
            None => tracing::debug!("Ignoring system audio activation without a live call"),
        }
    }

    /// The OS deactivated the audio session on its own.
    pub fn on_system_audio_deactivated(&self) {
        let _guard = self.lock();
        self.audio.on_system_deactivated();
    }

    pub fn snapshot(&self) -> Option<CallSnapshot> {
        self.lock().as_ref().map(|t| CallSnapshot {
            id: t.id.clone(),
            state: t.state,
            source: t.source,
        })
    }

    /// Full record of the live call, if any.
    pub fn live_record(&self) -> Option<CallRecord> {
        self.lock().as_ref().and_then(|t| t.record.clone())
    }

    pub fn audio_active(&self) -> bool {
        self.audio.is_active()
    }
}
