//! Audio session coordination.
//!
//! Audio is switched to manual mode once, when the coordinator is built.
//! From then on only call lifecycle transitions (and the OS reporting its own
//! activation changes) move the session between active and inactive.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::ports::AudioSession;

pub struct AudioCoordinator {
    session: Arc<dyn AudioSession>,
    active: AtomicBool,
}

impl AudioCoordinator {
    pub fn new(session: Arc<dyn AudioSession>) -> Self {
        session.set_manual_audio_mode(true);
        tracing::debug!("Audio session switched to manual mode");
        Self {
            session,
            active: AtomicBool::new(false),
        }
    }

    /// Activate audio for an answered call. No-op when already active.
    pub fn activate(&self) {
        if self.active.swap(true, Ordering::SeqCst) {
            tracing::debug!("Audio session already active");
            return;
        }
        tracing::info!("Activating audio session");
        self.session.activate();
    }

    /// Release audio. Always forwarded, even if audio was never activated,
    /// so that no terminal path can leave the microphone routed.
    pub fn deactivate(&self) {
        self.active.store(false, Ordering::SeqCst);
        tracing::info!("Deactivating audio session");
        self.session.deactivate();
    }

    /// The OS reported that it activated the audio session.
    pub fn on_system_activated(&self) {
        self.activate();
    }

    /// The OS reported that it deactivated the audio session.
    pub fn on_system_deactivated(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            tracing::info!("System deactivated audio session");
            self.session.deactivate();
        } else {
            tracing::debug!("System deactivation while already inactive");
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records every call made into the audio subsystem.
    #[derive(Default)]
    pub(crate) struct RecordingAudio {
        pub calls: Mutex<Vec<&'static str>>,
    }

    impl RecordingAudio {
        pub fn count(&self, name: &str) -> usize {
            self.calls.lock().unwrap().iter().filter(|c| **c == name).count()
        }
    }

    impl AudioSession for RecordingAudio {
        fn set_manual_audio_mode(&self, manual: bool) {
            assert!(manual);
            self.calls.lock().unwrap().push("manual");
        }
        fn activate(&self) {
            self.calls.lock().unwrap().push("activate");
        }
        fn deactivate(&self) {
            self.calls.lock().unwrap().push("deactivate");
        }
    }

    #[test]
    fn test_manual_mode_set_once_at_construction() {
        let audio = Arc::new(RecordingAudio::default());
        let coordinator = AudioCoordinator::new(audio.clone());
        coordinator.activate();
        coordinator.deactivate();
        assert_eq!(audio.count("manual"), 1);
    }

    #[test]
    fn test_activate_is_idempotent() {
        let audio = Arc::new(RecordingAudio::default());
        let coordinator = AudioCoordinator::new(audio.clone());
        coordinator.activate();
        coordinator.on_system_activated();
        assert_eq!(audio.count("activate"), 1);
        assert!(coordinator.is_active());
    }

    #[test]
    fn test_deactivate_forwarded_even_when_inactive() {
        let audio = Arc::new(RecordingAudio::default());
        let coordinator = AudioCoordinator::new(audio.clone());
        coordinator.deactivate();
        assert_eq!(audio.count("deactivate"), 1);
        assert!(!coordinator.is_active());
    }

    #[test]
    fn test_system_deactivation_only_when_active() {
        let audio = Arc::new(RecordingAudio::default());
        let coordinator = AudioCoordinator::new(audio.clone());
        coordinator.on_system_deactivated();
        assert_eq!(audio.count("deactivate"), 0);

        coordinator.activate();
        coordinator.on_system_deactivated();
        assert_eq!(audio.count("deactivate"), 1);
    }
}
