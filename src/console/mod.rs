//! Console platform adapter
//!
//! Reads one JSON event per stdin line and feeds it into the call core. The
//! collaborator ports are implemented by printing what a native platform
//! would do (show the call UI, route audio, ...).

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::calling::lifecycle::{ArrivalOutcome, CallController, EventOutcome};
use crate::calling::ports::{AudioSession, CallHandle, CallPresenter};
use crate::calling::{CallId, CallRecord, UserAction};
use crate::config::Config;
use crate::push::resume::ResumeActivity;
use crate::push::{Payload, PushType};
use crate::registrar::{HttpRegistrar, RegistrarSink, TokenForwarder};

fn default_push_type() -> String {
    "voip".to_string()
}

/// One line of console input.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum ConsoleEvent {
    Push {
        #[serde(default = "default_push_type")]
        push_type: String,
        payload: Payload,
    },
    Resume {
        handle: Option<Payload>,
        is_video: Option<bool>,
    },
    Accept {
        call_id: String,
    },
    Decline {
        call_id: String,
    },
    End {
        call_id: String,
    },
    Timeout {
        call_id: String,
    },
    Hangup,
    Token {
        hex: String,
    },
    Invalidate,
    AudioActivated,
    AudioDeactivated,
    Status,
}

/// Prints call UI requests instead of drawing them.
struct ConsolePresenter;

impl CallPresenter for ConsolePresenter {
    fn present_incoming_call(&self, record: &CallRecord) {
        println!(
            "[CALL] Incoming {} call from {} ({}) id={} source={:?}",
            if record.is_video { "video" } else { "audio" },
            record.caller_name,
            if record.caller_number.is_empty() { "?" } else { &record.caller_number },
            record.id,
            record.source,
        );
    }

    fn acknowledge(&self, id: &CallId, action: UserAction) {
        println!("[CALL] {} acknowledged for {}", action, id);
    }

    fn dismiss(&self, id: &CallId) {
        println!("[CALL] Dismissed {}", id);
    }
}

/// Prints audio session changes.
struct ConsoleAudio;

impl AudioSession for ConsoleAudio {
    fn set_manual_audio_mode(&self, manual: bool) {
        println!("[AUDIO] manual mode = {}", manual);
    }

    fn activate(&self) {
        println!("[AUDIO] activated");
    }

    fn deactivate(&self) {
        println!("[AUDIO] deactivated");
    }
}

/// Handle whose fields arrive already decoded on the console.
struct PlainHandle(Payload);

impl CallHandle for PlainHandle {
    fn decrypt(&self) -> Result<Payload> {
        Ok(self.0.clone())
    }
}

struct Console {
    controller: CallController,
    tokens: TokenForwarder<RegistrarSink>,
}

impl Console {
    fn new(config: &Config) -> Result<Self> {
        let sink = match config.registrar_url()? {
            Some(url) => RegistrarSink::Http(HttpRegistrar::new(url, config.registrar_auth.clone())),
            None => {
                tracing::info!("No registrar_url configured, push tokens will only be printed");
                RegistrarSink::LogOnly
            }
        };
        let controller = CallController::new(
            Arc::new(ConsolePresenter),
            Arc::new(ConsoleAudio),
            config.controller_settings(),
        )?;
        Ok(Self {
            controller,
            tokens: TokenForwarder::new(sink),
        })
    }

    async fn handle_line(&self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        match serde_json::from_str::<ConsoleEvent>(line) {
            Ok(event) => self.handle_event(event).await,
            Err(e) => tracing::warn!("Skipping unparseable event: {} ({})", line, e),
        }
    }

    async fn handle_event(&self, event: ConsoleEvent) {
        match event {
            ConsoleEvent::Push { push_type, payload } => {
                let outcome = self.controller.on_incoming_push(
                    &PushType::parse(&push_type),
                    &payload,
                    Box::new(|| println!("[PUSH] delivery completed")),
                );
                report_arrival(&outcome);
            }
            ConsoleEvent::Resume { handle, is_video } => {
                let activity = ResumeActivity {
                    handle: handle.map(|h| Box::new(PlainHandle(h)) as Box<dyn CallHandle>),
                    is_video,
                };
                report_arrival(&self.controller.on_resume_activity(&activity));
            }
            ConsoleEvent::Accept { call_id } => self.action(UserAction::Accept, &call_id),
            ConsoleEvent::Decline { call_id } => self.action(UserAction::Decline, &call_id),
            ConsoleEvent::End { call_id } => self.action(UserAction::End, &call_id),
            ConsoleEvent::Timeout { call_id } => self.action(UserAction::Timeout, &call_id),
            ConsoleEvent::Hangup => report_event(self.controller.end_active_call()),
            ConsoleEvent::Token { hex } => match hex::decode(hex.trim()) {
                Ok(raw) => {
                    if let Err(e) = self.tokens.on_token_updated(&raw).await {
                        tracing::warn!("{:#}", e);
                    }
                }
                Err(e) => tracing::warn!("Token is not valid hex: {}", e),
            },
            ConsoleEvent::Invalidate => {
                if let Err(e) = self.tokens.on_token_invalidated().await {
                    tracing::warn!("{:#}", e);
                }
            }
            ConsoleEvent::AudioActivated => self.controller.on_system_audio_activated(),
            ConsoleEvent::AudioDeactivated => self.controller.on_system_audio_deactivated(),
            ConsoleEvent::Status => self.print_status(),
        }
    }

    fn action(&self, action: UserAction, call_id: &str) {
        report_event(self.controller.on_user_action(action, call_id));
    }

    fn print_status(&self) {
        match self.controller.snapshot() {
            Some(s) => println!("[STATUS] call {} {:?} ({:?})", s.id, s.state, s.source),
            None => println!("[STATUS] no call"),
        }
        if let Some(record) = self.controller.live_record() {
            println!(
                "[STATUS] payload: {}",
                serde_json::to_string(&record.raw_payload).unwrap_or_default()
            );
        }
        println!(
            "[STATUS] audio {}, token {:?}",
            if self.controller.audio_active() { "active" } else { "inactive" },
            self.tokens.current_token()
        );
    }
}

fn report_arrival(outcome: &ArrivalOutcome) {
    match outcome {
        ArrivalOutcome::Presented(_) => {}
        ArrivalOutcome::Ignored => println!("[PUSH] ignored"),
        ArrivalOutcome::Duplicate(id) => println!("[PUSH] duplicate of {}", id),
        ArrivalOutcome::Busy { live, rejected } => {
            println!("[PUSH] rejected {}: busy with {}", rejected, live)
        }
        ArrivalOutcome::Dropped(e) => println!("[PUSH] dropped: {}", e),
    }
}

fn report_event(outcome: EventOutcome) {
    if outcome == EventOutcome::Ignored {
        println!("[CALL] event ignored");
    }
}

/// Run the console loop until EOF or Ctrl-C.
pub async fn run(config: Config) -> Result<()> {
    let console = Console::new(&config)?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Listening for events on stdin... (Ctrl-C to stop)");

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line.context("Failed to read stdin")? {
                    Some(line) => console.handle_line(&line).await,
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("Shutting down...");
                break;
            }
        }
    }

    // Leave nothing routed behind us.
    if console.controller.end_active_call() == EventOutcome::Applied(crate::calling::CallState::Ended) {
        tracing::info!("Ended live call on shutdown");
    }
    Ok(())
}
