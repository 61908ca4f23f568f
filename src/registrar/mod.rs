//! Push token lifecycle — keeps the current VoIP push token and relays every
//! change to the registration service.

pub mod http;

use std::sync::RwLock;

use anyhow::{Context, Result};

use crate::calling::ports::TokenSink;

pub use http::HttpRegistrar;

/// Holds the process-wide push token and forwards updates to `S`.
///
/// Forwarding is attempted once; a failure is returned to the caller and the
/// stored token is still replaced.
pub struct TokenForwarder<S> {
    sink: S,
    token: RwLock<String>,
}

impl<S: TokenSink> TokenForwarder<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            token: RwLock::new(String::new()),
        }
    }

    /// The push subsystem issued a new token (raw bytes, stored as lowercase hex).
    pub async fn on_token_updated(&self, raw: &[u8]) -> Result<()> {
        let token = hex::encode(raw);
        tracing::info!("Push token updated ({} bytes)", raw.len());
        self.replace(token.clone());
        self.sink
            .report_push_token(&token)
            .await
            .context("Failed to report push token")
    }

    /// The push subsystem invalidated our token.
    pub async fn on_token_invalidated(&self) -> Result<()> {
        tracing::info!("Push token invalidated");
        self.replace(String::new());
        self.sink
            .report_push_token("")
            .await
            .context("Failed to report push token invalidation")
    }

    pub fn current_token(&self) -> String {
        self.token.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn replace(&self, token: String) {
        *self.token.write().unwrap_or_else(|e| e.into_inner()) = token;
    }
}

/// Registration target chosen from configuration.
pub enum RegistrarSink {
    Http(HttpRegistrar),
    /// No registrar configured; tokens are only logged.
    LogOnly,
}

impl TokenSink for RegistrarSink {
    async fn report_push_token(&self, token: &str) -> Result<()> {
        match self {
            RegistrarSink::Http(registrar) => registrar.register(token).await,
            RegistrarSink::LogOnly => {
                if token.is_empty() {
                    println!("[TOKEN] (cleared)");
                } else {
                    println!("[TOKEN] {}", token);
                }
                Ok(())
            }
        }
    }
}
