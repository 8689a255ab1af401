//! Runtime for executing voice sessions
//!
//! One `SessionRuntime` task per joined user; the manager owns the handles
//! and routes API events to them.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::SessionRuntime;
pub use traits::*;

use crate::classifier::UtteranceClassifier;
use crate::state_machine::{Event, Notification, SessionContext, SessionState};
use crate::transcription::VoicePreference;
use crate::transport::{ChatHub, OutgoingMessage};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch, RwLock};
use tokio_util::sync::CancellationToken;

/// Type alias for production runtime with concrete implementations
pub type ProductionRuntime = SessionRuntime<dyn TranscriptionClient, ChatHub>;

/// Handle to interact with a running session
#[derive(Clone)]
pub struct SessionHandle {
    pub event_tx: mpsc::Sender<Event>,
    pub broadcast_tx: broadcast::Sender<SessionEvent>,
    pub state_rx: watch::Receiver<SessionState>,
    pub shutdown: CancellationToken,
}

/// Events sent to SSE clients
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Init {
        state: SessionState,
        contacts: Vec<String>,
    },
    Notification(Notification),
    StateChange {
        state: SessionState,
    },
    /// Chat message routed to this user's inbox
    Incoming {
        message: OutgoingMessage,
    },
    Error {
        message: String,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("Unknown user: {0}")]
    UnknownUser(String),
    #[error("Session for {0} is no longer running")]
    SessionClosed(String),
}

/// Settings applied to every new session
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub classifier: UtteranceClassifier,
    pub default_voice: VoicePreference,
    /// Channel capacity for events into and out of a session
    pub buffer: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            classifier: UtteranceClassifier::default(),
            default_voice: VoicePreference::default(),
            buffer: 64,
        }
    }
}

/// Manager for all voice session runtimes
pub struct RuntimeManager {
    transcriber: Arc<dyn TranscriptionClient>,
    hub: Arc<ChatHub>,
    settings: SessionSettings,
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl RuntimeManager {
    pub fn new(
        transcriber: Arc<dyn TranscriptionClient>,
        hub: Arc<ChatHub>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            transcriber,
            hub,
            settings,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn hub(&self) -> &Arc<ChatHub> {
        &self.hub
    }

    /// Get or create the runtime for a joined user
    pub async fn get_or_create(&self, username: &str) -> Result<SessionHandle, RuntimeError> {
        // Check if already running
        {
            let sessions = self.sessions.read().await;
            if let Some(handle) = sessions.get(username) {
                return Ok(handle.clone());
            }
        }

        if !self.hub.contacts().contains(username) {
            return Err(RuntimeError::UnknownUser(username.to_string()));
        }

        let mut sessions = self.sessions.write().await;
        // Another request may have won the race
        if let Some(handle) = sessions.get(username) {
            return Ok(handle.clone());
        }

        let context = SessionContext::new(username, self.hub.contacts().clone())
            .with_classifier(self.settings.classifier)
            .with_default_voice(self.settings.default_voice);

        let (runtime, handle): (ProductionRuntime, SessionHandle) = SessionRuntime::new(
            context,
            self.transcriber.clone(),
            self.hub.clone(),
            self.settings.buffer,
        );

        tokio::spawn(async move {
            runtime.run().await;
        });

        tracing::info!(username = %username, "Created voice session runtime");
        sessions.insert(username.to_string(), handle.clone());
        Ok(handle)
    }

    /// Send an event to a user's session
    pub async fn send_event(&self, username: &str, event: Event) -> Result<(), RuntimeError> {
        let handle = self.get_or_create(username).await?;
        handle
            .event_tx
            .send(event)
            .await
            .map_err(|_| RuntimeError::SessionClosed(username.to_string()))
    }

    /// Subscribe to session updates
    pub async fn subscribe(
        &self,
        username: &str,
    ) -> Result<broadcast::Receiver<SessionEvent>, RuntimeError> {
        let handle = self.get_or_create(username).await?;
        Ok(handle.broadcast_tx.subscribe())
    }

    /// Current state of a user's session
    pub async fn snapshot(&self, username: &str) -> Result<SessionState, RuntimeError> {
        let handle = self.get_or_create(username).await?;
        let state = handle.state_rx.borrow().clone();
        Ok(state)
    }

    /// Stop a user's session; any draft is discarded
    pub async fn end_session(&self, username: &str) {
        if let Some(handle) = self.sessions.write().await.remove(username) {
            handle.shutdown.cancel();
            tracing::info!(username = %username, "Ended voice session runtime");
        }
    }
}
