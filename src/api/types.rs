//! API request and response types

use crate::state_machine::state::Preview;
use crate::state_machine::{Phase, SessionState};
use crate::transcription::VoicePreference;
use serde::{Deserialize, Serialize};

/// Request to join or leave the chat
#[derive(Debug, Deserialize)]
pub struct UserRequest {
    pub username: String,
}

/// Response with the current contact list
#[derive(Debug, Serialize)]
pub struct ContactsResponse {
    pub contacts: Vec<String>,
}

/// Request to send a typed chat message
#[derive(Debug, Deserialize)]
pub struct ChatMessageRequest {
    pub sender: String,
    pub receiver: String,
    pub content: String,
}

/// Request carrying one recorded voice turn
#[derive(Debug, Deserialize)]
pub struct RecordingRequest {
    /// Base64-encoded audio bytes
    pub audio: String,
    #[serde(default = "default_mime_type")]
    pub mime_type: String,
    #[serde(default)]
    pub voice: Option<VoicePreference>,
}

fn default_mime_type() -> String {
    "audio/webm".to_string()
}

/// Request to select a contact in the UI
#[derive(Debug, Deserialize)]
pub struct SelectContactRequest {
    pub name: String,
}

/// Report that the microphone could not be opened
#[derive(Debug, Deserialize)]
pub struct MicrophoneRequest {
    pub reason: String,
}

/// Response for a recording accepted for transcription
#[derive(Debug, Serialize)]
pub struct RecordingResponse {
    pub turn_id: String,
    pub queued: bool,
}

/// Response for a queued user action
#[derive(Debug, Serialize)]
pub struct QueuedResponse {
    pub queued: bool,
}

/// Snapshot of a voice session
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub phase: Phase,
    pub busy: bool,
    pub state: SessionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<Preview>,
}

impl From<SessionState> for SessionResponse {
    fn from(state: SessionState) -> Self {
        let preview = state
            .conversation
            .as_ref()
            .filter(|conv| conv.ready_to_send)
            .map(crate::state_machine::ConversationState::preview);
        Self {
            phase: state.phase(),
            busy: state.is_leased(),
            state,
            preview,
        }
    }
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
