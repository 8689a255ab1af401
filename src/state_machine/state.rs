//! Session and conversation state types

use crate::classifier::UtteranceClassifier;
use crate::recipient::ContactDirectory;
use crate::transcription::VoicePreference;
use serde::{Deserialize, Serialize};

// ============================================================================
// Conversation State
// ============================================================================

/// Cross-turn memory of one composition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ConversationState {
    /// Raw transcripts, oldest first
    pub turns: Vec<String>,
    pub recipient: Option<String>,
    /// Best current draft; may be AI-refined
    pub candidate_message: Option<String>,
    pub ready_to_send: bool,
    /// A final turn named a contact we could not match; blocks confirmation
    /// until a recipient is resolved
    #[serde(default)]
    pub awaiting_recipient: bool,
}

impl ConversationState {
    pub fn new(recipient: Option<String>) -> Self {
        Self {
            recipient,
            ..Self::default()
        }
    }

    pub fn has_candidate(&self) -> bool {
        self.candidate_message.is_some()
    }

    pub fn phase(&self) -> Phase {
        if self.ready_to_send {
            Phase::AwaitingConfirmation
        } else {
            Phase::Composing
        }
    }

    /// What the presentation layer shows while awaiting confirmation
    pub fn preview(&self) -> Preview {
        Preview {
            recipient: self.recipient.clone(),
            message: self.candidate_message.clone().unwrap_or_default(),
        }
    }
}

/// Composition phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Composing,
    AwaitingConfirmation,
}

/// Candidate message with its resolved or unresolved recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preview {
    pub recipient: Option<String>,
    pub message: String,
}

// ============================================================================
// Session State
// ============================================================================

/// Exclusive hold on the session while an external round-trip is outstanding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Lease {
    /// Transcription round-trip in flight for this turn
    Transcribing { turn_id: String },
    /// Outgoing message handed to the transport
    Delivering,
}

/// Everything the machine tracks for one user session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SessionState {
    /// Contact selected in the UI; seeds the recipient of a new conversation
    pub active_contact: Option<String>,
    /// Absent while idle
    pub conversation: Option<ConversationState>,
    pub lease: Option<Lease>,
}

impl SessionState {
    pub fn phase(&self) -> Phase {
        self.conversation
            .as_ref()
            .map_or(Phase::Idle, ConversationState::phase)
    }

    pub fn is_leased(&self) -> bool {
        self.lease.is_some()
    }

    /// True if `turn_id` currently holds the transcription lease
    pub fn holds_turn(&self, turn_id: &str) -> bool {
        matches!(&self.lease, Some(Lease::Transcribing { turn_id: held }) if held == turn_id)
    }

    /// Recipient that would be used if a message were sent now
    pub fn effective_recipient(&self) -> Option<&str> {
        self.conversation
            .as_ref()
            .and_then(|conv| conv.recipient.as_deref())
            .or(self.active_contact.as_deref())
    }
}

// ============================================================================
// Session Context
// ============================================================================

/// Per-session configuration (immutable for the life of the runtime)
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub username: String,
    pub contacts: ContactDirectory,
    pub classifier: UtteranceClassifier,
    pub default_voice: VoicePreference,
}

impl SessionContext {
    pub fn new(username: impl Into<String>, contacts: ContactDirectory) -> Self {
        Self {
            username: username.into(),
            contacts,
            classifier: UtteranceClassifier::default(),
            default_voice: VoicePreference::default(),
        }
    }

    pub fn with_classifier(mut self, classifier: UtteranceClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_default_voice(mut self, voice: VoicePreference) -> Self {
        self.default_voice = voice;
        self
    }
}
