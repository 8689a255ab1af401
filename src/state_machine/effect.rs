//! Effects produced by state transitions

use super::event::AudioClip;
use super::state::{Phase, Preview};
use crate::transcription::VoicePreference;
use serde::{Deserialize, Serialize};

/// Effects to be executed after state transition
#[derive(Debug, Clone)]
pub enum Effect {
    /// Start the transcription round-trip (spawns as background task)
    RequestTranscription {
        turn_id: String,
        audio: AudioClip,
        is_continuing: bool,
        use_name_detection: bool,
        voice: VoicePreference,
    },

    /// Abandon the outstanding round-trip
    CancelTranscription,

    /// Hand the approved message to the transport
    Deliver { receiver: String, content: String },

    /// Notify the presentation layer
    Notify(Notification),
}

/// State-change notifications rendered by the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// A recording is being transcribed
    Processing { turn_id: String },
    TurnAppended {
        transcript: String,
        turn_count: usize,
        phase: Phase,
    },
    RecipientChanged { recipient: String },
    AwaitingConfirmation { preview: Preview },
    Dispatched { sent_to: String, content: String },
    Failed { kind: FailureKind, message: String },
    /// Composition discarded without sending
    Abandoned,
}

/// Recoverable failures surfaced to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    TranscriptionError,
    RecipientUnresolved,
    DispatchMissingRecipient,
    DispatchMissingContent,
    DeliveryFailed,
    MicrophoneUnavailable,
}

impl Effect {
    pub fn notify(notification: Notification) -> Self {
        Effect::Notify(notification)
    }

    pub fn notify_failure(kind: FailureKind, message: impl Into<String>) -> Self {
        Effect::Notify(Notification::Failed {
            kind,
            message: message.into(),
        })
    }

    pub fn notify_awaiting_confirmation(preview: Preview) -> Self {
        Effect::Notify(Notification::AwaitingConfirmation { preview })
    }
}
