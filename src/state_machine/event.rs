//! Events that can occur in a voice session

use crate::transcription::VoicePreference;
use serde::{Deserialize, Serialize};

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // Capture events
    RecordingSubmitted {
        turn_id: String,
        audio: AudioClip,
        voice: Option<VoicePreference>,
    },
    MicrophoneUnavailable {
        reason: String,
    },

    // Transcription round-trip
    TranscriptionComplete {
        turn_id: String,
        result: TurnResult,
    },
    TranscriptionFailed {
        turn_id: String,
        message: String,
    },

    // User events
    ContactSelected {
        name: String,
    },
    SendRequested,
    Reset,

    // Transport events
    DeliveryComplete {
        sent_to: String,
        content: String,
    },
    DeliveryFailed {
        message: String,
    },
}

/// Captured audio for one turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    pub data: Vec<u8>,
    pub mime_type: String,
}

impl AudioClip {
    pub fn new(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            data,
            mime_type: mime_type.into(),
        }
    }

    /// File name sent to the transcription backend
    pub fn file_name(&self) -> &'static str {
        match self.mime_type.as_str() {
            "audio/wav" | "audio/x-wav" | "audio/wave" => "recording.wav",
            "audio/ogg" => "recording.ogg",
            "audio/mpeg" => "recording.mp3",
            _ => "recording.webm",
        }
    }
}

/// Successful result of one transcription round-trip
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TurnResult {
    pub transcript: String,
    pub detected_receiver: Option<String>,
    pub response: Option<String>,
    pub final_message: Option<String>,
    pub is_final: bool,
}

impl TurnResult {
    /// AI-refined message: `final_message`, else `response`, skipping blanks
    pub fn refined_message(&self) -> Option<String> {
        [&self.final_message, &self.response]
            .into_iter()
            .flatten()
            .map(|text| text.trim())
            .find(|text| !text.is_empty())
            .map(String::from)
    }
}
