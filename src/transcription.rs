//! Transcription round-trip
//!
//! Wire types for the speech backend that transcribes a recording, detects
//! the addressed contact and drafts the message, plus the HTTP client that
//! talks to it.

mod http;

pub use http::HttpTranscriptionClient;

use crate::state_machine::event::{AudioClip, TurnResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Voice used by the backend when it speaks the reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoicePreference {
    #[default]
    Female,
    Male,
}

impl VoicePreference {
    pub fn as_str(self) -> &'static str {
        match self {
            VoicePreference::Female => "FEMALE",
            VoicePreference::Male => "MALE",
        }
    }
}

impl fmt::Display for VoicePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VoicePreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FEMALE" => Ok(VoicePreference::Female),
            "MALE" => Ok(VoicePreference::Male),
            other => Err(format!("unknown voice preference: {other}")),
        }
    }
}

/// One recording sent for transcription
#[derive(Debug, Clone)]
pub struct TranscriptionRequest {
    pub username: String,
    pub audio: AudioClip,
    /// The recording continues an existing composition
    pub is_continuing: bool,
    /// Ask the backend to detect the addressed contact
    pub use_name_detection: bool,
    pub voice: VoicePreference,
}

/// Backend response, as returned on the wire
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptionResponse {
    #[serde(default, alias = "transcription")]
    pub transcript: String,
    #[serde(default)]
    pub detected_receiver: Option<String>,
    #[serde(default, alias = "llm_response")]
    pub response: Option<String>,
    #[serde(default)]
    pub final_message: Option<String>,
    #[serde(default)]
    pub is_final: bool,
    #[serde(default)]
    pub error: Option<String>,
}

impl TranscriptionResponse {
    /// A backend-reported `error` is a hard failure for the turn
    pub fn into_turn_result(self) -> Result<TurnResult, TranscriptionError> {
        if let Some(error) = self.error.filter(|e| !e.trim().is_empty()) {
            return Err(TranscriptionError::Backend(error));
        }
        Ok(TurnResult {
            transcript: self.transcript,
            detected_receiver: self.detected_receiver,
            response: self.response,
            final_message: self.final_message,
            is_final: self.is_final,
        })
    }
}

#[derive(Debug, Error)]
pub enum TranscriptionError {
    #[error("{0}")]
    Backend(String),
    #[error("Server error: {status}")]
    Status { status: u16, body: String },
    #[error("Transcription request failed: {0}")]
    Network(String),
    #[error("Invalid transcription response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for TranscriptionError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            TranscriptionError::Decode(e.to_string())
        } else {
            TranscriptionError::Network(e.to_string())
        }
    }
}
