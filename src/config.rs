//! Server configuration from the environment

use crate::classifier::DEFAULT_SHORT_UTTERANCE_MAX_CHARS;
use crate::transcription::VoicePreference;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_TRANSCRIBE_URL: &str = "http://127.0.0.1:5000/transcribe";
const DEFAULT_TRANSCRIBE_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SESSION_BUFFER: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} has invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    /// Endpoint of the speech backend
    pub transcribe_url: String,
    pub transcribe_timeout: Duration,
    pub short_utterance_max_chars: usize,
    pub default_voice: VoicePreference,
    pub session_buffer: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            transcribe_url: DEFAULT_TRANSCRIBE_URL.to_string(),
            transcribe_timeout: Duration::from_secs(DEFAULT_TRANSCRIBE_TIMEOUT_SECS),
            short_utterance_max_chars: DEFAULT_SHORT_UTTERANCE_MAX_CHARS,
            default_voice: VoicePreference::default(),
            session_buffer: DEFAULT_SESSION_BUFFER,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable lookup; unset variables take defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let session_buffer = parse_or(&lookup, "COURIER_SESSION_BUFFER", defaults.session_buffer)?;
        if session_buffer == 0 {
            return Err(ConfigError::Invalid {
                var: "COURIER_SESSION_BUFFER",
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(Self {
            port: parse_or(&lookup, "COURIER_PORT", defaults.port)?,
            transcribe_url: lookup("COURIER_TRANSCRIBE_URL")
                .filter(|url| !url.trim().is_empty())
                .unwrap_or(defaults.transcribe_url),
            transcribe_timeout: Duration::from_secs(parse_or(
                &lookup,
                "COURIER_TRANSCRIBE_TIMEOUT_SECS",
                DEFAULT_TRANSCRIBE_TIMEOUT_SECS,
            )?),
            short_utterance_max_chars: parse_or(
                &lookup,
                "COURIER_SHORT_UTTERANCE_CHARS",
                defaults.short_utterance_max_chars,
            )?,
            default_voice: parse_or(&lookup, "COURIER_DEFAULT_VOICE", defaults.default_voice)?,
            session_buffer,
        })
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
            value,
        }),
    }
}
