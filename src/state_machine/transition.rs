//! Pure state transition function
//!
//! Given the same state, context and event this always yields the same new
//! state and effects. No I/O happens here.

use super::effect::{FailureKind, Notification};
use super::event::TurnResult;
use super::state::{ConversationState, Lease, Phase, SessionContext, SessionState};
use super::{Effect, Event};
use crate::dispatcher::{self, DispatchError};
use crate::recipient;
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: SessionState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: SessionState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("A voice turn is still being processed, try again in a moment")]
    Busy,
    #[error("Result for turn {0} arrived after the session moved on")]
    StaleTurn(String),
    #[error("Contact '{0}' not found in your contacts")]
    UnknownContact(String),
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function
pub fn transition(
    state: &SessionState,
    context: &SessionContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match event {
        // ============================================================
        // Recording and transcription round-trip
        // ============================================================
        Event::RecordingSubmitted { .. } if state.is_leased() => Err(TransitionError::Busy),

        Event::RecordingSubmitted {
            turn_id,
            audio,
            voice,
        } => {
            let mut new_state = state.clone();
            new_state.lease = Some(Lease::Transcribing {
                turn_id: turn_id.clone(),
            });

            Ok(TransitionResult::new(new_state)
                .with_effect(Effect::RequestTranscription {
                    turn_id: turn_id.clone(),
                    audio,
                    is_continuing: state.conversation.is_some(),
                    use_name_detection: state.effective_recipient().is_none(),
                    voice: voice.unwrap_or(context.default_voice),
                })
                .with_effect(Effect::notify(Notification::Processing { turn_id })))
        }

        Event::TranscriptionComplete { turn_id, result } => {
            if !state.holds_turn(&turn_id) {
                return Err(TransitionError::StaleTurn(turn_id));
            }
            Ok(apply_turn(state, context, &result))
        }

        Event::TranscriptionFailed { turn_id, message } => {
            if !state.holds_turn(&turn_id) {
                return Err(TransitionError::StaleTurn(turn_id));
            }
            // Abort the turn; the conversation is left exactly as it was
            let mut new_state = state.clone();
            new_state.lease = None;
            Ok(TransitionResult::new(new_state).with_effect(Effect::notify_failure(
                FailureKind::TranscriptionError,
                format!("Error: {message}"),
            )))
        }

        Event::MicrophoneUnavailable { reason } => Ok(TransitionResult::new(state.clone())
            .with_effect(Effect::notify_failure(
                FailureKind::MicrophoneUnavailable,
                format!("Microphone access denied: {reason}"),
            ))),

        // ============================================================
        // Explicit user actions
        // ============================================================
        Event::ContactSelected { .. } | Event::SendRequested if state.is_leased() => {
            Err(TransitionError::Busy)
        }

        Event::ContactSelected { name } => select_contact(state, context, name),

        Event::SendRequested => Ok(request_send(state)),

        Event::Reset => match &state.lease {
            Some(Lease::Delivering) => Err(TransitionError::Busy),
            Some(Lease::Transcribing { .. }) => Ok(TransitionResult::new(SessionState {
                active_contact: state.active_contact.clone(),
                conversation: None,
                lease: None,
            })
            .with_effect(Effect::CancelTranscription)
            .with_effect(Effect::notify(Notification::Abandoned))),
            // Nothing to abandon from Idle
            None if state.conversation.is_none() => Ok(TransitionResult::new(state.clone())),
            None => Ok(TransitionResult::new(SessionState {
                active_contact: state.active_contact.clone(),
                conversation: None,
                lease: None,
            })
            .with_effect(Effect::notify(Notification::Abandoned))),
        },

        // ============================================================
        // Delivery outcome
        // ============================================================
        Event::DeliveryComplete { sent_to, content } if state.lease == Some(Lease::Delivering) => {
            Ok(TransitionResult::new(SessionState {
                active_contact: state.active_contact.clone(),
                conversation: None,
                lease: None,
            })
            .with_effect(Effect::notify(Notification::Dispatched { sent_to, content })))
        }

        Event::DeliveryFailed { message } if state.lease == Some(Lease::Delivering) => {
            let mut new_state = state.clone();
            new_state.lease = None;
            let mut effects = vec![Effect::notify_failure(FailureKind::DeliveryFailed, message)];
            if let Some(conv) = new_state.conversation.as_mut() {
                // Back to explicit confirmation so the user can retry
                conv.ready_to_send = true;
                effects.push(Effect::notify_awaiting_confirmation(conv.preview()));
            }
            Ok(TransitionResult::new(new_state).with_effects(effects))
        }

        event @ (Event::DeliveryComplete { .. } | Event::DeliveryFailed { .. }) => {
            Err(TransitionError::InvalidTransition(format!(
                "No transition from {:?} with event {:?}",
                state.lease, event
            )))
        }
    }
}

/// Apply one completed transcription round-trip
fn apply_turn(state: &SessionState, context: &SessionContext, result: &TurnResult) -> TransitionResult {
    let mut new_state = state.clone();
    new_state.lease = None;

    let mut conv = state
        .conversation
        .clone()
        .unwrap_or_else(|| ConversationState::new(state.active_contact.clone()));
    let had_candidate = conv.has_candidate();
    let mut effects = Vec::new();

    conv.turns.push(result.transcript.clone());

    // Recipient (sticky once resolved)
    let previous_recipient = conv.recipient.clone();
    let resolution =
        recipient::resolve(result.detected_receiver.as_deref(), &conv, &context.contacts);
    conv.recipient = resolution.recipient.clone();
    if let Some(name) = &resolution.unmatched_name {
        effects.push(Effect::notify_failure(
            FailureKind::RecipientUnresolved,
            format!("Contact '{name}' not found in your contacts"),
        ));
    }
    if let (None, Some(recipient)) = (&previous_recipient, &conv.recipient) {
        new_state.active_contact = Some(recipient.clone());
        conv.awaiting_recipient = false;
        effects.push(Effect::notify(Notification::RecipientChanged {
            recipient: recipient.clone(),
        }));
    }
    // An unknown name blocks confirmation on any later turn until resolved
    if resolution.is_unresolved_detection() {
        conv.awaiting_recipient = true;
    }

    // Classified before the draft is touched: a confirmation sends the previewed draft
    let is_confirmation = result.is_final
        && had_candidate
        && context
            .classifier
            .classify(&result.transcript, true)
            .is_confirmation;

    // Candidate message: refined text wins, raw transcript only seeds an empty draft
    if !is_confirmation {
        if let Some(refined) = result.refined_message() {
            conv.candidate_message = Some(refined);
        } else if !had_candidate {
            let transcript = result.transcript.trim();
            if !transcript.is_empty() {
                conv.candidate_message = Some(transcript.to_string());
            }
        }
    }

    if result.is_final {
        let blocked = conv.awaiting_recipient && conv.recipient.is_none();

        // Without content, or while blocked on an unknown name, the turn stays Composing
        if blocked {
            conv.ready_to_send = false;
        } else if conv.has_candidate() {
            conv.ready_to_send = true;
            if is_confirmation {
                match dispatcher::validate(&conv) {
                    Ok(message) => {
                        new_state.lease = Some(Lease::Delivering);
                        effects.push(Effect::Deliver {
                            receiver: message.sent_to,
                            content: message.content,
                        });
                    }
                    Err(e) => {
                        effects.push(Effect::notify_failure(e.failure_kind(), e.to_string()));
                        effects.push(Effect::notify_awaiting_confirmation(conv.preview()));
                    }
                }
            } else {
                effects.push(Effect::notify_awaiting_confirmation(conv.preview()));
            }
        }
    } else {
        // More content is coming; any earlier preview is stale
        conv.ready_to_send = false;
    }

    // Turn notification goes first so clients render the transcript before the outcome
    effects.insert(
        0,
        Effect::notify(Notification::TurnAppended {
            transcript: result.transcript.clone(),
            turn_count: conv.turns.len(),
            phase: conv.phase(),
        }),
    );
    new_state.conversation = Some(conv);
    TransitionResult::new(new_state).with_effects(effects)
}

fn select_contact(
    state: &SessionState,
    context: &SessionContext,
    name: String,
) -> Result<TransitionResult, TransitionError> {
    if !context.contacts.contains(&name) {
        return Err(TransitionError::UnknownContact(name));
    }

    let mut new_state = state.clone();
    new_state.active_contact = Some(name.clone());
    let mut result_effects = vec![Effect::notify(Notification::RecipientChanged {
        recipient: name.clone(),
    })];

    if let Some(conv) = new_state.conversation.as_mut() {
        // Explicit selection overrides voice detection; the draft is untouched
        conv.recipient = Some(name);
        if conv.awaiting_recipient {
            conv.awaiting_recipient = false;
            if conv.has_candidate() {
                conv.ready_to_send = true;
                result_effects.push(Effect::notify_awaiting_confirmation(conv.preview()));
            }
        }
    }

    Ok(TransitionResult::new(new_state).with_effects(result_effects))
}

fn request_send(state: &SessionState) -> TransitionResult {
    let validated = state
        .conversation
        .as_ref()
        .ok_or(DispatchError::MissingContent)
        .and_then(dispatcher::validate);

    match validated {
        Ok(message) => {
            let mut new_state = state.clone();
            new_state.lease = Some(Lease::Delivering);
            TransitionResult::new(new_state).with_effect(Effect::Deliver {
                receiver: message.sent_to,
                content: message.content,
            })
        }
        // Rejected as a no-op; the user supplies the missing piece and retries
        Err(e) => TransitionResult::new(state.clone())
            .with_effect(Effect::notify_failure(e.failure_kind(), e.to_string())),
    }
}

/// Phase a transition landed in, for logging
pub fn phase_label(state: &SessionState) -> &'static str {
    match state.phase() {
        Phase::Idle => "idle",
        Phase::Composing => "composing",
        Phase::AwaitingConfirmation => "awaiting_confirmation",
    }
}
