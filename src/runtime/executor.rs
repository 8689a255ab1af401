//! Voice session runtime executor

use super::traits::{MessageTransport, TranscriptionClient};
use super::{SessionEvent, SessionHandle};

use crate::dispatcher::{Dispatched, Dispatcher};
use crate::state_machine::transition::phase_label;
use crate::state_machine::{
    transition, Effect, Event, SessionContext, SessionState, TransitionError,
};
use crate::transcription::TranscriptionRequest;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Runs one user's voice session: applies events serially and executes effects
pub struct SessionRuntime<C, T>
where
    C: TranscriptionClient + ?Sized + 'static,
    T: MessageTransport + 'static,
{
    context: SessionContext,
    state: SessionState,
    transcriber: Arc<C>,
    dispatcher: Dispatcher<T>,
    event_rx: mpsc::Receiver<Event>,
    event_tx: mpsc::Sender<Event>,
    broadcast_tx: broadcast::Sender<SessionEvent>,
    state_tx: watch::Sender<SessionState>,
    /// Token to cancel the outstanding transcription round-trip
    transcription_cancel_token: Option<CancellationToken>,
    shutdown: CancellationToken,
}

impl<C, T> SessionRuntime<C, T>
where
    C: TranscriptionClient + ?Sized + 'static,
    T: MessageTransport + 'static,
{
    /// Create a runtime and the handle used to talk to it
    pub fn new(
        context: SessionContext,
        transcriber: Arc<C>,
        transport: Arc<T>,
        buffer: usize,
    ) -> (Self, SessionHandle) {
        let (event_tx, event_rx) = mpsc::channel(buffer);
        let (broadcast_tx, _) = broadcast::channel(buffer * 2);
        let (state_tx, state_rx) = watch::channel(SessionState::default());
        let shutdown = CancellationToken::new();

        let handle = SessionHandle {
            event_tx: event_tx.clone(),
            broadcast_tx: broadcast_tx.clone(),
            state_rx,
            shutdown: shutdown.clone(),
        };

        let dispatcher = Dispatcher::new(transport, context.username.clone());
        let runtime = Self {
            context,
            state: SessionState::default(),
            transcriber,
            dispatcher,
            event_rx,
            event_tx,
            broadcast_tx,
            state_tx,
            transcription_cancel_token: None,
            shutdown,
        };
        (runtime, handle)
    }

    pub async fn run(mut self) {
        tracing::info!(username = %self.context.username, "Starting voice session runtime");

        // Process events in a loop - no recursion
        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => break,
                Some(event) = self.event_rx.recv() => {
                    if let Err(e) = self.process_event(event).await {
                        tracing::warn!(username = %self.context.username, error = %e, "Event rejected");
                    }
                }
                else => break,
            }
        }

        if let Some(token) = self.transcription_cancel_token.take() {
            token.cancel();
        }
        tracing::info!(username = %self.context.username, "Voice session runtime stopped");
    }

    async fn process_event(&mut self, event: Event) -> Result<(), TransitionError> {
        // Effects may generate follow-up events (delivery outcome)
        let mut events_to_process = vec![event];

        while let Some(current_event) = events_to_process.pop() {
            // Pure state transition
            let result = match transition(&self.state, &self.context, current_event) {
                Ok(r) => r,
                Err(TransitionError::StaleTurn(turn_id)) => {
                    // The session moved on while this round-trip was in flight
                    tracing::debug!(turn_id = %turn_id, "Discarding stale transcription result");
                    continue;
                }
                Err(e) => {
                    // Transition errors are user-facing (e.g., a turn still being processed)
                    let _ = self.broadcast_tx.send(SessionEvent::Error {
                        message: e.to_string(),
                    });
                    return Err(e);
                }
            };

            // Update state
            let changed = result.new_state != self.state;
            self.state = result.new_state;
            if changed {
                tracing::debug!(
                    username = %self.context.username,
                    phase = phase_label(&self.state),
                    leased = self.state.is_leased(),
                    "Session state changed"
                );
                self.state_tx.send_replace(self.state.clone());
                let _ = self.broadcast_tx.send(SessionEvent::StateChange {
                    state: self.state.clone(),
                });
            }

            // Execute effects and collect generated events
            for effect in result.effects {
                if let Some(generated_event) = self.execute_effect(effect).await {
                    events_to_process.push(generated_event);
                }
            }
        }

        Ok(())
    }

    async fn execute_effect(&mut self, effect: Effect) -> Option<Event> {
        match effect {
            Effect::RequestTranscription {
                turn_id,
                audio,
                is_continuing,
                use_name_detection,
                voice,
            } => {
                let cancel_token = CancellationToken::new();
                self.transcription_cancel_token = Some(cancel_token.clone());

                let request = TranscriptionRequest {
                    username: self.context.username.clone(),
                    audio,
                    is_continuing,
                    use_name_detection,
                    voice,
                };
                let transcriber = self.transcriber.clone();
                let event_tx = self.event_tx.clone();
                let username = self.context.username.clone();

                // The round-trip is the only suspension point; run it off the event loop
                tokio::spawn(async move {
                    tracing::info!(username = %username, turn_id = %turn_id, "Transcribing recording");

                    let outcome = tokio::select! {
                        () = cancel_token.cancelled() => {
                            tracing::info!(turn_id = %turn_id, "Transcription cancelled");
                            return;
                        }
                        outcome = transcriber.transcribe(&request) => outcome,
                    };

                    let event = match outcome.and_then(|response| response.into_turn_result()) {
                        Ok(result) => Event::TranscriptionComplete { turn_id, result },
                        Err(e) => {
                            tracing::warn!(turn_id = %turn_id, error = %e, "Transcription failed");
                            Event::TranscriptionFailed {
                                turn_id,
                                message: e.to_string(),
                            }
                        }
                    };
                    let _ = event_tx.send(event).await;
                });
                None
            }

            Effect::CancelTranscription => {
                if let Some(token) = self.transcription_cancel_token.take() {
                    token.cancel();
                }
                None
            }

            Effect::Deliver { receiver, content } => {
                let message = Dispatched {
                    sent_to: receiver,
                    content,
                };
                match self.dispatcher.dispatch(&message).await {
                    Ok(_) => Some(Event::DeliveryComplete {
                        sent_to: message.sent_to,
                        content: message.content,
                    }),
                    Err(e) => {
                        tracing::warn!(receiver = %message.sent_to, error = %e, "Dispatch failed");
                        Some(Event::DeliveryFailed {
                            message: e.to_string(),
                        })
                    }
                }
            }

            Effect::Notify(notification) => {
                let _ = self
                    .broadcast_tx
                    .send(SessionEvent::Notification(notification));
                None
            }
        }
    }
}
