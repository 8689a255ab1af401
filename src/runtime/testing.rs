//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O.

use super::traits::*;
use super::{SessionEvent, SessionHandle, SessionRuntime};
use crate::recipient::ContactDirectory;
use crate::state_machine::{
    AudioClip, Event, Notification, Phase, SessionContext, SessionState,
};
use crate::transcription::{TranscriptionError, TranscriptionRequest, TranscriptionResponse};
use crate::transport::{OutgoingMessage, TransportError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, Notify};

// ============================================================================
// Mock Transcription Client
// ============================================================================

/// Mock transcription client that returns queued responses
pub struct MockTranscriptionClient {
    responses: Mutex<VecDeque<Result<TranscriptionResponse, TranscriptionError>>>,
    /// Record of all requests made
    pub requests: Mutex<Vec<TranscriptionRequest>>,
}

impl MockTranscriptionClient {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful response
    pub fn queue_response(&self, response: TranscriptionResponse) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    /// Queue an error response
    pub fn queue_error(&self, error: TranscriptionError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<TranscriptionRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next_response(&self) -> Result<TranscriptionResponse, TranscriptionError> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TranscriptionError::Network("No mock response queued".into())))
    }
}

impl Default for MockTranscriptionClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TranscriptionClient for MockTranscriptionClient {
    async fn transcribe(
        &self,
        request: &TranscriptionRequest,
    ) -> Result<TranscriptionResponse, TranscriptionError> {
        self.requests.lock().unwrap().push(request.clone());
        self.next_response()
    }
}

// ============================================================================
// Delayed Mock Transcription Client (for cancellation testing)
// ============================================================================

/// Mock transcription client with configurable delay
pub struct DelayedMockTranscriptionClient {
    inner: MockTranscriptionClient,
    delay: Duration,
    /// Notified when request starts (for test synchronization)
    pub request_started: Arc<Notify>,
}

impl DelayedMockTranscriptionClient {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: MockTranscriptionClient::new(),
            delay,
            request_started: Arc::new(Notify::new()),
        }
    }

    pub fn queue_response(&self, response: TranscriptionResponse) {
        self.inner.queue_response(response);
    }
}

#[async_trait]
impl TranscriptionClient for DelayedMockTranscriptionClient {
    async fn transcribe(
        &self,
        request: &TranscriptionRequest,
    ) -> Result<TranscriptionResponse, TranscriptionError> {
        self.inner.requests.lock().unwrap().push(request.clone());
        self.request_started.notify_one();
        tokio::time::sleep(self.delay).await;
        self.inner.next_response()
    }
}

// ============================================================================
// Recording Transport
// ============================================================================

/// Transport that records every delivery attempt
pub struct RecordingTransport {
    delivered: Mutex<Vec<OutgoingMessage>>,
    attempts: Mutex<usize>,
    failure: Option<String>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self {
            delivered: Mutex::new(Vec::new()),
            attempts: Mutex::new(0),
            failure: None,
        }
    }

    /// Transport whose every delivery fails with `reason`
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            failure: Some(reason.into()),
            ..Self::new()
        }
    }

    pub fn delivered(&self) -> Vec<OutgoingMessage> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageTransport for RecordingTransport {
    async fn deliver(&self, message: &OutgoingMessage) -> Result<(), TransportError> {
        *self.attempts.lock().unwrap() += 1;
        if let Some(reason) = &self.failure {
            return Err(TransportError::UnknownReceiver(reason.clone()));
        }
        self.delivered.lock().unwrap().push(message.clone());
        Ok(())
    }
}

// ============================================================================
// Test Runtime
// ============================================================================

/// Helper for building test runtimes with minimal boilerplate
pub struct TestRuntime<C: TranscriptionClient + 'static> {
    pub handle: SessionHandle,
    pub broadcast_rx: broadcast::Receiver<SessionEvent>,
    pub transcriber: Arc<C>,
    pub transport: Arc<RecordingTransport>,
    _runtime_handle: tokio::task::JoinHandle<()>,
}

impl TestRuntime<MockTranscriptionClient> {
    /// Create a simple test runtime with instant mocks
    pub fn new() -> TestRuntimeBuilder<MockTranscriptionClient> {
        TestRuntimeBuilder::new()
    }
}

pub struct TestRuntimeBuilder<C> {
    username: String,
    contacts: Vec<String>,
    transcriber: Option<C>,
    transport: Option<RecordingTransport>,
}

impl TestRuntimeBuilder<MockTranscriptionClient> {
    pub fn new() -> Self {
        Self {
            username: "me".to_string(),
            contacts: vec!["Alice".to_string(), "Bob".to_string()],
            transcriber: None,
            transport: None,
        }
    }
}

impl Default for TestRuntimeBuilder<MockTranscriptionClient> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: TranscriptionClient + 'static> TestRuntimeBuilder<C> {
    pub fn transcriber<D: TranscriptionClient + 'static>(self, transcriber: D) -> TestRuntimeBuilder<D> {
        TestRuntimeBuilder {
            username: self.username,
            contacts: self.contacts,
            transcriber: Some(transcriber),
            transport: self.transport,
        }
    }

    pub fn transport(mut self, transport: RecordingTransport) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build_with(self, default: impl FnOnce() -> C) -> TestRuntime<C> {
        let transcriber = Arc::new(self.transcriber.unwrap_or_else(default));
        let transport = Arc::new(self.transport.unwrap_or_default());
        let contacts: ContactDirectory = self.contacts.into_iter().collect();
        let context = SessionContext::new(self.username, contacts);

        let (runtime, handle) =
            SessionRuntime::new(context, transcriber.clone(), transport.clone(), 32);
        let broadcast_rx = handle.broadcast_tx.subscribe();

        let runtime_handle = tokio::spawn(async move {
            runtime.run().await;
        });

        TestRuntime {
            handle,
            broadcast_rx,
            transcriber,
            transport,
            _runtime_handle: runtime_handle,
        }
    }
}

impl TestRuntimeBuilder<MockTranscriptionClient> {
    pub fn build(self) -> TestRuntime<MockTranscriptionClient> {
        self.build_with(MockTranscriptionClient::new)
    }
}

impl<C: TranscriptionClient + 'static> TestRuntime<C> {
    async fn send(&self, event: Event) {
        self.handle
            .event_tx
            .send(event)
            .await
            .expect("Failed to send event");
    }

    /// Submit a recording; returns the turn id
    pub async fn submit_recording(&self) -> String {
        let turn_id = uuid::Uuid::new_v4().to_string();
        self.send(Event::RecordingSubmitted {
            turn_id: turn_id.clone(),
            audio: AudioClip::new(vec![0, 1, 2, 3], "audio/webm"),
            voice: None,
        })
        .await;
        turn_id
    }

    pub async fn select_contact(&self, name: &str) {
        self.send(Event::ContactSelected {
            name: name.to_string(),
        })
        .await;
    }

    pub async fn request_send(&self) {
        self.send(Event::SendRequested).await;
    }

    pub async fn reset(&self) {
        self.send(Event::Reset).await;
    }

    /// Wait for a notification matching `pred`
    pub async fn wait_for_notification(
        &mut self,
        pred: impl Fn(&Notification) -> bool,
        timeout: Duration,
    ) -> Option<Notification> {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if let Ok(Ok(SessionEvent::Notification(n))) =
                tokio::time::timeout(Duration::from_millis(50), self.broadcast_rx.recv()).await
            {
                if pred(&n) {
                    return Some(n);
                }
            }
        }
        None
    }

    /// Wait for a state change into `phase` with no lease held
    pub async fn wait_for_phase(&mut self, phase: Phase, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if let Ok(Ok(SessionEvent::StateChange { state })) =
                tokio::time::timeout(Duration::from_millis(50), self.broadcast_rx.recv()).await
            {
                if state.phase() == phase && !state.is_leased() {
                    return true;
                }
            }
        }
        false
    }

    pub fn state(&self) -> SessionState {
        self.handle.state_rx.borrow().clone()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::FailureKind;
    use crate::transcription::VoicePreference;

    const TIMEOUT: Duration = Duration::from_secs(2);

    fn response(transcript: &str) -> TranscriptionResponse {
        TranscriptionResponse {
            transcript: transcript.to_string(),
            ..TranscriptionResponse::default()
        }
    }

    fn final_response(
        transcript: &str,
        receiver: Option<&str>,
        final_message: Option<&str>,
    ) -> TranscriptionResponse {
        TranscriptionResponse {
            transcript: transcript.to_string(),
            detected_receiver: receiver.map(String::from),
            final_message: final_message.map(String::from),
            is_final: true,
            ..TranscriptionResponse::default()
        }
    }

    #[tokio::test]
    async fn test_mock_transcription_client() {
        let mock = MockTranscriptionClient::new();
        mock.queue_response(response("hello"));

        let request = TranscriptionRequest {
            username: "me".to_string(),
            audio: AudioClip::new(vec![1], "audio/webm"),
            is_continuing: false,
            use_name_detection: true,
            voice: VoicePreference::Female,
        };
        let result = mock.transcribe(&request).await.unwrap();
        assert_eq!(result.transcript, "hello");
        assert_eq!(mock.recorded_requests().len(), 1);

        // Nothing queued
        assert!(mock.transcribe(&request).await.is_err());
    }

    /// Integration test: name the recipient, then confirm with "send"
    #[tokio::test]
    async fn test_compose_then_confirm_dispatches_once() {
        let transcriber = MockTranscriptionClient::new();
        transcriber.queue_response(final_response(
            "Tell Alice I'll be late",
            Some("Alice"),
            Some("I'll be late"),
        ));
        transcriber.queue_response(final_response("send", None, None));

        let mut rt = TestRuntime::new().transcriber(transcriber).build();

        rt.submit_recording().await;
        let preview = rt
            .wait_for_notification(
                |n| matches!(n, Notification::AwaitingConfirmation { .. }),
                TIMEOUT,
            )
            .await;
        match preview {
            Some(Notification::AwaitingConfirmation { preview }) => {
                assert_eq!(preview.recipient.as_deref(), Some("Alice"));
                assert_eq!(preview.message, "I'll be late");
            }
            other => panic!("Expected preview, got {other:?}"),
        }

        rt.submit_recording().await;
        let dispatched = rt
            .wait_for_notification(|n| matches!(n, Notification::Dispatched { .. }), TIMEOUT)
            .await;
        assert_eq!(
            dispatched,
            Some(Notification::Dispatched {
                sent_to: "Alice".to_string(),
                content: "I'll be late".to_string(),
            })
        );

        let delivered = rt.transport.delivered();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].receiver, "Alice");
        assert_eq!(delivered[0].content, "I'll be late");
        assert!(delivered[0].is_voice_message);

        assert!(rt.state().conversation.is_none());
        assert_eq!(rt.state().active_contact.as_deref(), Some("Alice"));

        // Second turn continued the composition and skipped name detection
        let requests = rt.transcriber.recorded_requests();
        assert_eq!(requests.len(), 2);
        assert!(!requests[0].is_continuing);
        assert!(requests[0].use_name_detection);
        assert!(requests[1].is_continuing);
        assert!(!requests[1].use_name_detection);
    }

    /// Integration test: a result that arrives after reset is discarded
    #[tokio::test]
    async fn test_reset_discards_in_flight_transcription() {
        let transcriber = DelayedMockTranscriptionClient::new(Duration::from_millis(300));
        transcriber.queue_response(final_response(
            "Tell Alice I'll be late",
            Some("Alice"),
            Some("I'll be late"),
        ));
        let started = transcriber.request_started.clone();

        let mut rt = TestRuntime::new().transcriber(transcriber).build_with(|| {
            DelayedMockTranscriptionClient::new(Duration::from_millis(300))
        });

        rt.submit_recording().await;
        tokio::time::timeout(TIMEOUT, started.notified())
            .await
            .expect("transcription never started");

        rt.reset().await;
        assert!(rt
            .wait_for_notification(|n| matches!(n, Notification::Abandoned), TIMEOUT)
            .await
            .is_some());

        // Give the cancelled round-trip time to have finished
        tokio::time::sleep(Duration::from_millis(500)).await;

        let state = rt.state();
        assert!(state.conversation.is_none());
        assert!(!state.is_leased());
        assert!(rt.transport.delivered().is_empty());
    }

    /// Integration test: a failed round-trip leaves the conversation untouched
    #[tokio::test]
    async fn test_transcription_error_keeps_conversation() {
        let transcriber = MockTranscriptionClient::new();
        transcriber.queue_response(response("Tell Bob the meeting moved"));
        transcriber.queue_error(TranscriptionError::Backend(
            "No valid audio file received".to_string(),
        ));

        let mut rt = TestRuntime::new().transcriber(transcriber).build();

        rt.submit_recording().await;
        assert!(rt.wait_for_phase(Phase::Composing, TIMEOUT).await);
        let before = rt.state();

        rt.submit_recording().await;
        let failure = rt
            .wait_for_notification(|n| matches!(n, Notification::Failed { .. }), TIMEOUT)
            .await;
        assert_eq!(
            failure,
            Some(Notification::Failed {
                kind: FailureKind::TranscriptionError,
                message: "Error: No valid audio file received".to_string(),
            })
        );

        // State is published before effects run
        let after = rt.state();
        assert_eq!(after.conversation, before.conversation);
        assert!(!after.is_leased());
    }

    /// Integration test: an unknown name blocks confirmation until a contact is picked
    #[tokio::test]
    async fn test_unresolved_name_then_contact_selection() {
        let transcriber = MockTranscriptionClient::new();
        transcriber.queue_response(final_response(
            "Tell Zed I'm on my way",
            Some("Zed"),
            Some("I'm on my way"),
        ));

        let mut rt = TestRuntime::new().transcriber(transcriber).build();

        rt.submit_recording().await;
        let failure = rt
            .wait_for_notification(|n| matches!(n, Notification::Failed { .. }), TIMEOUT)
            .await;
        assert!(matches!(
            failure,
            Some(Notification::Failed {
                kind: FailureKind::RecipientUnresolved,
                ..
            })
        ));
        let state = rt.state();
        assert_eq!(state.phase(), Phase::Composing);
        assert!(state.conversation.is_some_and(|conv| conv.awaiting_recipient));

        rt.select_contact("Bob").await;
        let preview = rt
            .wait_for_notification(
                |n| matches!(n, Notification::AwaitingConfirmation { .. }),
                TIMEOUT,
            )
            .await;
        assert!(matches!(
            preview,
            Some(Notification::AwaitingConfirmation { preview })
                if preview.recipient.as_deref() == Some("Bob")
        ));

        rt.request_send().await;
        assert!(rt
            .wait_for_notification(|n| matches!(n, Notification::Dispatched { .. }), TIMEOUT)
            .await
            .is_some());
        assert_eq!(rt.transport.delivered()[0].receiver, "Bob");
    }

    /// Integration test: transport failure keeps the draft for a retry
    #[tokio::test]
    async fn test_delivery_failure_keeps_draft() {
        let transcriber = MockTranscriptionClient::new();
        transcriber.queue_response(final_response(
            "Tell Alice I'll be late",
            Some("Alice"),
            Some("I'll be late"),
        ));

        let mut rt = TestRuntime::new()
            .transcriber(transcriber)
            .transport(RecordingTransport::failing("Alice"))
            .build();

        rt.submit_recording().await;
        assert!(rt
            .wait_for_phase(Phase::AwaitingConfirmation, TIMEOUT)
            .await);

        rt.request_send().await;
        let failure = rt
            .wait_for_notification(|n| matches!(n, Notification::Failed { .. }), TIMEOUT)
            .await;
        assert!(matches!(
            failure,
            Some(Notification::Failed {
                kind: FailureKind::DeliveryFailed,
                ..
            })
        ));

        let state = rt.state();
        assert_eq!(state.phase(), Phase::AwaitingConfirmation);
        assert!(!state.is_leased());
        assert_eq!(rt.transport.attempts(), 1);
        let conv = rt.state().conversation.expect("draft kept");
        assert_eq!(conv.candidate_message.as_deref(), Some("I'll be late"));
    }

    /// Integration test: user actions during a round-trip are rejected
    #[tokio::test]
    async fn test_busy_while_transcribing() {
        let transcriber = DelayedMockTranscriptionClient::new(Duration::from_millis(300));
        transcriber.queue_response(response("Tell Alice"));
        let started = transcriber.request_started.clone();

        let mut rt = TestRuntime::new().transcriber(transcriber).build_with(|| {
            DelayedMockTranscriptionClient::new(Duration::from_millis(300))
        });

        rt.submit_recording().await;
        tokio::time::timeout(TIMEOUT, started.notified())
            .await
            .expect("transcription never started");

        rt.request_send().await;
        let deadline = tokio::time::Instant::now() + TIMEOUT;
        let mut saw_error = false;
        while tokio::time::Instant::now() < deadline {
            if let Ok(Ok(SessionEvent::Error { message })) =
                tokio::time::timeout(Duration::from_millis(50), rt.broadcast_rx.recv()).await
            {
                assert!(message.contains("still being processed"));
                saw_error = true;
                break;
            }
        }
        assert!(saw_error);

        assert!(rt.wait_for_phase(Phase::Composing, TIMEOUT).await);
        assert!(rt.transport.delivered().is_empty());
    }

    /// Integration test: the assistant's reply to "send" is not what gets sent
    #[tokio::test]
    async fn test_confirmation_reply_does_not_replace_draft() {
        let transcriber = MockTranscriptionClient::new();
        transcriber.queue_response(final_response(
            "Tell Alice I'll be late",
            Some("Alice"),
            Some("I'll be late"),
        ));
        transcriber.queue_response(TranscriptionResponse {
            response: Some("Sure, sending now!".to_string()),
            ..final_response("send", None, None)
        });

        let mut rt = TestRuntime::new().transcriber(transcriber).build();

        rt.submit_recording().await;
        assert!(rt
            .wait_for_notification(
                |n| matches!(n, Notification::AwaitingConfirmation { .. }),
                TIMEOUT,
            )
            .await
            .is_some());

        rt.submit_recording().await;
        assert!(rt
            .wait_for_notification(|n| matches!(n, Notification::Dispatched { .. }), TIMEOUT)
            .await
            .is_some());

        let delivered = rt.transport.delivered();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].content, "I'll be late");
    }
}
