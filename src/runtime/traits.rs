//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the executor with mock implementations.

use crate::transcription::{TranscriptionError, TranscriptionRequest, TranscriptionResponse};
use crate::transport::{OutgoingMessage, TransportError};
use async_trait::async_trait;
use std::sync::Arc;

/// Speech backend: transcribes a recording, detects the receiver, drafts the message
#[async_trait]
pub trait TranscriptionClient: Send + Sync {
    async fn transcribe(
        &self,
        request: &TranscriptionRequest,
    ) -> Result<TranscriptionResponse, TranscriptionError>;
}

/// Real-time message transport to the counterpart client
#[async_trait]
pub trait MessageTransport: Send + Sync {
    /// Deliver one message; acknowledgement by the receiver is not awaited
    async fn deliver(&self, message: &OutgoingMessage) -> Result<(), TransportError>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: TranscriptionClient + ?Sized> TranscriptionClient for Arc<T> {
    async fn transcribe(
        &self,
        request: &TranscriptionRequest,
    ) -> Result<TranscriptionResponse, TranscriptionError> {
        (**self).transcribe(request).await
    }
}

#[async_trait]
impl<T: MessageTransport + ?Sized> MessageTransport for Arc<T> {
    async fn deliver(&self, message: &OutgoingMessage) -> Result<(), TransportError> {
        (**self).deliver(message).await
    }
}
