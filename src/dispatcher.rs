//! Dispatch of the approved voice message

use crate::runtime::MessageTransport;
use crate::state_machine::effect::FailureKind;
use crate::state_machine::ConversationState;
use crate::transport::OutgoingMessage;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// A message cleared for sending
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dispatched {
    pub sent_to: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("No recipient selected. Please select a contact or mention a name clearly.")]
    MissingRecipient,
    #[error("There is no message to send yet")]
    MissingContent,
    #[error("Message delivery failed: {0}")]
    Transport(String),
}

impl DispatchError {
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            DispatchError::MissingRecipient => FailureKind::DispatchMissingRecipient,
            DispatchError::MissingContent => FailureKind::DispatchMissingContent,
            DispatchError::Transport(_) => FailureKind::DeliveryFailed,
        }
    }
}

/// Check that a conversation can be sent. Pure; the state is not touched.
pub fn validate(conversation: &ConversationState) -> Result<Dispatched, DispatchError> {
    let content = conversation
        .candidate_message
        .as_deref()
        .map(str::trim)
        .filter(|content| !content.is_empty())
        .ok_or(DispatchError::MissingContent)?;
    let sent_to = conversation
        .recipient
        .as_deref()
        .ok_or(DispatchError::MissingRecipient)?;

    Ok(Dispatched {
        sent_to: sent_to.to_string(),
        content: content.to_string(),
    })
}

/// Hands approved messages to the transport, one outbound message per call
pub struct Dispatcher<T: MessageTransport> {
    transport: Arc<T>,
    sender: String,
}

impl<T: MessageTransport> Dispatcher<T> {
    pub fn new(transport: Arc<T>, sender: impl Into<String>) -> Self {
        Self {
            transport,
            sender: sender.into(),
        }
    }

    /// Deliver without retrying; transport errors are returned as-is
    pub async fn dispatch(&self, message: &Dispatched) -> Result<OutgoingMessage, DispatchError> {
        let outgoing = OutgoingMessage::voice(&self.sender, &message.sent_to, &message.content);
        self.transport
            .deliver(&outgoing)
            .await
            .map_err(|e| DispatchError::Transport(e.to_string()))?;

        tracing::info!(
            sender = %self.sender,
            receiver = %outgoing.receiver,
            message_id = %outgoing.id,
            "Voice message dispatched"
        );
        Ok(outgoing)
    }
}
