//! In-process chat message transport
//!
//! Joined users get a broadcast inbox; delivery routes a message to the
//! receiver's inbox and echoes it back to the sender so both sides render
//! it from the same stream.

use crate::recipient::ContactDirectory;
use crate::runtime::MessageTransport;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};

const INBOX_CAPACITY: usize = 64;

/// A chat message on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub id: String,
    pub sender: String,
    pub receiver: String,
    pub content: String,
    pub is_voice_message: bool,
    pub sent_at: DateTime<Utc>,
}

impl OutgoingMessage {
    pub fn new(
        sender: impl Into<String>,
        receiver: impl Into<String>,
        content: impl Into<String>,
        is_voice_message: bool,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            sender: sender.into(),
            receiver: receiver.into(),
            content: content.into(),
            is_voice_message,
            sent_at: Utc::now(),
        }
    }

    pub fn voice(
        sender: impl Into<String>,
        receiver: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self::new(sender, receiver, content, true)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Unknown receiver: {0}")]
    UnknownReceiver(String),
    #[error("Unknown sender: {0}")]
    UnknownSender(String),
    #[error("Message is empty")]
    EmptyMessage,
}

/// Routes messages between joined users
pub struct ChatHub {
    contacts: ContactDirectory,
    inboxes: RwLock<HashMap<String, broadcast::Sender<OutgoingMessage>>>,
}

impl ChatHub {
    pub fn new(contacts: ContactDirectory) -> Self {
        Self {
            contacts,
            inboxes: RwLock::new(HashMap::new()),
        }
    }

    pub fn contacts(&self) -> &ContactDirectory {
        &self.contacts
    }

    /// Register a user; returns the current contact list
    pub async fn join(&self, username: &str) -> Vec<String> {
        self.inboxes
            .write()
            .await
            .entry(username.to_string())
            .or_insert_with(|| broadcast::channel(INBOX_CAPACITY).0);
        if self.contacts.insert(username) {
            tracing::info!(username = %username, "User joined");
        }
        self.contacts.names()
    }

    pub async fn leave(&self, username: &str) -> Vec<String> {
        self.inboxes.write().await.remove(username);
        if self.contacts.remove(username) {
            tracing::info!(username = %username, "User left");
        }
        self.contacts.names()
    }

    /// Subscribe to a user's inbox
    pub async fn subscribe(&self, username: &str) -> Option<broadcast::Receiver<OutgoingMessage>> {
        self.inboxes
            .read()
            .await
            .get(username)
            .map(broadcast::Sender::subscribe)
    }

    async fn route(&self, message: &OutgoingMessage) -> Result<(), TransportError> {
        if message.content.trim().is_empty() {
            return Err(TransportError::EmptyMessage);
        }

        let inboxes = self.inboxes.read().await;
        let receiver = inboxes
            .get(&message.receiver)
            .ok_or_else(|| TransportError::UnknownReceiver(message.receiver.clone()))?;
        let sender = inboxes
            .get(&message.sender)
            .ok_or_else(|| TransportError::UnknownSender(message.sender.clone()))?;

        // No subscribers just means nobody is watching right now
        let _ = receiver.send(message.clone());
        if message.sender != message.receiver {
            let _ = sender.send(message.clone());
        }

        tracing::debug!(
            message_id = %message.id,
            sender = %message.sender,
            receiver = %message.receiver,
            is_voice_message = message.is_voice_message,
            "Message routed"
        );
        Ok(())
    }
}

#[async_trait]
impl MessageTransport for ChatHub {
    async fn deliver(&self, message: &OutgoingMessage) -> Result<(), TransportError> {
        self.route(message).await
    }
}
