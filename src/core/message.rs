use std::error::Error;
use std::fmt;

use chrono::Local;
use serde::{Deserialize, Serialize};

const TIMESTAMP_FORMAT: &str = "%H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

/// Where a message stands relative to the server.
///
/// `Pending` is the optimistic echo of a user send. It settles exactly once,
/// into `Confirmed` or `Failed`, and neither of those ever changes again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryState {
    Pending,
    Confirmed,
    Failed,
}

impl DeliveryState {
    /// Apply a transition, rejecting anything but `Pending -> settled`.
    pub fn transition_to(self, next: DeliveryState) -> Result<DeliveryState, InvalidTransition> {
        match (self, next) {
            (DeliveryState::Pending, DeliveryState::Confirmed | DeliveryState::Failed) => Ok(next),
            (from, to) => Err(InvalidTransition { from, to }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: DeliveryState,
    pub to: DeliveryState,
}

impl fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cannot move a message from {:?} to {:?}",
            self.from, self.to
        )
    }
}

impl Error for InvalidTransition {}

/// Identifier of a message within one transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(u64);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub text: String,
    pub sender: Sender,
    pub timestamp: String,
    pub delivery_state: DeliveryState,
    /// Balance reported alongside an assistant reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_tokens: Option<u64>,
}

impl ChatMessage {
    pub fn is_user(&self) -> bool {
        self.sender == Sender::User
    }

    pub fn is_assistant(&self) -> bool {
        self.sender == Sender::Assistant
    }
}

#[derive(Debug)]
pub enum TranscriptError {
    UnknownMessage(MessageId),
    Transition(InvalidTransition),
}

impl fmt::Display for TranscriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranscriptError::UnknownMessage(id) => write!(f, "no message with id {}", id.0),
            TranscriptError::Transition(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TranscriptError {}

impl From<InvalidTransition> for TranscriptError {
    fn from(err: InvalidTransition) -> Self {
        TranscriptError::Transition(err)
    }
}

/// Ordered record of the current session's exchange.
#[derive(Debug, Default, Clone)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
    next_id: u64,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the optimistic echo of a user send.
    pub fn push_user(&mut self, text: impl Into<String>) -> MessageId {
        self.push(text.into(), Sender::User, DeliveryState::Pending, None)
    }

    /// Append a server reply. Replies only exist once the server confirmed them.
    pub fn push_assistant(&mut self, text: impl Into<String>, remaining_tokens: u64) -> MessageId {
        self.push(
            text.into(),
            Sender::Assistant,
            DeliveryState::Confirmed,
            Some(remaining_tokens),
        )
    }

    fn push(
        &mut self,
        text: String,
        sender: Sender,
        delivery_state: DeliveryState,
        remaining_tokens: Option<u64>,
    ) -> MessageId {
        let id = MessageId(self.next_id);
        self.next_id += 1;
        self.messages.push(ChatMessage {
            id,
            text,
            sender,
            timestamp: Local::now().format(TIMESTAMP_FORMAT).to_string(),
            delivery_state,
            remaining_tokens,
        });
        id
    }

    pub fn confirm(&mut self, id: MessageId) -> Result<(), TranscriptError> {
        self.settle(id, DeliveryState::Confirmed)
    }

    pub fn fail(&mut self, id: MessageId) -> Result<(), TranscriptError> {
        self.settle(id, DeliveryState::Failed)
    }

    fn settle(&mut self, id: MessageId, next: DeliveryState) -> Result<(), TranscriptError> {
        let message = self
            .messages
            .iter_mut()
            .find(|message| message.id == id)
            .ok_or(TranscriptError::UnknownMessage(id))?;
        message.delivery_state = message.delivery_state.transition_to(next)?;
        Ok(())
    }

    pub fn get(&self, id: MessageId) -> Option<&ChatMessage> {
        self.messages.iter().find(|message| message.id == id)
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Drop every message. Ids keep increasing so stale ids never alias.
    pub fn clear(&mut self) {
        self.messages.clear();
    }
}
