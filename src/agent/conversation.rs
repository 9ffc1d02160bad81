//! Bounded in-memory conversation history

use chrono::{DateTime, Utc};

use super::types::{ConversationHistory, Message, Role, SessionId, WireMessage};
use crate::error::{ColloquyError, ColloquyResult};

/// Message log for one conversation.
///
/// The log never holds more than `max_history` messages. When an append
/// pushes it over, every system message is kept and the oldest non-system
/// messages are dropped, preserving relative order.
#[derive(Debug, Clone)]
pub struct ConversationSession {
    id: SessionId,
    messages: Vec<Message>,
    max_history: usize,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ConversationSession {
    /// Create a session, seeding it with a system message when a prompt is given
    pub fn new(id: impl Into<SessionId>, system_prompt: Option<&str>, max_history: usize) -> Self {
        let now = Utc::now();
        let mut session = Self {
            id: id.into(),
            messages: Vec::new(),
            max_history,
            created_at: now,
            updated_at: now,
        };
        if let Some(prompt) = system_prompt.filter(|p| !p.is_empty()) {
            session.push(Message::system(prompt));
        }
        session
    }

    /// Append a message, stamping it with the current time.
    ///
    /// System messages are only accepted at creation, through `new`.
    pub fn append(&mut self, mut message: Message) -> ColloquyResult<()> {
        message.validate()?;
        if message.role == Role::System {
            return Err(ColloquyError::InvalidMessage(
                "system messages can only be set when the session is created".to_string(),
            ));
        }
        message.timestamp = Utc::now();
        self.push(message);
        Ok(())
    }

    fn push(&mut self, message: Message) {
        self.updated_at = message.timestamp;
        self.messages.push(message);
        if self.messages.len() > self.max_history {
            self.trim();
        }
    }

    fn trim(&mut self) {
        let system_count = self.messages.iter().filter(|m| m.role == Role::System).count();
        let keep_others = self.max_history.saturating_sub(system_count);
        let other_count = self.messages.len() - system_count;
        let mut to_drop = other_count.saturating_sub(keep_others);

        self.messages.retain(|m| {
            if m.role == Role::System || to_drop == 0 {
                true
            } else {
                to_drop -= 1;
                false
            }
        });
    }

    /// Messages in the form the model call expects
    pub fn to_wire(&self) -> Vec<WireMessage> {
        self.messages.iter().map(Message::to_wire).collect()
    }

    pub fn snapshot(&self) -> ConversationHistory {
        ConversationHistory {
            session_id: self.id.clone(),
            messages: self.messages.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}
