//! Advisory chat log. Sending a message appends the user's text plus a
//! single placeholder; the placeholder is swapped for the assistant's
//! reply (or the canned fallback) when the request settles.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::capabilities::HttpResult;
use crate::orchestrator::{self, FailureReason, OperationResult};

/// Shown in place of the reply while a request is outstanding.
pub const PLACEHOLDER_TEXT: &str = "AI is thinking...";

/// The reply used whenever the advisory backend cannot answer.
pub const FALLBACK_REPLY: &str = "I'm having trouble connecting to the AI service. Here are some general agricultural tips: Ensure proper soil drainage, water regularly but don't overwater, and monitor for pests and diseases. Please try again in a moment.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub text: String,
    pub sender: Sender,
    pub timestamp_ms: u64,
    pub is_placeholder: bool,
}

impl Message {
    fn user(text: String, timestamp_ms: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            text,
            sender: Sender::User,
            timestamp_ms,
            is_placeholder: false,
        }
    }

    fn assistant(text: String, timestamp_ms: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            text,
            sender: Sender::Assistant,
            timestamp_ms,
            is_placeholder: false,
        }
    }

    fn placeholder(timestamp_ms: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: PLACEHOLDER_TEXT.to_string(),
            sender: Sender::Assistant,
            timestamp_ms,
            is_placeholder: true,
        }
    }
}

/// Outcome of offering a message for sending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Accepted,
    /// Whitespace-only input is dropped without touching the log.
    EmptyInput,
    /// One exchange at a time; sending is rejected while a reply is
    /// outstanding.
    ReplyOutstanding,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationManager {
    log: Vec<Message>,
}

impl ConversationManager {
    pub fn messages(&self) -> &[Message] {
        &self.log
    }

    #[must_use]
    pub fn awaiting_reply(&self) -> bool {
        self.log.iter().any(|m| m.is_placeholder)
    }

    /// Appends the user's message and the placeholder in one step, so no
    /// observable state ever shows one without the other.
    pub fn submit(&mut self, text: &str, now_ms: u64) -> Submission {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Submission::EmptyInput;
        }
        if self.awaiting_reply() {
            return Submission::ReplyOutstanding;
        }

        self.log.push(Message::user(trimmed.to_string(), now_ms));
        self.log.push(Message::placeholder(now_ms));
        Submission::Accepted
    }

    /// Settles the outstanding exchange: the placeholder is removed and the
    /// reply appended at the tail. Any failure substitutes the canned
    /// fallback reply, so the placeholder never outlives the request.
    pub fn complete<P>(&mut self, outcome: HttpResult, parse: P, now_ms: u64)
    where
        P: FnOnce(&[u8]) -> Result<String, FailureReason>,
    {
        if !self.awaiting_reply() {
            tracing::warn!("dropping chat response with no reply outstanding");
            return;
        }

        let settled =
            orchestrator::settle_with_fallback(outcome, parse, || FALLBACK_REPLY.to_string());
        let text = match settled {
            OperationResult::Success(text) | OperationResult::FallbackApplied(text, _) => text,
            OperationResult::Pending | OperationResult::Failed(_) => return,
        };

        self.log.retain(|m| !m.is_placeholder);
        self.log.push(Message::assistant(text, now_ms));
    }
}
