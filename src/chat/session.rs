//! Conversation history for one chat session.

use super::intent::IntentResponder;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};

pub const GREETING: &str = "Hello! How can I help you analyze the EV sales data today?";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// Append-only message log, opened with the assistant greeting.
pub struct ChatSession {
    responder: IntentResponder,
    history: Vec<ChatMessage>,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    pub fn new() -> Self {
        Self {
            responder: IntentResponder::new(),
            history: vec![ChatMessage {
                role: Role::Assistant,
                content: GREETING.to_string(),
            }],
        }
    }

    /// Record the question, answer it against `data`, record the answer.
    pub fn ask(&mut self, query: &str, data: Option<&DataFrame>) -> &ChatMessage {
        self.history.push(ChatMessage {
            role: Role::User,
            content: query.to_string(),
        });
        let content = self.responder.respond(query, data);
        self.history.push(ChatMessage {
            role: Role::Assistant,
            content,
        });
        &self.history[self.history.len() - 1]
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::NO_DATA_MESSAGE;

    #[test]
    fn session_opens_with_greeting_and_grows_in_pairs() {
        let mut session = ChatSession::new();
        assert_eq!(session.history().len(), 1);
        assert_eq!(session.history()[0].role, Role::Assistant);
        assert_eq!(session.history()[0].content, GREETING);

        let reply = session.ask("top 5 regions", None).content.clone();
        assert_eq!(reply, NO_DATA_MESSAGE);
        session.ask("hello", None);

        let roles: Vec<Role> = session.history().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::Assistant, Role::User, Role::Assistant, Role::User, Role::Assistant]
        );
        assert_eq!(session.history()[1].content, "top 5 regions");
    }
}
