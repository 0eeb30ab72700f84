//! In-memory conversation sessions.

use std::sync::Arc;

use mcp::Connector;

use crate::Result;
use crate::completion::Backend;
use crate::model::Message;
use crate::orchestrator::{ExchangeOutcome, Orchestrator};

/// A conversation session.
///
/// Only user questions and final answers are kept; tool traffic stays
/// inside each exchange.
pub struct Session<B, C: Connector> {
    orchestrator: Arc<Orchestrator<B, C>>,
    messages: Vec<Message>,
    system: Option<String>,
}

impl<B: Backend, C: Connector> Session<B, C> {
    pub fn new(orchestrator: Arc<Orchestrator<B, C>>) -> Self {
        Self {
            orchestrator,
            messages: Vec::new(),
            system: None,
        }
    }

    /// Set the system prompt.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Send a user message and get the assistant's response.
    pub async fn chat(&mut self, user_input: &str) -> Result<String> {
        Ok(self.exchange(user_input).await?.content)
    }

    /// Like [`chat`](Self::chat), reporting how the answer was produced.
    pub async fn exchange(&mut self, user_input: &str) -> Result<ExchangeOutcome> {
        self.messages.push(Message::user(user_input));

        let conversation: Vec<Message> = self
            .system
            .iter()
            .map(Message::system)
            .chain(self.messages.iter().cloned())
            .collect();

        match self.orchestrator.run(&conversation).await {
            Ok(outcome) => {
                self.messages.push(Message::assistant(&outcome.content));
                Ok(outcome)
            }
            Err(err) => {
                // Keep the history answerable.
                self.messages.pop();
                Err(err.into())
            }
        }
    }

    /// History without the system prompt.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}
