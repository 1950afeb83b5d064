//! Memory-augmented chat turns.
//!
//! A turn is: rank stored records against the incoming message, fold the best
//! of them into the prompt, generate a reply, then log the exchange back into
//! memory so later retrieval (and feedback) can see it.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::config::ChatConfig;
use crate::engine::MemoryEngine;
use crate::errors::{MemoryError, Result};
use crate::llm::TextGenerator;
use crate::types::{RecordId, ScoredRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ChatRole::System => "System",
            ChatRole::User => "User",
            ChatRole::Assistant => "Assistant",
        };
        write!(f, "{label}")
    }
}

/// One prior turn of the conversation, caller-held.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: ChatRole::Assistant, content: content.into() }
    }
}

/// The outcome of one chat turn. `interaction_id` is the handle callers pass
/// back through [`ChatService::feedback`].
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub reply: String,
    pub interaction_id: RecordId,
    pub context_ids: Vec<RecordId>,
}

/// Chat pipeline over a shared engine and a text generator.
pub struct ChatService {
    engine: Arc<MemoryEngine>,
    llm: Arc<dyn TextGenerator>,
    config: ChatConfig,
}

impl ChatService {
    pub fn new(engine: Arc<MemoryEngine>, llm: Arc<dyn TextGenerator>, config: ChatConfig) -> Self {
        Self { engine, llm, config }
    }

    pub fn engine(&self) -> &Arc<MemoryEngine> {
        &self.engine
    }

    /// Runs one full turn: retrieve, prompt, generate, log.
    pub async fn chat(&self, user_message: &str, history: &[ChatMessage]) -> Result<ChatTurn> {
        let user_message = user_message.trim();
        if user_message.is_empty() {
            return Err(MemoryError::InvalidInput {
                field: "user_message".to_string(),
                reason: "must not be empty".to_string(),
            });
        }

        let context = self
            .engine
            .retrieve(user_message, self.config.context_limit)
            .await?;
        debug!(context = context.len(), "chat turn context assembled");

        let prompt = self.build_prompt(user_message, history, &context);
        let reply = self.llm.generate(&prompt).await?;

        let context_records: Vec<_> = context.into_iter().map(|s| s.record).collect();
        let interaction_id = self
            .engine
            .record_interaction(user_message, &reply, &context_records)
            .await?;

        Ok(ChatTurn {
            reply,
            interaction_id,
            context_ids: context_records.iter().map(|r| r.id).collect(),
        })
    }

    /// Routes caller feedback on a past turn to the engine. `NotFound` means
    /// the exchange was already pruned or deleted.
    pub async fn feedback(&self, interaction_id: &RecordId, helpful: bool) -> Result<()> {
        self.engine.record_outcome(interaction_id, helpful).await
    }

    /// Prompt layout: system line, retrieved memory as a bulleted system
    /// block, the running transcript, then the fresh message and an open
    /// `Assistant:` cue for the generator to complete.
    fn build_prompt(
        &self,
        user_message: &str,
        history: &[ChatMessage],
        context: &[ScoredRecord],
    ) -> String {
        let mut prompt = String::new();
        prompt.push_str(&format!("System: {}\n", self.config.system_prompt));

        if !context.is_empty() {
            prompt.push_str("System: Relevant information from memory:\n");
            for scored in context {
                prompt.push_str(&format!("- {}\n", scored.record.content));
            }
        }

        for message in history {
            prompt.push_str(&format!("{}: {}\n", message.role, message.content));
        }

        prompt.push_str(&format!("User: {user_message}\nAssistant:"));
        prompt
    }
}
