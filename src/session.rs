//! Multi-turn diagnostic sessions.
//!
//! A [`SessionEngine`] owns one [`ConversationSession`] and serializes
//! queries against it: the session lock is held across the reasoning engine
//! call, so a second caller waits until the first exchange has been
//! recorded. Separate `SessionEngine` values share only the read-only
//! [`KnowledgeBase`] and the engine client.
//!
//! With history enabled, the question and the reply are appended together
//! after a successful call. A failed or timed-out call, or one whose reply is
//! blank, leaves the stored turns exactly as they were.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::context::ContextBuilder;
use crate::engine::ReasoningEngine;
use crate::error::EngineError;
use crate::knowledge::KnowledgeBase;
use crate::models::{DiagnosticResult, Role, Turn};
use crate::parser;
use crate::prompt;

/// Ordered conversation turns of one caller.
#[derive(Debug, Clone, Default)]
pub struct ConversationSession {
    turns: Vec<Turn>,
}

impl ConversationSession {
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// The stored turns plus `next`, trimmed to the last `window` turns and
    /// never starting with an assistant turn.
    fn window_with(&self, next: Turn, window: usize) -> Vec<Turn> {
        let mut all: Vec<Turn> = self.turns.clone();
        all.push(next);
        let mut start = all.len().saturating_sub(window.max(1));
        while start < all.len() - 1 && all[start].role == Role::Assistant {
            start += 1;
        }
        all.split_off(start)
    }

    fn record(&mut self, question: Turn, reply: Turn) {
        self.turns.push(question);
        self.turns.push(reply);
    }
}

pub struct SessionEngine {
    context: ContextBuilder,
    engine: Arc<dyn ReasoningEngine>,
    session: Mutex<ConversationSession>,
    timeout: Duration,
    history_window: usize,
}

impl SessionEngine {
    pub fn new(kb: Arc<KnowledgeBase>, engine: Arc<dyn ReasoningEngine>, config: &Config) -> Self {
        Self {
            context: ContextBuilder::new(kb, &config.context),
            engine,
            session: Mutex::new(ConversationSession::default()),
            timeout: Duration::from_secs(config.engine.timeout_secs),
            history_window: config.session.history_window,
        }
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        self.context.knowledge()
    }

    /// Answer `question` using the knowledge context and, when
    /// `use_history` is set, the previous turns of this session.
    pub async fn query(
        &self,
        question: &str,
        use_history: bool,
    ) -> Result<DiagnosticResult, EngineError> {
        if question.trim().is_empty() {
            return Err(EngineError::EmptyQuestion);
        }

        let block = self.context.build(question);
        debug!(
            error_codes = block.error_codes.len(),
            parameters = block.parameters.len(),
            components = block.components.len(),
            "built knowledge context"
        );
        let user_turn = Turn::user(prompt::render_message(&block.text, question));

        let mut session = self.session.lock().await;
        let messages = if use_history {
            session.window_with(user_turn.clone(), self.history_window)
        } else {
            vec![user_turn.clone()]
        };

        let call = self.engine.complete(prompt::SYSTEM_PROMPT, &messages);
        let reply = match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                warn!(error = %e, "reasoning engine call failed");
                return Err(e);
            }
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs(), "reasoning engine call timed out");
                return Err(EngineError::Timeout(self.timeout.as_secs()));
            }
        };
        if reply.trim().is_empty() {
            warn!("reasoning engine returned an empty reply");
            return Err(EngineError::EmptyReply);
        }

        if use_history {
            session.record(user_turn, Turn::assistant(reply.clone()));
        }
        let turns = session.turns().len();
        drop(session);

        let result = parser::parse(question, &reply);
        info!(
            model = self.engine.model_name(),
            confidence = %result.confidence_tier(),
            codes = result.codes_referenced().len(),
            history_turns = turns,
            "diagnostic query answered"
        );
        Ok(result)
    }

    /// Drop every stored turn. Safe to call on an empty session.
    pub async fn clear_history(&self) {
        self.session.lock().await.clear();
        debug!("conversation history cleared");
    }

    pub async fn history(&self) -> Vec<Turn> {
        self.session.lock().await.turns().to_vec()
    }

    pub async fn turn_count(&self) -> usize {
        self.session.lock().await.turns().len()
    }
}
