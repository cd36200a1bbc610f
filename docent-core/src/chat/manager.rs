//! Per-turn dialogue orchestration.
//!
//! # Turn Flow
//!
//! ```text
//! checkout session → merge client history → image attached?
//!                                             ↓ yes        ↓ no
//!                                      multimodal reply   classify intent
//!                                                             ↓
//!                              canned reply  ←  label  →  HyDE → retrieve → answer
//! ```
//!
//! Every failure inside a turn is logged and replaced by the configured
//! internal-error text; only an empty question is reported to the caller.

use super::history::{HistoryMessage, Turn};
use super::intent::Intent;
use super::session::{Session, SessionStore};
use crate::config::{Config, Responses};
use crate::engine::EngineError;
use crate::prompts;
use crate::provider::{self, ChatRequest, Message, Provider};
use crate::rag::{Hyde, Retriever};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// One incoming question.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnswerRequest {
    pub question: String,
    pub session_id: String,
    /// Prior turns as the client remembers them.
    #[serde(default)]
    pub history: Vec<HistoryMessage>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl AnswerRequest {
    pub fn new(question: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            session_id: session_id.into(),
            ..Self::default()
        }
    }

    pub fn with_history(mut self, history: Vec<HistoryMessage>) -> Self {
        self.history = history;
        self
    }

    pub fn with_image(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }
}

/// The reply text and the session's full stored history after the turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub history: Vec<HistoryMessage>,
}

/// Answers questions within sessions.
///
/// Routes each text question by its classified intent: canned replies for
/// small talk, retrieval-grounded answers for specific questions. Questions
/// with an attached image skip classification and go straight to the
/// completion service together with the stored history.
pub struct DialogueManager {
    provider: Arc<dyn Provider>,
    hyde: Hyde,
    retriever: Retriever,
    sessions: SessionStore,
    responses: Responses,
    max_history: usize,
    completion_timeout: Duration,
}

impl DialogueManager {
    pub fn new(provider: Arc<dyn Provider>, retriever: Retriever, config: &Config) -> Self {
        let completion_timeout = config.timeouts.completion();

        Self {
            hyde: Hyde::new(Arc::clone(&provider), completion_timeout),
            provider,
            retriever,
            sessions: SessionStore::new(config.chat.session_timeout()),
            responses: config.responses.clone(),
            max_history: config.chat.max_history,
            completion_timeout,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Answers one question.
    ///
    /// # Errors
    ///
    /// Only [`EngineError::EmptyQuestion`]. Any other failure yields the
    /// configured internal-error text as the answer.
    pub async fn answer(&self, request: AnswerRequest) -> std::result::Result<Answer, EngineError> {
        if request.question.trim().is_empty() {
            return Err(EngineError::EmptyQuestion);
        }

        let session = self.sessions.checkout(&request.session_id, Instant::now());
        let mut session = session.lock().await;

        let merged = session.merge_client_history(&request.history, self.max_history);
        if merged > 0 {
            debug!(session = %request.session_id, merged, "Merged client history");
        }

        let text = match self
            .respond(&mut session, &request.question, request.image_url.as_deref())
            .await
        {
            Ok(text) => text,
            Err(e) => {
                error!(session = %request.session_id, error = ?e, "Failed to answer question");
                self.responses.internal_error.clone()
            }
        };

        Ok(Answer {
            text,
            history: session.history(),
        })
    }

    /// Forgets a session. Resetting an unknown session is not an error.
    pub fn reset(&self, session_id: &str) {
        if self.sessions.reset(session_id) {
            info!(session = session_id, "Session reset");
        }
    }

    async fn respond(&self, session: &mut Session, question: &str, image_url: Option<&str>) -> Result<String> {
        if let Some(image_url) = image_url {
            return self.respond_with_image(session, question, image_url).await;
        }

        let intent = self.classify(question).await?;
        info!(intent = %intent, "Intent classified");

        let reply = match intent {
            Intent::Greeting => self.responses.greeting.clone(),
            Intent::Thanks => self.responses.thanks.clone(),
            Intent::GeneralQuestion => self.responses.general.clone(),
            Intent::OffTopic => self.responses.off_topic.clone(),
            Intent::Unknown => self.responses.fallback.clone(),
            Intent::SpecificQuestion => match self.answer_from_documents(session, question).await? {
                Some(reply) => reply,
                None => {
                    session.push(Turn::user(question));
                    return Ok(self.responses.not_found.clone());
                }
            },
        };

        session.push(Turn::user(question));
        session.push(Turn::assistant(reply.as_str()));
        Ok(reply)
    }

    async fn classify(&self, question: &str) -> Result<Intent> {
        let request = ChatRequest::new(vec![Message::user(prompts::intent_prompt(question))]);
        let reply = self
            .complete(request)
            .await
            .context("Intent classification failed")?;
        debug!(reply = %reply.trim(), "Classifier reply");
        Ok(Intent::from_label(&reply))
    }

    /// Grounded answer, or `None` when retrieval found no context.
    async fn answer_from_documents(&self, session: &Session, question: &str) -> Result<Option<String>> {
        let document = self.hyde.expand(question).await.context("HyDE expansion failed")?;
        let context = self.retriever.search(&document).await.context("Retrieval failed")?;

        if context.trim().is_empty() {
            info!("No context found for question");
            return Ok(None);
        }

        let mut messages = vec![
            Message::system(prompts::ANSWER_SYSTEM_PROMPT),
            Message::user(prompts::context_message(&context)),
        ];
        messages.extend(session.recent(self.max_history).iter().map(Turn::to_text_message));
        messages.push(Message::user(question));

        let reply = self
            .complete(ChatRequest::new(messages))
            .await
            .context("Answer generation failed")?;
        Ok(Some(reply))
    }

    async fn respond_with_image(&self, session: &mut Session, question: &str, image_url: &str) -> Result<String> {
        let turn = Turn::user_with_image(question, image_url);

        let mut messages: Vec<Message> = session.turns().iter().map(Turn::to_message).collect();
        messages.push(turn.to_message());

        let reply = self
            .complete(ChatRequest::new(messages))
            .await
            .context("Multimodal completion failed")?;

        // Only the question is remembered on this path; the reply is not.
        session.push(turn);
        Ok(reply)
    }

    async fn complete(&self, request: ChatRequest) -> provider::Result<String> {
        provider::complete_within(self.provider.as_ref(), request, self.completion_timeout).await
    }
}
