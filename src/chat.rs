//! Request orchestration: retrieve → format → generate → validate.
//!
//! One [`ChatOrchestrator`] is built at startup and shared across requests.
//! Each request runs the pipeline stages strictly in sequence — every
//! stage's output is the next stage's input — while concurrent requests
//! proceed independently: the orchestrator holds no per-request state and
//! no lock is held across the (potentially slow) generation call.

use std::sync::Arc;

use anyhow::{bail, Context, Result};

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::generator::{create_generator, Generator};
use crate::guardrails::GuardrailEngine;
use crate::index::{seed_demo_corpus, InMemoryIndex, VectorIndex};
use crate::models::{ChatResponse, Message, Role};
use crate::prompt::format_prompt;
use crate::retrieval::Retriever;

/// Detail string for a conversation that cannot be answered: empty, or not
/// ending with a user turn. Matched at the transport boundary to produce a
/// client error instead of a server error.
pub const INVALID_CONVERSATION: &str = "Last message must be from user";

/// Composes the retrieval + validation pipeline for one request.
pub struct ChatOrchestrator {
    retriever: Retriever,
    generator: Arc<dyn Generator>,
    guardrails: GuardrailEngine,
}

impl ChatOrchestrator {
    pub fn new(
        retriever: Retriever,
        generator: Arc<dyn Generator>,
        guardrails: GuardrailEngine,
    ) -> Self {
        Self {
            retriever,
            generator,
            guardrails,
        }
    }

    /// Assemble the full pipeline from configuration: embedder, seeded
    /// in-memory index, retriever, generation backend, guardrail engine.
    ///
    /// Called once at startup by both the server and the CLI.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let embedder: Arc<dyn crate::embedding::Embedder> =
            create_embedder(&config.embedding)?.into();
        let index = Arc::new(InMemoryIndex::new());

        seed_demo_corpus(index.as_ref(), embedder.as_ref())
            .await
            .context("failed to seed the knowledge base")?;
        println!(
            "Indexed {} documents ({} embeddings)",
            index.count().await?,
            embedder.model_name()
        );

        let retriever = Retriever::new(
            index,
            embedder,
            config.retrieval.top_k,
            config.retrieval.excerpt_chars,
        );

        let generator: Arc<dyn Generator> = create_generator(&config.generation)?.into();
        println!(
            "Generation backend: {} ({})",
            generator.provider_kind(),
            generator.model_name()
        );

        let guardrails = GuardrailEngine::new(config.guardrails.clone());

        Ok(Self::new(retriever, generator, guardrails))
    }

    /// Handle one conversation turn.
    ///
    /// Rejects the request before any retrieval or generation when the
    /// conversation is empty or does not end with a user message. Retrieval
    /// returning no documents is not an error — generation proceeds without
    /// context and the response carries an empty source list.
    pub async fn handle(&self, messages: &[Message], max_tokens: usize) -> Result<ChatResponse> {
        let last = match messages.last() {
            Some(m) if m.role == Role::User => m,
            _ => bail!("{}", INVALID_CONVERSATION),
        };
        let history = &messages[..messages.len() - 1];

        let retrieved = self
            .retriever
            .retrieve(&last.content)
            .await
            .context("retrieval failed")?;

        let prompt = format_prompt(&last.content, &retrieved.context, history);

        let raw = self
            .generator
            .generate(&prompt, max_tokens)
            .await
            .context("generation failed")?;

        let content = self.guardrails.validate(&raw);

        Ok(ChatResponse {
            message: Message {
                role: Role::Assistant,
                content,
            },
            sources: Some(retrieved.sources),
        })
    }

    /// Backend identity for `GET /models/info`: `(model_type, model_name)`.
    /// Reflects what was actually constructed, after any fallback.
    pub fn model_info(&self) -> (&str, &str) {
        (self.generator.provider_kind(), self.generator.model_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GuardrailConfig;
    use crate::embedding::HashedEmbedder;
    use crate::generator::MockGenerator;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Generator stub that counts invocations; used to prove rejected
    /// requests never reach generation.
    struct CountingGenerator {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Generator for CountingGenerator {
        async fn generate(&self, _prompt: &str, _max_tokens: usize) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("counted".to_string())
        }

        fn model_name(&self) -> &str {
            "counting"
        }

        fn provider_kind(&self) -> &str {
            "mock"
        }
    }

    fn orchestrator_with(generator: Arc<dyn Generator>) -> ChatOrchestrator {
        let retriever = Retriever::new(
            Arc::new(InMemoryIndex::new()),
            Arc::new(HashedEmbedder::new(32)),
            3,
            100,
        );
        ChatOrchestrator::new(
            retriever,
            generator,
            GuardrailEngine::new(GuardrailConfig::default()),
        )
    }

    #[tokio::test]
    async fn test_rejects_empty_conversation() {
        let orchestrator = orchestrator_with(Arc::new(MockGenerator::new(None)));
        let err = orchestrator.handle(&[], 1024).await.unwrap_err();
        assert_eq!(err.to_string(), INVALID_CONVERSATION);
    }

    #[tokio::test]
    async fn test_rejects_before_generation_when_last_is_assistant() {
        let calls = Arc::new(AtomicUsize::new(0));
        let orchestrator = orchestrator_with(Arc::new(CountingGenerator {
            calls: calls.clone(),
        }));

        let conversation = vec![Message::user("hi"), Message::assistant("hello")];
        let err = orchestrator.handle(&conversation, 1024).await.unwrap_err();

        assert_eq!(err.to_string(), INVALID_CONVERSATION);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_index_still_answers() {
        let orchestrator = orchestrator_with(Arc::new(MockGenerator::new(None)));
        let response = orchestrator
            .handle(&[Message::user("What is RAG?")], 1024)
            .await
            .unwrap();

        assert_eq!(response.message.role, Role::Assistant);
        assert!(!response.message.content.is_empty());
        assert_eq!(response.sources, Some(vec![]));
    }

    #[tokio::test]
    async fn test_model_info_reports_constructed_backend() {
        let orchestrator = orchestrator_with(Arc::new(MockGenerator::new(None)));
        let (model_type, model_name) = orchestrator.model_info();
        assert_eq!(model_type, "mock");
        assert_eq!(model_name, "mock-model");
    }
}
