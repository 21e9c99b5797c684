//! Text-generation backend abstraction and implementations.
//!
//! Defines the [`Generator`] trait and three interchangeable backends:
//! - **[`MockGenerator`]** — rule-based canned completions for demos and
//!   tests; no model, no network.
//! - **[`LocalGenerator`]** — a local model selected by filesystem path.
//!   The path is validated at construction; [`create_generator`] falls back
//!   to the mock backend (with a stderr warning) when loading fails.
//! - **[`ApiGenerator`]** — OpenAI-compatible chat completions over HTTP
//!   with retry and backoff.
//!
//! The backend is selected once at startup via [`create_generator`];
//! request handlers only ever see the trait object. A generator call may
//! block for a long time — callers must not hold locks across it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::config::GenerationConfig;

/// Opaque text-completion capability.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Complete `prompt` within a budget of `max_tokens`.
    async fn generate(&self, prompt: &str, max_tokens: usize) -> Result<String>;

    /// Model identifier reported by `GET /models/info`.
    fn model_name(&self) -> &str;

    /// Backend selector this generator was built from (`mock`/`local`/`api`).
    fn provider_kind(&self) -> &str;
}

// ============ Canned completion engine ============

const RAG_ANSWER: &str = "RAG (Retrieval Augmented Generation) is a technique that enhances AI \
generation by first retrieving relevant information from a knowledge base. It helps LLMs provide \
more factual and contextual responses.";

const GUARDRAIL_ANSWER: &str = "Guardrails are safety mechanisms that ensure AI outputs meet \
specific criteria like safety, relevance, and quality. They help prevent harmful, off-topic, or \
low-quality responses.";

const KUBERNETES_ANSWER: &str = "Kubernetes is an open-source platform for automating deployment, \
scaling, and management of containerized applications. It groups containers into logical units \
for easy management and discovery.";

/// Pull the final user query back out of a formatted prompt.
///
/// The prompt layout guarantees it ends with `"User: <query>\nAssistant: "`;
/// earlier history lines use lowercase role names, so the last `"User: "`
/// marker is unambiguous.
fn last_user_query(prompt: &str) -> &str {
    match prompt.rfind("User: ") {
        Some(pos) => {
            let rest = &prompt[pos + "User: ".len()..];
            rest.split('\n').next().unwrap_or(rest)
        }
        None => prompt,
    }
}

/// Keyword-routed canned completion shared by the mock and local backends.
fn canned_completion(prompt: &str, max_tokens: usize) -> String {
    let query = last_user_query(prompt);
    let query_lower = query.to_lowercase();

    let answer = if query_lower.contains("rag") {
        RAG_ANSWER.to_string()
    } else if query_lower.contains("guardrail") {
        GUARDRAIL_ANSWER.to_string()
    } else if query_lower.contains("kubernetes") {
        KUBERNETES_ANSWER.to_string()
    } else {
        let head: String = query.chars().take(30).collect();
        format!(
            "I understand your query about {}... Based on the retrieved information and my \
             knowledge, I can provide a comprehensive explanation. [This would be a detailed \
             response in a real implementation]",
            head
        )
    };

    cap_tokens(&answer, max_tokens)
}

/// Crude token-budget cap: whitespace-delimited words.
fn cap_tokens(text: &str, max_tokens: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= max_tokens {
        text.to_string()
    } else {
        words[..max_tokens].join(" ")
    }
}

// ============ Mock backend ============

/// Rule-based stand-in for a real model. Deterministic, which is what the
/// end-to-end tests lean on.
pub struct MockGenerator {
    model: String,
}

impl MockGenerator {
    pub fn new(model: Option<String>) -> Self {
        Self {
            model: model.unwrap_or_else(|| "mock-model".to_string()),
        }
    }
}

#[async_trait]
impl Generator for MockGenerator {
    async fn generate(&self, prompt: &str, max_tokens: usize) -> Result<String> {
        Ok(canned_completion(prompt, max_tokens))
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider_kind(&self) -> &str {
        "mock"
    }
}

// ============ Local backend ============

/// Generator backed by a model file on disk.
///
/// Construction fails when the path does not exist, which the factory turns
/// into a logged fallback to the mock backend. Inference itself runs the
/// same canned-completion engine under the local model's name; wiring in a
/// real in-process runtime only changes this one implementation.
#[derive(Debug)]
pub struct LocalGenerator {
    model: String,
    #[allow(dead_code)]
    model_path: PathBuf,
}

impl LocalGenerator {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            bail!("local model not found at {}", path.display());
        }

        let model = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("local-model")
            .to_string();

        Ok(Self {
            model,
            model_path: path.to_path_buf(),
        })
    }
}

#[async_trait]
impl Generator for LocalGenerator {
    async fn generate(&self, prompt: &str, max_tokens: usize) -> Result<String> {
        Ok(canned_completion(prompt, max_tokens))
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider_kind(&self) -> &str {
        "local"
    }
}

// ============ API backend ============

/// Generator calling an OpenAI-compatible `POST /v1/chat/completions`.
///
/// Requires the `OPENAI_API_KEY` environment variable, checked at
/// construction. Transient failures (429, 5xx, network) are retried with
/// exponential backoff; other client errors fail immediately.
pub struct ApiGenerator {
    model: String,
    max_retries: u32,
    timeout_secs: u64,
}

impl ApiGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("generation.model required for api provider"))?;

        if std::env::var("OPENAI_API_KEY").is_err() {
            bail!("OPENAI_API_KEY environment variable not set");
        }

        Ok(Self {
            model,
            max_retries: config.max_retries,
            timeout_secs: config.timeout_secs,
        })
    }
}

#[async_trait]
impl Generator for ApiGenerator {
    async fn generate(&self, prompt: &str, max_tokens: usize) -> Result<String> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()?;

        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "max_tokens": max_tokens,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = client
                .post("https://api.openai.com/v1/chat/completions")
                .header("Authorization", format!("Bearer {}", api_key))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_completion_response(&json);
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(anyhow::anyhow!(
                            "Completion API error {}: {}",
                            status,
                            body_text
                        ));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("Completion API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Generation failed after retries")))
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider_kind(&self) -> &str {
        "api"
    }
}

/// Extract `choices[0].message.content` from a chat-completions response.
fn parse_completion_response(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow::anyhow!("Invalid completion response: missing message content"))
}

/// Create the [`Generator`] selected by the configuration.
///
/// | Config Value | Backend |
/// |--------------|---------|
/// | `"mock"` | [`MockGenerator`] |
/// | `"local"` | [`LocalGenerator`], falling back to mock if the model path is missing or unloadable |
/// | `"api"` | [`ApiGenerator`] |
///
/// The local→mock fallback happens here, at construction, never inside a
/// request.
pub fn create_generator(config: &GenerationConfig) -> Result<Box<dyn Generator>> {
    match config.provider.as_str() {
        "mock" => Ok(Box::new(MockGenerator::new(config.model.clone()))),
        "local" => match &config.model_path {
            Some(path) => match LocalGenerator::load(path) {
                Ok(generator) => Ok(Box::new(generator)),
                Err(e) => {
                    eprintln!("warning: {}; falling back to mock backend", e);
                    Ok(Box::new(MockGenerator::new(None)))
                }
            },
            None => {
                eprintln!(
                    "warning: generation.model_path not set for local backend; falling back to mock backend"
                );
                Ok(Box::new(MockGenerator::new(None)))
            }
        },
        "api" => Ok(Box::new(ApiGenerator::new(config)?)),
        other => bail!("Unknown generation provider: {}", other),
    }
}
