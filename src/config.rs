use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::guardrails::SafetyCategory;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub guardrails: GuardrailConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

/// Which text-generation backend to construct at startup and how it behaves.
///
/// `provider` selects between `mock`, `local`, and `api`. The selection is
/// made once; request handlers never re-read it.
#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_provider")]
    pub provider: String,
    /// Model identifier for the `api` backend, or display name for `mock`.
    #[serde(default)]
    pub model: Option<String>,
    /// Filesystem path to a local model, required by the `local` backend.
    #[serde(default)]
    pub model_path: Option<PathBuf>,
    /// Default token budget when a request does not specify `max_tokens`.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            model: None,
            model_path: None,
            max_tokens: default_max_tokens(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_generation_provider() -> String {
    "mock".to_string()
}
fn default_max_tokens() -> usize {
    1024
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: default_dims(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "hashed".to_string()
}
fn default_dims() -> usize {
    384
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// How many characters of each retrieved document to quote in `sources`.
    #[serde(default = "default_excerpt_chars")]
    pub excerpt_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            excerpt_chars: default_excerpt_chars(),
        }
    }
}

fn default_top_k() -> usize {
    3
}
fn default_excerpt_chars() -> usize {
    100
}

/// Rule set for the guardrail engine. Read-only after startup.
#[derive(Debug, Deserialize, Clone)]
pub struct GuardrailConfig {
    /// Keyword lists per safety category. A case-insensitive substring match
    /// of any keyword flags the generated text.
    #[serde(default = "default_safety_rules")]
    pub safety_rules: BTreeMap<SafetyCategory, Vec<String>>,
    #[serde(default)]
    pub quality: QualityThresholds,
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            safety_rules: default_safety_rules(),
            quality: QualityThresholds::default(),
        }
    }
}

fn default_safety_rules() -> BTreeMap<SafetyCategory, Vec<String>> {
    let mut rules = BTreeMap::new();
    rules.insert(
        SafetyCategory::HarmfulContent,
        vec![
            "violence".to_string(),
            "hate speech".to_string(),
            "illegal activities".to_string(),
        ],
    );
    rules.insert(
        SafetyCategory::SensitiveTopics,
        vec![
            "politics".to_string(),
            "religion".to_string(),
            "adult content".to_string(),
        ],
    );
    rules.insert(
        SafetyCategory::PersonalData,
        vec![
            "credit cards".to_string(),
            "social security numbers".to_string(),
            "passwords".to_string(),
        ],
    );
    rules
}

#[derive(Debug, Deserialize, Clone)]
pub struct QualityThresholds {
    #[serde(default = "default_min_length")]
    pub min_length: usize,
    #[serde(default = "default_max_length")]
    pub max_length: usize,
    /// Reserved for a future coherence rule. Parsed and validated, never
    /// evaluated.
    #[serde(default = "default_coherence_score")]
    pub coherence_score: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            min_length: default_min_length(),
            max_length: default_max_length(),
            coherence_score: default_coherence_score(),
        }
    }
}

fn default_min_length() -> usize {
    20
}
fn default_max_length() -> usize {
    1000
}
fn default_coherence_score() -> f64 {
    0.7
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate_config(&config)?;

    Ok(config)
}

pub fn validate_config(config: &Config) -> Result<()> {
    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if config.retrieval.excerpt_chars < 1 {
        anyhow::bail!("retrieval.excerpt_chars must be >= 1");
    }
    if config.embedding.dims < 1 {
        anyhow::bail!("embedding.dims must be >= 1");
    }

    let q = &config.guardrails.quality;
    if q.min_length > q.max_length {
        anyhow::bail!("guardrails.quality.min_length must be <= max_length");
    }
    if !(0.0..=1.0).contains(&q.coherence_score) {
        anyhow::bail!("guardrails.quality.coherence_score must be in [0.0, 1.0]");
    }

    match config.generation.provider.as_str() {
        "mock" | "local" | "api" => {}
        other => anyhow::bail!(
            "Unknown generation provider: '{}'. Must be mock, local, or api.",
            other
        ),
    }

    match config.embedding.provider.as_str() {
        "hashed" | "openai" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be hashed or openai.",
            other
        ),
    }

    Ok(())
}

/// Apply environment-variable overrides to a loaded config.
///
/// Called exactly once in `main` before the pipeline is constructed.
/// Request-handling code never reads the environment.
///
/// | Variable | Overrides |
/// |----------|-----------|
/// | `LLM_MODEL_TYPE` | `generation.provider` (`mock`/`local`/`api`) |
/// | `LOCAL_MODEL_PATH` | `generation.model_path` |
/// | `API_MODEL_NAME` | `generation.model` |
/// | `PORT` | port part of `server.bind` |
pub fn apply_env_overrides(config: &mut Config) -> Result<()> {
    if let Ok(provider) = std::env::var("LLM_MODEL_TYPE") {
        config.generation.provider = provider;
    }
    if let Ok(path) = std::env::var("LOCAL_MODEL_PATH") {
        config.generation.model_path = Some(PathBuf::from(path));
    }
    if let Ok(model) = std::env::var("API_MODEL_NAME") {
        config.generation.model = Some(model);
    }
    if let Ok(port) = std::env::var("PORT") {
        let port: u16 = port
            .parse()
            .with_context(|| format!("PORT must be a number, got '{}'", port))?;
        let host = config
            .server
            .bind
            .rsplit_once(':')
            .map(|(host, _)| host)
            .unwrap_or("127.0.0.1");
        config.server.bind = format!("{}:{}", host, port);
    }

    validate_config(config)
}
