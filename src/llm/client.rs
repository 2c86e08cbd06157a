//! LLM client abstractions and provider selection (SPEC_FULL.md §4.M).
//!
//! - **Ollama**: full support, default feature, streaming.
//! - **OpenAI**: full support behind the `openai` feature, streaming.
//! - **Anthropic**: stub behind the `anthropic` feature — not yet implemented.
//! - **LlamaCpp**: stub behind the `llamacpp` feature — not yet implemented, use Ollama instead.

use crate::types::{CoreError, Result};
use crate::utils::toml_config::{ModelConfig, ProviderConfig};
use async_trait::async_trait;

/// Sampling parameters threaded through to whichever provider backs a [`LLMClient`]. Each field
/// is optional so a provider only overrides what the caller actually set, falling back to its own
/// API default otherwise.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ModelParams {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f32>,
    pub frequency_penalty: Option<f32>,
    pub presence_penalty: Option<f32>,
}

impl ModelParams {
    pub fn from_model_config(config: &ModelConfig) -> Self {
        Self {
            temperature: Some(config.temperature),
            max_tokens: Some(config.max_tokens),
            top_p: config.top_p,
            frequency_penalty: config.frequency_penalty,
            presence_penalty: config.presence_penalty,
        }
    }
}

/// Token accounting reported back by a provider, when it reports one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
        }
    }

    pub fn total_tokens(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Generic LLM client trait for provider abstraction.
///
/// All providers implement this trait, allowing the rest of the crate to treat them
/// interchangeably (SPEC_FULL.md §4.M's Generator contract).
#[async_trait]
pub trait LLMClient: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;

    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String>;

    /// `(role, content)` pairs, oldest first.
    async fn generate_with_history(&self, messages: &[(String, String)]) -> Result<String>;

    async fn stream(
        &self,
        prompt: &str,
    ) -> Result<Box<dyn futures::Stream<Item = Result<String>> + Send + Unpin>>;

    async fn stream_with_system(
        &self,
        system: &str,
        prompt: &str,
    ) -> Result<Box<dyn futures::Stream<Item = Result<String>> + Send + Unpin>>;

    async fn stream_with_history(
        &self,
        messages: &[(String, String)],
    ) -> Result<Box<dyn futures::Stream<Item = Result<String>> + Send + Unpin>>;

    fn model_name(&self) -> &str;
}

/// Response from a non-streaming generation request.
#[derive(Debug, Clone)]
pub struct LLMResponse {
    pub content: String,
    /// `"stop"`, `"length"`, or provider-specific equivalents.
    pub finish_reason: String,
    pub usage: Option<TokenUsage>,
}

/// Provider enum for runtime selection.
///
/// | Provider | Status | Streaming |
/// |----------|--------|-----------|
/// | Ollama | full | yes |
/// | OpenAI | full | yes |
/// | Anthropic | stub | - |
/// | LlamaCpp | stub | - |
#[derive(Debug, Clone)]
pub enum Provider {
    OpenAI {
        api_key: String,
        api_base: String,
        model: String,
        params: ModelParams,
    },

    /// Not yet implemented — see [`Provider::create_client`].
    Anthropic { api_key: String, model: String },

    Ollama {
        base_url: String,
        model: String,
        params: ModelParams,
    },

    /// Not yet implemented — use Ollama instead.
    LlamaCpp {
        model_path: String,
        n_ctx: u32,
        n_threads: u32,
        max_tokens: u32,
    },
}

impl Provider {
    /// Build a provider from a raw `[[providers]]` TOML entry, optionally overridden by a
    /// specific `[[models]]` entry's sampling parameters.
    pub fn from_config(provider_config: &ProviderConfig, model_config: Option<&ModelConfig>) -> Result<Self> {
        let params = model_config.map(ModelParams::from_model_config).unwrap_or_default();
        match provider_config {
            ProviderConfig::OpenAI {
                api_key_env,
                api_base,
                default_model,
            } => {
                let api_key = std::env::var(api_key_env).map_err(|_| {
                    CoreError::Validation(format!("environment variable {api_key_env} is not set"))
                })?;
                let model = model_config.map(|m| m.model.clone()).unwrap_or_else(|| default_model.clone());
                Ok(Provider::OpenAI {
                    api_key,
                    api_base: api_base.clone(),
                    model,
                    params,
                })
            }
            ProviderConfig::Ollama { base_url, default_model } => {
                let model = model_config.map(|m| m.model.clone()).unwrap_or_else(|| default_model.clone());
                Ok(Provider::Ollama {
                    base_url: base_url.clone(),
                    model,
                    params,
                })
            }
            ProviderConfig::LlamaCpp {
                model_path,
                n_ctx,
                n_threads,
                max_tokens,
            } => Ok(Provider::LlamaCpp {
                model_path: model_path.clone(),
                n_ctx: *n_ctx,
                n_threads: *n_threads,
                max_tokens: *max_tokens,
            }),
        }
    }

    /// Build a provider for a specific model entry, looking up its backing provider config.
    pub fn from_model_config(model_config: &ModelConfig, provider_config: &ProviderConfig) -> Result<Self> {
        Self::from_config(provider_config, Some(model_config))
    }

    /// Create a client instance for this provider.
    ///
    /// Returns [`CoreError::Unsupported`] for providers that are not yet implemented
    /// (Anthropic, LlamaCpp).
    pub async fn create_client(&self) -> Result<Box<dyn LLMClient>> {
        match self {
            Provider::OpenAI {
                api_key,
                api_base,
                model,
                params,
            } => Ok(Box::new(super::openai::OpenAIClient::with_params(
                api_key.clone(),
                api_base.clone(),
                model.clone(),
                params.clone(),
            ))),

            Provider::Anthropic { api_key, model } => Err(CoreError::Unsupported(format!(
                "Anthropic provider not yet implemented. Requested model: '{model}'. \
                 Alternatives: (1) use the OpenAI provider with an OpenRouter base URL for Claude \
                 access, (2) use Ollama for local inference. API key provided: {}",
                if api_key.is_empty() { "no" } else { "yes" }
            ))),

            Provider::Ollama { base_url, model, params } => Ok(Box::new(
                super::ollama::OllamaClient::with_params(base_url.clone(), model.clone(), params.clone()).await?,
            )),

            Provider::LlamaCpp { model_path, .. } => Err(CoreError::Unsupported(format!(
                "LlamaCpp provider not yet implemented. Requested model path: '{model_path}'. \
                 Use Ollama instead for local inference."
            ))),
        }
    }

    pub fn is_implemented(&self) -> bool {
        matches!(self, Provider::OpenAI { .. } | Provider::Ollama { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Provider::OpenAI { .. } => "OpenAI",
            Provider::Anthropic { .. } => "Anthropic",
            Provider::Ollama { .. } => "Ollama",
            Provider::LlamaCpp { .. } => "LlamaCpp",
        }
    }
}

/// Configuration-based client factory: a default provider plus the ability to spin up a
/// one-off client for a different provider on request.
pub struct LLMClientFactory {
    default_provider: Provider,
}

impl LLMClientFactory {
    pub fn new(default_provider: Provider) -> Self {
        Self { default_provider }
    }

    pub async fn create_default(&self) -> Result<Box<dyn LLMClient>> {
        self.default_provider.create_client().await
    }

    pub async fn create_with_provider(&self, provider: Provider) -> Result<Box<dyn LLMClient>> {
        provider.create_client().await
    }

    pub fn default_provider(&self) -> &Provider {
        &self.default_provider
    }

    pub fn is_default_implemented(&self) -> bool {
        self.default_provider.is_implemented()
    }
}
