//! Provider boundary — the calls KeyScope makes against the Gemini API.
//!
//! Two seams, so that each consumer depends only on what it uses:
//! - `ModelProvider` — key validation (list) and per-model access (get)
//! - `TextGenerator` — one prompt/response call, for the error interpreter
//!
//! Implementations must NOT store, log, or cache the key they are handed.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::credential::ApiKey;

pub mod google;

// ── Core Types ──────────────────────────────────────────────────────

/// Metadata about one model as reported by the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub display_name: String,
    pub input_token_limit: u64,
    pub output_token_limit: u64,
    pub supported_generation_methods: Vec<String>,
}

/// A single generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// JSON schema the response text must satisfy, when structured
    /// output is wanted.
    #[serde(default)]
    pub response_schema: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub text: String,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub latency_ms: u64,
}

/// A failed provider call. `message` is the flattened error text that
/// all classification works from; `status` is the HTTP status when the
/// provider answered at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ProviderError {
    pub status: Option<u16>,
    pub message: String,
}

impl ProviderError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// The provider could not be reached or the response could not be read.
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::new(None, format!("request failed: {}", err))
    }
}

// ── Provider Traits ─────────────────────────────────────────────────

/// Read-only model access checks made with the user's key.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Unique provider identifier (e.g., "google").
    fn provider_id(&self) -> &str;

    /// List models visible to `key`, asking for at most `page_size`.
    async fn list_models(&self, key: &ApiKey, page_size: u32)
        -> Result<Vec<ModelInfo>, ProviderError>;

    /// Fetch metadata for one model id.
    async fn get_model(&self, key: &ApiKey, model_id: &str) -> Result<ModelInfo, ProviderError>;
}

/// Text generation with an operator-owned credential.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, req: &GenerateRequest) -> Result<GenerateResponse, ProviderError>;
}
