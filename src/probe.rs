//! Model probe — can this key reach this model?
//!
//! Exactly one `get model` call per invocation, no retries, no caching.
//! Failure outcomes keep the provider's text verbatim so the interpreter
//! can explain it later.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classify::{classify_probe_failure, ProbeFailure};
use crate::credential::ApiKey;
use crate::provider::ModelProvider;

/// Result of one probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "error", rename_all = "kebab-case")]
pub enum ProbeOutcome {
    Working,
    Blocked(String),
    QuotaExhausted(String),
    Error(String),
}

impl ProbeOutcome {
    /// Build a failure outcome from raw provider text.
    pub fn from_failure(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        match classify_probe_failure(&raw) {
            ProbeFailure::QuotaExhausted => ProbeOutcome::QuotaExhausted(raw),
            ProbeFailure::Blocked => ProbeOutcome::Blocked(raw),
            ProbeFailure::Error => ProbeOutcome::Error(raw),
        }
    }

    pub fn is_working(&self) -> bool {
        matches!(self, ProbeOutcome::Working)
    }

    /// The failure reason, if any.
    pub fn reason(&self) -> Option<&str> {
        match self {
            ProbeOutcome::Working => None,
            ProbeOutcome::Blocked(r) | ProbeOutcome::QuotaExhausted(r) | ProbeOutcome::Error(r) => {
                Some(r)
            }
        }
    }

    /// Wire name of the variant ("working", "quota-exhausted", ...).
    pub fn kind(&self) -> &'static str {
        match self {
            ProbeOutcome::Working => "working",
            ProbeOutcome::Blocked(_) => "blocked",
            ProbeOutcome::QuotaExhausted(_) => "quota-exhausted",
            ProbeOutcome::Error(_) => "error",
        }
    }
}

pub struct ModelProbe {
    provider: Arc<dyn ModelProvider>,
}

impl ModelProbe {
    pub fn new(provider: Arc<dyn ModelProvider>) -> Self {
        Self { provider }
    }

    pub async fn probe(&self, key: &str, model_id: &str) -> ProbeOutcome {
        let Ok(key) = ApiKey::parse(key) else {
            return ProbeOutcome::Error("API key is required.".into());
        };
        let model_id = model_id.trim();
        if model_id.is_empty() {
            return ProbeOutcome::Error("Model ID is required.".into());
        }

        let outcome = match self.provider.get_model(&key, model_id).await {
            Ok(_) => ProbeOutcome::Working,
            Err(e) => ProbeOutcome::from_failure(e.message),
        };
        debug!(model_id, outcome = outcome.kind(), "probe finished");
        outcome
    }
}
