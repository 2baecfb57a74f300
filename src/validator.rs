//! Credential validator — the gate in front of every sweep.
//!
//! One cheap listing call (page size 1) proves the provider accepts the
//! key. Rejections are mapped to a fixed message; the provider's raw text
//! never reaches the caller.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::classify::{classify_key_rejection, KeyRejection};
use crate::credential::{ApiKey, KeyFormatError};
use crate::provider::ModelProvider;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Rejected locally, no network call made.
    #[error(transparent)]
    Format(#[from] KeyFormatError),
    /// Rejected by the provider.
    #[error("{}", .0.message())]
    Rejected(KeyRejection),
}

pub struct CredentialValidator {
    provider: Arc<dyn ModelProvider>,
}

impl CredentialValidator {
    pub fn new(provider: Arc<dyn ModelProvider>) -> Self {
        Self { provider }
    }

    /// Validate a user-supplied key. On success the trimmed key is handed
    /// back, ready to drive a sweep.
    pub async fn validate(&self, raw_key: &str) -> Result<ApiKey, ValidationError> {
        let key = ApiKey::parse(raw_key)?;

        match self.provider.list_models(&key, 1).await {
            // Only the call's success matters; the listing is discarded.
            Ok(_) => {
                info!(provider = self.provider.provider_id(), "API key accepted");
                Ok(key)
            }
            Err(e) => {
                let rejection = classify_key_rejection(&e.message);
                debug!(status = ?e.status, ?rejection, "API key rejected");
                Err(ValidationError::Rejected(rejection))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ModelInfo, ProviderError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedProvider {
        result: Result<(), String>,
        calls: AtomicUsize,
    }

    impl FixedProvider {
        fn ok() -> Self {
            Self { result: Ok(()), calls: AtomicUsize::new(0) }
        }
        fn failing(msg: &str) -> Self {
            Self { result: Err(msg.to_string()), calls: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl ModelProvider for FixedProvider {
        fn provider_id(&self) -> &str {
            "fixed"
        }

        async fn list_models(&self, _key: &ApiKey, page_size: u32) -> Result<Vec<ModelInfo>, ProviderError> {
            assert_eq!(page_size, 1, "validation must request a single item");
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.result {
                Ok(()) => Ok(vec![ModelInfo { id: "gemini-2.5-flash".into(), ..Default::default() }]),
                Err(msg) => Err(ProviderError::new(Some(400), msg.clone())),
            }
        }

        async fn get_model(&self, _key: &ApiKey, _model_id: &str) -> Result<ModelInfo, ProviderError> {
            unreachable!("validator never fetches single models")
        }
    }

    #[tokio::test]
    async fn test_short_key_rejected_without_network() {
        let provider = Arc::new(FixedProvider::ok());
        let validator = CredentialValidator::new(provider.clone());

        for raw in ["", "   ", "abc", "  123456789 "] {
            let err = validator.validate(raw).await.unwrap_err();
            assert_eq!(err, ValidationError::Format(KeyFormatError::TooShort));
        }
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_valid_key_makes_exactly_one_call() {
        let provider = Arc::new(FixedProvider::ok());
        let validator = CredentialValidator::new(provider.clone());

        let key = validator.validate("  AIzaSyGoodKey123  ").await.unwrap();
        assert_eq!(key.expose(), "AIzaSyGoodKey123");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rejection_uses_canned_message() {
        let provider = Arc::new(FixedProvider::failing(
            "[400 Bad Request] API key not valid. Please pass a valid API key. (INVALID_ARGUMENT)",
        ));
        let validator = CredentialValidator::new(provider);

        let err = validator.validate("AIzaSyBadKey9999").await.unwrap_err();
        assert_eq!(err, ValidationError::Rejected(KeyRejection::InvalidKey));
        let shown = err.to_string();
        assert_eq!(shown, KeyRejection::InvalidKey.message());
        assert!(!shown.contains("INVALID_ARGUMENT"), "raw error must not leak");
    }

    #[tokio::test]
    async fn test_unrecognised_failure_falls_back() {
        let provider = Arc::new(FixedProvider::failing("request failed: connection refused"));
        let validator = CredentialValidator::new(provider);

        let err = validator.validate("AIzaSyOkLength1").await.unwrap_err();
        assert_eq!(err, ValidationError::Rejected(KeyRejection::Unknown));
    }
}
