//! Error interpreter — turns raw provider error text into advice.
//!
//! A convenience layer over an error, never a critical path: without an
//! operator credential it passes the text through, and any failure of the
//! generation call degrades to the raw text as well.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::provider::{GenerateRequest, TextGenerator};

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

const PROMPT_TEMPLATE: &str = "You are an expert in debugging and interpreting Google Gemini API error messages. Your goal is to help developers quickly understand and resolve issues.

A developer encountered the following raw Gemini API error message:

Raw Error Message: {raw}

Based on this raw error message, provide a user-friendly, actionable insight. Your response should be clear, concise, and offer practical steps or explanations for how to resolve the issue. Do not include the raw error message in your response. Just provide the actionable insight.";

/// What the user gets shown in place of the raw error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interpretation {
    pub message: String,
}

/// Structured output requested from the model.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InterpretationOutput {
    user_friendly_message: String,
}

pub struct ErrorInterpreter {
    generator: Option<Arc<dyn TextGenerator>>,
    model: String,
}

impl ErrorInterpreter {
    /// Pass-through interpreter, used when no operator credential is set.
    pub fn disabled() -> Self {
        Self {
            generator: None,
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn new(generator: Arc<dyn TextGenerator>, model: impl Into<String>) -> Self {
        Self {
            generator: Some(generator),
            model: model.into(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.generator.is_some()
    }

    pub async fn interpret(&self, raw_error: &str) -> Interpretation {
        let Some(generator) = &self.generator else {
            return Interpretation {
                message: raw_error.to_string(),
            };
        };

        let req = GenerateRequest {
            model: self.model.clone(),
            prompt: PROMPT_TEMPLATE.replace("{raw}", raw_error),
            system_prompt: None,
            temperature: Some(0.2),
            max_tokens: None,
            response_schema: Some(serde_json::json!({
                "type": "OBJECT",
                "properties": {
                    "userFriendlyMessage": {
                        "type": "STRING",
                        "description": "A clear, concise, and actionable insight derived from the raw error message."
                    }
                },
                "required": ["userFriendlyMessage"]
            })),
        };

        let resp = match generator.generate(&req).await {
            Ok(r) => r,
            Err(e) => {
                warn!(status = ?e.status, "Error interpretation failed: {}", e);
                return Interpretation {
                    message: raw_error.to_string(),
                };
            }
        };

        match serde_json::from_str::<InterpretationOutput>(&resp.text) {
            Ok(out) if !out.user_friendly_message.trim().is_empty() => {
                debug!(latency_ms = resp.latency_ms, "error interpreted");
                Interpretation {
                    message: out.user_friendly_message,
                }
            }
            Ok(_) => {
                warn!("Error interpretation returned an empty message");
                Interpretation {
                    message: raw_error.to_string(),
                }
            }
            Err(e) => {
                warn!("Error interpretation returned malformed output: {}", e);
                Interpretation {
                    message: raw_error.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{GenerateResponse, ProviderError};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct CannedGenerator {
        reply: Result<String, ProviderError>,
        prompts: Mutex<Vec<String>>,
    }

    impl CannedGenerator {
        fn replying(text: &str) -> Arc<Self> {
            Arc::new(Self { reply: Ok(text.to_string()), prompts: Mutex::new(vec![]) })
        }
        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: Err(ProviderError::new(Some(500), "[500 Internal Server Error] boom")),
                prompts: Mutex::new(vec![]),
            })
        }
    }

    #[async_trait]
    impl TextGenerator for CannedGenerator {
        async fn generate(&self, req: &GenerateRequest) -> Result<GenerateResponse, ProviderError> {
            self.prompts.lock().unwrap().push(req.prompt.clone());
            self.reply.clone().map(|text| GenerateResponse {
                text,
                model: req.model.clone(),
                input_tokens: 0,
                output_tokens: 0,
                latency_ms: 1,
            })
        }
    }

    #[tokio::test]
    async fn test_disabled_passes_through() {
        let interpreter = ErrorInterpreter::disabled();
        assert!(!interpreter.is_enabled());
        for raw in ["", "403 forbidden", "RESOURCE_EXHAUSTED"] {
            assert_eq!(interpreter.interpret(raw).await, Interpretation { message: raw.to_string() });
        }
    }

    #[tokio::test]
    async fn test_enabled_returns_model_output() {
        let gen = CannedGenerator::replying(r#"{"userFriendlyMessage":"Enable billing for this project."}"#);
        let interpreter = ErrorInterpreter::new(gen.clone(), DEFAULT_MODEL);

        let out = interpreter.interpret("[403 Forbidden] billing required").await;
        assert_eq!(out.message, "Enable billing for this project.");

        let prompts = gen.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Raw Error Message: [403 Forbidden] billing required"));
    }

    #[tokio::test]
    async fn test_generation_failure_degrades_to_raw() {
        let interpreter = ErrorInterpreter::new(CannedGenerator::failing(), DEFAULT_MODEL);
        let out = interpreter.interpret("quota gone").await;
        assert_eq!(out.message, "quota gone");
    }

    #[tokio::test]
    async fn test_malformed_output_degrades_to_raw() {
        for reply in ["not json", r#"{"other":"x"}"#, r#"{"userFriendlyMessage":"  "}"#] {
            let interpreter = ErrorInterpreter::new(CannedGenerator::replying(reply), DEFAULT_MODEL);
            assert_eq!(interpreter.interpret("raw text").await.message, "raw text");
        }
    }
}
