//! Google Gemini provider — the generativelanguage v1beta REST API.
//!
//! The key travels in the `x-goog-api-key` header rather than the query
//! string, so request URLs (which end up in transport errors) never
//! carry it.

use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;

use super::{
    GenerateRequest, GenerateResponse, ModelInfo, ModelProvider, ProviderError, TextGenerator,
};
use crate::credential::ApiKey;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Longest provider error body carried into a message.
const MAX_ERROR_LEN: usize = 500;

/// Thin REST client shared by the model provider and the generator.
#[derive(Clone)]
pub struct GoogleClient {
    client: reqwest::Client,
    base_url: String,
}

impl GoogleClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1beta/{}", self.base_url, path)
    }

    /// Send a request and return the decoded JSON body, or a flattened
    /// `ProviderError` for any non-2xx answer.
    async fn send(&self, req: reqwest::RequestBuilder, key: &ApiKey) -> Result<Value, ProviderError> {
        let resp = req
            .header("x-goog-api-key", key.expose())
            .send()
            .await
            .map_err(ProviderError::transport)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(parse_error_response(status, &body));
        }
        resp.json::<Value>().await.map_err(ProviderError::transport)
    }
}

impl Default for GoogleClient {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

/// Flatten a Gemini error response into one message:
/// `[<code> <reason>] <message> (<STATUS>)`.
pub fn parse_error_response(status: reqwest::StatusCode, body: &str) -> ProviderError {
    let parsed: Value = serde_json::from_str(body).unwrap_or_default();
    let error = &parsed["error"];

    let message = error["message"]
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| truncate(body, MAX_ERROR_LEN).to_string());
    let reason = status.canonical_reason().unwrap_or("Error");

    let mut flat = format!("[{} {}] {}", status.as_u16(), reason, truncate(&message, MAX_ERROR_LEN));
    if let Some(code) = error["status"].as_str() {
        flat.push_str(&format!(" ({})", code));
    }
    ProviderError::new(Some(status.as_u16()), flat)
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn parse_model(m: &Value) -> Option<ModelInfo> {
    let name = m["name"].as_str()?;
    let id = name.strip_prefix("models/").unwrap_or(name);
    let methods = m["supportedGenerationMethods"]
        .as_array()
        .map(|a| {
            a.iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    Some(ModelInfo {
        id: id.to_string(),
        display_name: m["displayName"].as_str().unwrap_or(id).to_string(),
        input_token_limit: m["inputTokenLimit"].as_u64().unwrap_or(0),
        output_token_limit: m["outputTokenLimit"].as_u64().unwrap_or(0),
        supported_generation_methods: methods,
    })
}

// ── Model Provider ──────────────────────────────────────────────────

pub struct GoogleProvider {
    client: GoogleClient,
}

impl GoogleProvider {
    pub fn new(client: GoogleClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ModelProvider for GoogleProvider {
    fn provider_id(&self) -> &str {
        "google"
    }

    async fn list_models(
        &self,
        key: &ApiKey,
        page_size: u32,
    ) -> Result<Vec<ModelInfo>, ProviderError> {
        let req = self
            .client
            .client
            .get(self.client.url("models"))
            .query(&[("pageSize", page_size)]);
        let body = self.client.send(req, key).await?;

        Ok(body["models"]
            .as_array()
            .map(|models| models.iter().filter_map(parse_model).collect())
            .unwrap_or_default())
    }

    async fn get_model(&self, key: &ApiKey, model_id: &str) -> Result<ModelInfo, ProviderError> {
        let req = self
            .client
            .client
            .get(self.client.url(&format!("models/{}", model_id)));
        let body = self.client.send(req, key).await?;

        parse_model(&body).ok_or_else(|| {
            ProviderError::new(None, format!("malformed model metadata for {}", model_id))
        })
    }
}

// ── Text Generator ──────────────────────────────────────────────────

/// `generateContent` with an operator credential.
pub struct GoogleGenerator {
    client: GoogleClient,
    key: ApiKey,
}

impl GoogleGenerator {
    pub fn new(client: GoogleClient, key: ApiKey) -> Self {
        Self { client, key }
    }
}

#[async_trait]
impl TextGenerator for GoogleGenerator {
    async fn generate(&self, req: &GenerateRequest) -> Result<GenerateResponse, ProviderError> {
        let mut body = serde_json::json!({
            "contents": [{"role": "user", "parts": [{"text": &req.prompt}]}],
        });
        if let Some(sys) = &req.system_prompt {
            body["systemInstruction"] = serde_json::json!({
                "parts": [{"text": sys}]
            });
        }

        let mut gen_config = serde_json::json!({});
        if let Some(t) = req.temperature {
            gen_config["temperature"] = serde_json::json!(t);
        }
        if let Some(m) = req.max_tokens {
            gen_config["maxOutputTokens"] = serde_json::json!(m);
        }
        if let Some(schema) = &req.response_schema {
            gen_config["responseMimeType"] = serde_json::json!("application/json");
            gen_config["responseSchema"] = schema.clone();
        }
        body["generationConfig"] = gen_config;

        let start = Instant::now();
        let http = self
            .client
            .client
            .post(self.client.url(&format!("models/{}:generateContent", req.model)))
            .json(&body);
        let resp_body = self.client.send(http, &self.key).await?;
        let latency = start.elapsed().as_millis() as u64;

        let text = resp_body["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .unwrap_or("")
            .to_string();

        let usage = &resp_body["usageMetadata"];
        Ok(GenerateResponse {
            text,
            model: req.model.clone(),
            input_tokens: usage["promptTokenCount"].as_u64().unwrap_or(0),
            output_tokens: usage["candidatesTokenCount"].as_u64().unwrap_or(0),
            latency_ms: latency,
        })
    }
}
