//! Model catalog — static metadata for every model the dashboard checks.
//!
//! The catalog is a fixed table loaded with the binary. Its declaration
//! order is the order the sequencer sweeps and the order the table shows.
//! Limits (`rpm`/`tpm`/`rpd`) and most context windows are placeholders
//! until the provider exposes them per key.

use std::fmt;

use serde::Serialize;

// ── Enums ───────────────────────────────────────────────────────────

/// Broad family a model belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    Text,
    Image,
    Agent,
    Embedding,
}

impl ModelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::Text => "text",
            ModelType::Image => "image",
            ModelType::Agent => "agent",
            ModelType::Embedding => "embedding",
        }
    }

    /// Capitalised form used in the detail dialog ("Text", "Image", ...).
    pub fn title(&self) -> &'static str {
        match self {
            ModelType::Text => "Text",
            ModelType::Image => "Image",
            ModelType::Agent => "Agent",
            ModelType::Embedding => "Embedding",
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status shipped with the catalog. Superseded by live probe results as
/// soon as a sweep starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BaselineStatus {
    Working,
    Blocked,
    QuotaExhausted,
}

// ── Descriptor ──────────────────────────────────────────────────────

/// Static description of one catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDescriptor {
    /// Provider model identifier (e.g., "gemini-2.5-flash")
    pub id: &'static str,
    /// Human-readable name
    pub name: &'static str,
    #[serde(rename = "type")]
    pub model_type: ModelType,
    #[serde(rename = "status")]
    pub baseline_status: BaselineStatus,
    /// Free-tier requests per minute (0 = unknown)
    pub rpm: u32,
    /// Free-tier tokens per minute (0 = unknown)
    pub tpm: u64,
    /// Free-tier requests per day (0 = unknown)
    pub rpd: u32,
    /// Context window in tokens (0 = unknown)
    pub context_window: u64,
}

/// The catalog type consumed by the sequencer and the display layer.
pub type Catalog = &'static [ModelDescriptor];

const fn model(
    id: &'static str,
    name: &'static str,
    model_type: ModelType,
    context_window: u64,
) -> ModelDescriptor {
    ModelDescriptor {
        id,
        name,
        model_type,
        baseline_status: BaselineStatus::Working,
        rpm: 0,
        tpm: 0,
        rpd: 0,
        context_window,
    }
}

// ── Static Registry ─────────────────────────────────────────────────

use ModelType::{Agent, Embedding, Image, Text};

/// All known Gemini API models, in display order.
pub static MODELS: &[ModelDescriptor] = &[
    model("gemini-2.5-computer-use-preview-10-2025", "Computer Use Preview", Agent, 128_000),
    model("deep-research-pro-preview", "Deep Research Pro Preview", Text, 0),
    model("gemini-2.0-flash", "Gemini 2 Flash", Text, 0),
    model("gemini-2.0-flash-exp", "Gemini 2 Flash Exp", Text, 0),
    model("gemini-2.0-flash-lite", "Gemini 2 Flash Lite", Text, 0),
    model("gemini-2.0-pro-exp", "Gemini 2 Pro Exp", Text, 0),
    model("gemini-2.5-flash", "Gemini 2.5 Flash", Text, 0),
    model("gemini-2.5-flash-lite", "Gemini 2.5 Flash Lite", Text, 0),
    model("gemini-2.5-flash-native-audio-dialog", "Gemini 2.5 Flash Native Audio Dialog", Text, 0),
    model("gemini-2.5-flash-tts", "Gemini 2.5 Flash TTS", Text, 0),
    model("gemini-2.5-pro", "Gemini 2.5 Pro", Text, 0),
    model("gemini-2.5-pro-tts", "Gemini 2.5 Pro TTS", Text, 0),
    model("gemini-3-flash-preview", "Gemini 3 Flash", Text, 0),
    model("gemini-3-pro-preview", "Gemini 3 Pro", Text, 0),
    model("gemini-3.1-pro-preview", "Gemini 3.1 Pro", Text, 0),
    model("text-embedding-004", "Gemini Embedding 1", Embedding, 0),
    model("gemini-robotics-er-1.5-preview", "Gemini Robotics ER 1.5 Preview", Agent, 0),
    model("gemma-3-12b", "Gemma 3 12B", Text, 0),
    model("gemma-3-1b", "Gemma 3 1B", Text, 0),
    model("gemma-3-27b", "Gemma 3 27B", Text, 0),
    model("gemma-3-2b", "Gemma 3 2B", Text, 0),
    model("gemma-3-4b", "Gemma 3 4B", Text, 0),
    model("imagen-4.0-fast-generate-001", "Imagen 4 Fast Generate", Image, 0),
    model("imagen-4.0-generate-001", "Imagen 4 Generate", Image, 0),
    model("imagen-4.0-ultra-generate-001", "Imagen 4 Ultra Generate", Image, 0),
    model("gemini-2.5-flash-image", "Nano Banana (Gemini 2.5 Flash Preview Image)", Image, 0),
    model("gemini-3-pro-image-preview", "Nano Banana Pro (Gemini 3 Pro Image)", Image, 0),
    model("veo-3.1-fast-generate-001", "Veo 3 Fast Generate", Text, 0),
    model("veo-3.1-generate-001", "Veo 3 Generate", Text, 0),
];

// ── Registry API ────────────────────────────────────────────────────

/// Look up a descriptor by its provider identifier.
pub fn get_model(catalog: Catalog, id: &str) -> Option<&'static ModelDescriptor> {
    catalog.iter().find(|m| m.id == id)
}

/// Compact context-window label for table rows: "—" when unknown,
/// thousands with a "K" suffix (one decimal unless exact) otherwise.
pub fn format_context_window(tokens: u64) -> String {
    if tokens == 0 {
        return "—".to_string();
    }
    if tokens >= 1000 {
        if tokens % 1000 == 0 {
            return format!("{}K", tokens / 1000);
        }
        return format!("{:.1}K", tokens as f64 / 1000.0);
    }
    tokens.to_string()
}

/// Full context-window label for the detail dialog: "—" when unknown,
/// digits grouped with commas otherwise.
pub fn format_context_window_full(tokens: u64) -> String {
    if tokens == 0 {
        return "—".to_string();
    }
    let digits = tokens.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
