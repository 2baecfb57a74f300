//! Provider error classification — ordered substring rules.
//!
//! The provider's error text is the only signal we get, so both checks
//! classify by case-insensitive substring match against an explicit,
//! ordered rule table. First matching rule wins. The validator and the
//! probe keep separate tables: a failed key check cares about "invalid"
//! and "not found", a failed model check only about quota vs. access.

use serde::Serialize;

// ── Rules ───────────────────────────────────────────────────────────

/// One classification rule: any needle matching selects `category`.
#[derive(Debug)]
pub struct Rule<C> {
    pub needles: &'static [&'static str],
    pub category: C,
}

impl<C> Rule<C> {
    fn matches(&self, lower: &str) -> bool {
        self.needles.iter().any(|n| lower.contains(n))
    }
}

/// Evaluate `rules` in order against `raw`, returning the first match's
/// category or `fallback`.
pub fn first_match<C: Copy>(rules: &[Rule<C>], raw: &str, fallback: C) -> C {
    let lower = raw.to_lowercase();
    rules
        .iter()
        .find(|r| r.matches(&lower))
        .map(|r| r.category)
        .unwrap_or(fallback)
}

// ── Key Validation ──────────────────────────────────────────────────

/// Why the provider refused a key during validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeyRejection {
    InvalidKey,
    Forbidden,
    NotFound,
    QuotaOrRateLimit,
    ExpiredOrRevoked,
    Unknown,
}

impl KeyRejection {
    /// The fixed message shown to the user. The raw provider error is
    /// never surfaced for a rejected key.
    pub fn message(&self) -> &'static str {
        match self {
            KeyRejection::InvalidKey => {
                "The API key is invalid or incorrect. Please check your key at Google AI Studio."
            }
            KeyRejection::Forbidden => {
                "This API key doesn't have permission to use the Gemini API. Check your key restrictions in Google AI Studio."
            }
            KeyRejection::NotFound => {
                "Invalid request. Please check that your API key is correct."
            }
            KeyRejection::QuotaOrRateLimit => {
                "API quota or rate limit exceeded. Try again later or check your quota in Google AI Studio."
            }
            KeyRejection::ExpiredOrRevoked => {
                "This API key has expired or been revoked. Create a new key in Google AI Studio."
            }
            KeyRejection::Unknown => {
                "Invalid or expired API key. Please check your key at Google AI Studio."
            }
        }
    }
}

pub static KEY_REJECTION_RULES: &[Rule<KeyRejection>] = &[
    Rule {
        needles: &["api key not valid", "invalid api key", "invalid key", "401", "api_key_invalid"],
        category: KeyRejection::InvalidKey,
    },
    Rule {
        needles: &["403", "permission", "forbidden"],
        category: KeyRejection::Forbidden,
    },
    Rule {
        needles: &["404", "not found"],
        category: KeyRejection::NotFound,
    },
    Rule {
        needles: &["quota", "rate limit", "resource exhausted", "resource_exhausted", "429"],
        category: KeyRejection::QuotaOrRateLimit,
    },
    Rule {
        needles: &["expired", "revoked"],
        category: KeyRejection::ExpiredOrRevoked,
    },
];

/// Classify a raw provider error from the key-validation call.
pub fn classify_key_rejection(raw: &str) -> KeyRejection {
    first_match(KEY_REJECTION_RULES, raw, KeyRejection::Unknown)
}

// ── Model Probe ─────────────────────────────────────────────────────

/// Failure class of a single model probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeFailure {
    QuotaExhausted,
    Blocked,
    Error,
}

pub static PROBE_FAILURE_RULES: &[Rule<ProbeFailure>] = &[
    Rule {
        needles: &["quota", "resource exhausted", "resource_exhausted", "rate limit", "429"],
        category: ProbeFailure::QuotaExhausted,
    },
    Rule {
        needles: &["permission", "not available", "blocked", "forbidden", "403"],
        category: ProbeFailure::Blocked,
    },
];

/// Classify a raw provider error from a model probe.
pub fn classify_probe_failure(raw: &str) -> ProbeFailure {
    first_match(PROBE_FAILURE_RULES, raw, ProbeFailure::Error)
}
