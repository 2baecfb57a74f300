//! Process configuration: command-line flags plus the operator credential.

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;

use crate::credential::ApiKey;
use crate::interpreter;
use crate::provider::google::DEFAULT_BASE_URL;

/// Environment variables checked, in order, for the operator credential
/// used by the error interpreter. Never the user's key.
pub const OPERATOR_KEY_VARS: [&str; 2] = ["GEMINI_API_KEY", "GOOGLE_API_KEY"];

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Address the dashboard listens on
    #[arg(long, env = "KEYSCOPE_BIND", default_value = "127.0.0.1:9002")]
    pub bind: SocketAddr,

    /// Gemini API base URL
    #[arg(long, env = "KEYSCOPE_PROVIDER_URL", default_value = DEFAULT_BASE_URL)]
    pub provider_url: String,

    /// Model used to explain probe errors
    #[arg(long, env = "KEYSCOPE_INTERPRETER_MODEL", default_value = interpreter::DEFAULT_MODEL)]
    pub interpreter_model: String,

    /// Idle minutes before a dashboard session is dropped
    #[arg(long, env = "KEYSCOPE_SESSION_TTL_MINS", default_value_t = 60)]
    pub session_ttl_mins: u64,

    /// Emit JSON logs instead of human-readable lines
    #[arg(long, env = "KEYSCOPE_LOG_JSON")]
    pub log_json: bool,
}

/// Resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind: SocketAddr,
    pub provider_url: String,
    pub interpreter_model: String,
    pub session_ttl: Duration,
    pub log_json: bool,
    pub operator_key: Option<ApiKey>,
}

impl Config {
    pub fn from_args(args: Args) -> Self {
        Self::from_parts(args, |name| std::env::var(name).ok())
    }

    /// Same as `from_args` with an injectable environment lookup.
    pub fn from_parts(args: Args, lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            bind: args.bind,
            provider_url: args.provider_url.trim_end_matches('/').to_string(),
            interpreter_model: args.interpreter_model,
            session_ttl: Duration::from_secs(args.session_ttl_mins.max(1).saturating_mul(60)),
            log_json: args.log_json,
            operator_key: operator_credential_from(lookup),
        }
    }
}

/// First non-empty operator credential among `OPERATOR_KEY_VARS`.
pub fn operator_credential_from(lookup: impl Fn(&str) -> Option<String>) -> Option<ApiKey> {
    OPERATOR_KEY_VARS
        .iter()
        .filter_map(|name| lookup(name))
        .find(|v| !v.trim().is_empty())
        .map(ApiKey::new_unchecked)
}
