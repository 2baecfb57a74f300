//! KeyScope — Gemini API key validator and model access dashboard.
//!
//! Serves a local web page. The user pastes a key; the server validates
//! it, then probes every catalog model one at a time and reports which
//! ones the key can reach.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use keyscope::catalog::MODELS;
use keyscope::config::{Args, Config};
use keyscope::interpreter::ErrorInterpreter;
use keyscope::provider::google::{GoogleClient, GoogleGenerator, GoogleProvider};
use keyscope::server::{self, AppState};

/// How often idle sessions are looked for.
const REAP_EVERY: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_args(Args::parse());
    init_tracing(config.log_json);

    info!("🔭 KeyScope v{}", env!("CARGO_PKG_VERSION"));
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // ── Provider ────────────────────────────────────────────────────
    let client = GoogleClient::new(config.provider_url.clone());
    let provider = Arc::new(GoogleProvider::new(client.clone()));
    info!(url = %config.provider_url, "📡 Provider endpoint");

    // ── Error Interpreter ───────────────────────────────────────────
    let interpreter = match config.operator_key.clone() {
        Some(key) => {
            info!(model = %config.interpreter_model, "🧠 Error interpreter enabled");
            ErrorInterpreter::new(
                Arc::new(GoogleGenerator::new(client, key)),
                config.interpreter_model.clone(),
            )
        }
        None => {
            info!("🧠 Error interpreter disabled (set GEMINI_API_KEY or GOOGLE_API_KEY to enable)");
            ErrorInterpreter::disabled()
        }
    };

    // ── Sessions ────────────────────────────────────────────────────
    let state = AppState::new(MODELS, provider, interpreter);
    state.sessions.spawn_reaper(config.session_ttl, REAP_EVERY);
    info!(
        models = MODELS.len(),
        session_ttl_mins = config.session_ttl.as_secs() / 60,
        "📦 Catalog loaded"
    );

    // ── HTTP Server ─────────────────────────────────────────────────
    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("KeyScope ready at http://{}", config.bind);
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    axum::serve(listener, server::router(state))
        .await
        .context("HTTP server failed")?;

    Ok(())
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "keyscope=info".into());

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}
