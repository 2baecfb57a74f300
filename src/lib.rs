//! Gemini KeyScope — paste a Gemini API key, validate it, then sweep the
//! model catalog one probe at a time to see which models the key reaches.
//!
//! Layering (leaves first):
//! - `credential` / `catalog` — the key wrapper and the static model table
//! - `classify` — ordered substring rules for provider error text
//! - `provider` — the Gemini REST boundary behind two async traits
//! - `validator` / `probe` / `interpreter` — single-shot checks
//! - `sequencer` — the ordered, cancellable sweep over the catalog
//! - `display` — table, summary and detail-dialog view models
//! - `server` / `config` — HTTP sessions and process settings

pub mod catalog;
pub mod classify;
pub mod config;
pub mod credential;
pub mod display;
pub mod interpreter;
pub mod probe;
pub mod provider;
pub mod sequencer;
pub mod server;
pub mod validator;
