//! Chat-completion providers.
//!
//! The orchestrator only sees [`CompletionClient`]; [`OpenAiClient`] talks to
//! any OpenAI-compatible `/chat/completions` endpoint and [`Relay`] passes
//! request bodies through to the same endpoint unchanged.

mod client;
mod openai;
pub mod relay;

pub use client::CompletionClient;
pub use openai::{ChatEndpoint, OpenAiClient};
pub use relay::Relay;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Longest upstream body kept in an error for diagnostics.
const MAX_DETAIL_LEN: usize = 500;

/// A single system + user exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub system: String,
    pub user: String,
    pub temperature: f32,
}

/// Failure talking to the completion provider.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("could not reach the completion provider: {detail}")]
    Transport { detail: String },

    #[error("completion provider returned HTTP {status}: {detail}")]
    Status { status: u16, detail: String },

    #[error("completion response had no message content: {detail}")]
    MissingContent { detail: String },
}

impl UpstreamError {
    pub(crate) fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport {
            detail: err.to_string(),
        }
    }
}

/// Truncate an upstream body on a character boundary.
pub(crate) fn truncate_detail(body: &str) -> String {
    match body.char_indices().nth(MAX_DETAIL_LEN) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}
