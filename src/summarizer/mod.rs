//! Paper summarization via an OpenAI-compatible chat-completions API.

mod client;
mod types;

pub use client::{OpenAiClient, SummarizerError, SummaryClient};
