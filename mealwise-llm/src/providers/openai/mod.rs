//! OpenAI-compatible provider
//!
//! Serves deepseek, siliconflow, ark and user supplied custom endpoints, which
//! all speak the chat-completions format.

pub mod client;
pub mod types;

pub use client::OpenAiCompatibleClient;
