//! Ollama provider
//!
//! Local models behind `/api/chat`. Streaming responses are newline-delimited
//! JSON objects.

pub mod client;
pub mod types;

pub use client::OllamaClient;
