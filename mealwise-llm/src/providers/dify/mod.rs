//! Dify provider
//!
//! Chat applications behind `/chat-messages`, always consumed in streaming
//! mode. The non-streaming call aggregates the same event stream.

pub mod client;
pub mod types;

pub use client::DifyClient;
