//! Coze v3 conversation provider
//!
//! A chat is created, polled until it settles, and its answer message is
//! fetched afterwards. Streaming uses the same endpoint with SSE.

pub mod client;
pub mod types;

pub use client::CozeClient;
