//! Mealwise Telemetry
//!
//! Structured logging for the service binary. Library code only emits
//! `tracing` events; installing the subscriber is the binary's job.

pub mod tracer;

pub use tracer::{init_tracing, LogFormat, TelemetryConfig};
