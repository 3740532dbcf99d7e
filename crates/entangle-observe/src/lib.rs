//! Observability setup for Entangle: structured logging and optional
//! OpenTelemetry trace export.

pub mod tracing_setup;
