//! Turn orchestration: one user message in, one assistant reply out.

pub mod orchestrator;

pub use orchestrator::TurnOrchestrator;
