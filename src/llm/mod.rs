//! LLM integration for the intake engine.
//!
//! A narrow provider trait (`LlmProvider`) with a direct Anthropic Messages
//! API transport, plus the interview step that consumes it under a strict
//! bounded-output contract. The engine works without any provider at all;
//! everything here is the optional enrichment path.

pub mod anthropic;
pub mod interview;
pub mod provider;

pub use anthropic::{AnthropicConfig, AnthropicProvider};
pub use interview::{InterviewOutcome, InterviewStep};
pub use provider::*;
