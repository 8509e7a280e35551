//! agentforge: a rate-aware LLM request gateway and an iterative
//! plan/research/develop/write/assess pipeline built on it.
//!
//! The [`llm::Gateway`] is the only path to a text-generation backend. It
//! picks a backend per request purpose, rotates credentials on rate limits,
//! admits one outbound call at a time and paces calls per backend. The
//! [`pipeline::RefinementPipeline`] drives the agents in [`agents`] through
//! the gateway until the drafted document converges.

pub mod agents;
pub mod cli;
pub mod error;
pub mod llm;
pub mod metrics;
pub mod notify;
pub mod pipeline;
pub mod storage;
pub mod utils;

// Re-export commonly used error types
pub use error::{ConfigError, LlmError, NotifyError, StoreError};
pub use pipeline::PipelineError;
