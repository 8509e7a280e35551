//! Text-generation layer.
//!
//! Pipeline stages only ever see [`TextGenerator`]; the concrete
//! implementation is the [`Gateway`], which owns backend selection,
//! credential rotation, throttling and failure classification.
//!
//! ```ignore
//! use agentforge::llm::{Gateway, GatewayConfig, GenerationRequest, TextGenerator};
//!
//! let gateway = Gateway::from_config(GatewayConfig::from_env()?)?;
//! let outcome = gateway
//!     .generate(GenerationRequest::generation("Summarise Rust ownership", "Research"))
//!     .await;
//! if let Some(text) = outcome.text() {
//!     println!("{}", text);
//! }
//! ```

pub mod config;
pub mod credentials;
pub mod gateway;
pub mod pacing;
pub mod providers;
pub mod types;

pub use config::{BackendKind, BackendSettings, GatewayConfig};
pub use credentials::{Credential, CredentialPool, KeyStrategy};
pub use gateway::Gateway;
pub use pacing::{AdmissionGate, Pacer};
pub use providers::{Backend, GeminiBackend, OllamaBackend, OpenAiCompatBackend};
pub use types::{
    GenerationOutcome, GenerationRequest, Message, Purpose, SentinelKind, TextGenerator,
    RATE_LIMITED_TOKEN, UNAVAILABLE_TOKEN,
};
