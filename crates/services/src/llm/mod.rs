pub mod groq;
pub mod json;

use async_trait::async_trait;

pub use groq::GroqClient;
pub use json::{ParseError, parse_llm_json};

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// No client configured, or the provider rejected the request outright.
    #[error("llm unavailable: {0}")]
    Unavailable(String),
    /// The bounded call deadline expired. Callers treat this the same as
    /// `Unavailable` and fall through to their deterministic fallbacks.
    #[error("llm call timed out")]
    Timeout,
    #[error("llm returned an empty completion")]
    EmptyResponse,
}

/// A single text-generation request. `system` primes the reply format (e.g.
/// "respond with valid JSON only"); `max_tokens`/`temperature` are passed
/// through to the provider.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system: Option<String>,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            temperature: 0.3,
            max_tokens: 800,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Opaque text-generation capability. Every component that depends on it has
/// a deterministic fallback, so an implementation may fail freely — a down
/// LLM degrades interview quality, not interview availability.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<String, LlmError>;
}
