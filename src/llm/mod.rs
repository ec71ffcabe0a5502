pub mod anthropic;
pub mod client;
pub mod context;
pub mod openai;
pub mod sanitize;

pub use anthropic::AnthropicClient;
pub use client::{ChatMessage, LLMClient, LLMError, Role};
pub use context::ContextBuilder;
pub use openai::OpenAiClient;

use crate::config::Settings;
use tracing::debug;

/// Build the transport for the configured provider
///
/// `anthropic` speaks the Messages API; every other provider name is treated
/// as an OpenAI-compatible server, with well-known local defaults for
/// `ollama` and `lmstudio`.
pub fn create_client(settings: &Settings) -> Result<Box<dyn LLMClient>, LLMError> {
    let llm = &settings.llm;
    let provider = llm.provider.as_str();

    debug!(provider, model = %llm.model, "creating LLM client");

    if provider == "anthropic" {
        let api_key = llm
            .api_key
            .clone()
            .ok_or_else(|| LLMError::MissingApiKey(provider.to_string()))?;
        let api_base = llm.api_base.as_deref().unwrap_or(anthropic::ANTHROPIC_API_BASE);
        let client = AnthropicClient::new(api_base, &llm.model, api_key, llm.request_timeout)?
            .with_temperature(llm.temperature);
        return Ok(Box::new(client));
    }

    let api_base = match (llm.api_base.as_deref(), provider) {
        (Some(base), _) => base,
        (None, "ollama") => openai::OLLAMA_API_BASE,
        (None, "lmstudio") => openai::LMSTUDIO_API_BASE,
        (None, _) => openai::OPENAI_API_BASE,
    };

    // The hosted API always needs a key; local servers usually do not
    if api_base == openai::OPENAI_API_BASE && llm.api_key.is_none() {
        return Err(LLMError::MissingApiKey(provider.to_string()));
    }

    let client = OpenAiClient::new(api_base, &llm.model, llm.api_key.clone(), llm.request_timeout)?
        .with_temperature(llm.temperature);
    Ok(Box::new(client))
}
