pub mod settings;

pub use settings::{
    ConfigError, ContextConfig, LLMConfig, LimitsConfig, PromptConfig, Settings, MAX_AGENT_STEPS,
    MAX_COMMANDS, MAX_OUTPUT_CHARS,
};
