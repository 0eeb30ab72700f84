//! LLM provider backends.

mod chat_completions;

pub use chat_completions::{
    ChatCompletionsBackend, ChatCompletionsBackendBuilder, DEFAULT_ENDPOINT, DEFAULT_MODEL,
};
