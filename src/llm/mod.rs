//! LLM 层：客户端抽象与实现（OpenAI 兼容 / Gemini / Mock）

pub mod mock;
pub mod openai;
pub mod providers;
pub mod traits;

pub use mock::MockLlmClient;
pub use openai::{OpenAiClient, TokenUsage};
pub use providers::{create_llm_client, LlmProvider, GEMINI_BASE_URL, GEMINI_FLASH};
pub use traits::LlmClient;
