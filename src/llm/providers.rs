//! 模型服务商：OpenAI 与 Gemini（OpenAI 兼容端点）
//!
//! - OpenAI: 默认模型 gpt-4o-mini，使用官方 base url
//! - Gemini: https://generativelanguage.googleapis.com/v1beta/openai，默认模型 gemini-1.5-flash

use std::str::FromStr;
use std::sync::Arc;

use crate::config::LlmSection;
use crate::core::PipelineError;
use crate::llm::{LlmClient, OpenAiClient};

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
pub const GEMINI_FLASH: &str = "gemini-1.5-flash";
pub const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    OpenAi,
    Gemini,
}

impl LlmProvider {
    pub fn default_model(self) -> &'static str {
        match self {
            Self::OpenAi => OPENAI_DEFAULT_MODEL,
            Self::Gemini => GEMINI_FLASH,
        }
    }

    /// None 表示使用 async-openai 默认的 OpenAI 端点
    pub fn default_base_url(self) -> Option<&'static str> {
        match self {
            Self::OpenAi => None,
            Self::Gemini => Some(GEMINI_BASE_URL),
        }
    }
}

impl FromStr for LlmProvider {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "gemini" | "google" => Ok(Self::Gemini),
            other => Err(PipelineError::Config(format!(
                "unknown llm provider: {other} (expected openai or gemini)"
            ))),
        }
    }
}

/// 按 [llm] 配置与显式 api_key 创建客户端
pub fn create_llm_client(
    section: &LlmSection,
    api_key: &str,
) -> Result<Arc<dyn LlmClient>, PipelineError> {
    let provider: LlmProvider = section.provider.parse()?;
    let model = section
        .model
        .clone()
        .unwrap_or_else(|| provider.default_model().to_string());
    let base_url = section
        .base_url
        .as_deref()
        .or_else(|| provider.default_base_url());

    tracing::info!(provider = ?provider, model = %model, "configured LLM");
    Ok(Arc::new(
        OpenAiClient::new(base_url, &model, api_key)
            .with_sampling(section.temperature, section.max_tokens),
    ))
}
