//! Newsdesk - 多角色 Newsletter 生成流水线
//!
//! 模块划分：
//! - **agent**: Agent 人设与单阶段执行
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误分类、流水线状态机
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Gemini / Mock）
//! - **memory**: 对话消息与阶段上下文（PipelineContext）
//! - **observability**: 日志初始化
//! - **pipeline**: 阶段定义、构建校验、研究阶段、编排引擎与最终产出
//! - **react**: Tool Call 解析与 Researcher 的工具循环
//! - **tools**: 检索 / 图片检索 / 抓取客户端、工具契约与执行器

pub mod agent;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod pipeline;
pub mod react;
pub mod tools;

pub use config::{load_config, AppConfig};
pub use core::{ErrorKind, PipelineError};
pub use pipeline::{NewsletterOutput, Orchestrator, PipelineEvent};
