//! 流水线错误类型与分类
//!
//! 工具调用失败在 Researching 阶段内部聚合为 ToolFailure；其余阶段的错误直接终止本次运行。
//! `kind()` 用于区分凭据/配置错误、外部服务的瞬时错误与生成/契约错误。

use serde::Serialize;
use thiserror::Error;

use crate::pipeline::StageKind;

/// 一次 Newsletter 生成过程中可能出现的错误
#[derive(Error, Debug, Clone)]
pub enum PipelineError {
    /// 工具参数不符合声明的 schema；此时不会发起外部调用
    #[error("Schema validation failed for {tool}: {message}")]
    SchemaValidation { tool: String, message: String },

    /// 网络错误、非 2xx 响应、超时
    #[error("{service} request failed{}: {message}", status_suffix(.status))]
    ExternalService {
        service: String,
        status: Option<u16>,
        message: String,
    },

    #[error("{service} returned unparseable data: {message}")]
    ResponseParse { service: String, message: String },

    /// 阶段输出不满足下一阶段的最低结构要求（如空输出）
    #[error("Stage {stage} violated its output contract: {message}")]
    StageContractViolation { stage: StageKind, message: String },

    #[error("Generation failed in stage {stage}: {message}")]
    Generation { stage: StageKind, message: String },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid pipeline definition: {0}")]
    InvalidPipeline(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// 只有检索服务持有 API key；被抓取站点返回 401/403 不代表凭据问题
fn is_credentialed_service(service: &str) -> bool {
    service == crate::tools::serp::SERVICE_NAME
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

/// 面向调用方的错误大类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// 缺失或被拒绝的凭据、配置错误
    Credential,
    /// 外部服务瞬时错误（可重试）
    Provider,
    /// LLM 生成失败或阶段契约被破坏
    Generation,
    /// 参数、输入或流水线定义不合法
    Validation,
}

impl PipelineError {
    pub fn external(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExternalService {
            service: service.into(),
            status: None,
            message: message.into(),
        }
    }

    pub fn schema(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SchemaValidation {
            tool: tool.into(),
            message: message.into(),
        }
    }

    pub fn contract(stage: StageKind, message: impl Into<String>) -> Self {
        Self::StageContractViolation {
            stage,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Credential,
            Self::ExternalService {
                service,
                status: Some(401 | 403),
                ..
            } if is_credentialed_service(service) => ErrorKind::Credential,
            Self::ExternalService { .. } | Self::ResponseParse { .. } => ErrorKind::Provider,
            Self::Generation { .. } | Self::StageContractViolation { .. } => ErrorKind::Generation,
            Self::SchemaValidation { .. } | Self::InvalidPipeline(_) | Self::InvalidInput(_) => {
                ErrorKind::Validation
            }
        }
    }

    /// Researching 阶段可降级处理的错误（单个工具失败不终止阶段）
    pub fn is_recoverable_tool_error(&self) -> bool {
        matches!(
            self,
            Self::SchemaValidation { .. } | Self::ExternalService { .. } | Self::ResponseParse { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_credentials_classified_as_credential() {
        let err = PipelineError::ExternalService {
            service: "serpapi".into(),
            status: Some(401),
            message: "Invalid API key".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Credential);
        assert!(err.to_string().contains("HTTP 401"));
    }

    #[test]
    fn test_scraped_site_forbidden_is_provider_error() {
        let err = PipelineError::ExternalService {
            service: crate::tools::scrape::SERVICE_NAME.into(),
            status: Some(403),
            message: "HTTP 403 Forbidden for https://news.example/a".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Provider);
        assert!(err.is_recoverable_tool_error());
    }

    #[test]
    fn test_transient_errors_classified_as_provider() {
        let err = PipelineError::external("serpapi", "connection reset");
        assert_eq!(err.kind(), ErrorKind::Provider);
        assert_eq!(err.to_string(), "serpapi request failed: connection reset");

        let err = PipelineError::ResponseParse {
            service: "serpapi".into(),
            message: "expected value".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Provider);
    }

    #[test]
    fn test_stage_errors_classified_as_generation() {
        let err = PipelineError::contract(StageKind::Writer, "empty output");
        assert_eq!(err.kind(), ErrorKind::Generation);
        assert!(!err.is_recoverable_tool_error());
    }
}
