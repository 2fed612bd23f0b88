//! 工具执行器
//!
//! 持有 ToolContract 与统一超时，invoke 在超时内调用契约；
//! 超时转为 ExternalService 错误；每次调用输出结构化审计日志（JSON）。

use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::time::timeout;

use crate::core::PipelineError;
use crate::tools::{ToolContract, ToolKind, ToolOutput};

/// 工具执行器：对每次调用施加超时并记录审计日志
pub struct ToolExecutor {
    contract: ToolContract,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(contract: ToolContract, timeout_secs: u64) -> Self {
        Self {
            contract,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn contract(&self) -> &ToolContract {
        &self.contract
    }

    /// 执行指定工具；超时返回 ExternalService，输出 JSON 审计日志
    pub async fn invoke(&self, kind: ToolKind, args: Value) -> Result<ToolOutput, PipelineError> {
        let start = Instant::now();
        let args_preview = args_preview(&args);
        let result = timeout(self.timeout, self.contract.invoke(kind, args)).await;

        let outcome = match &result {
            Ok(Ok(_)) => "ok",
            Ok(Err(PipelineError::SchemaValidation { .. })) => "invalid_args",
            Ok(Err(_)) => "error",
            Err(_) => "timeout",
        };
        let duration_ms = start.elapsed().as_millis() as u64;
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": kind.name(),
            "ok": outcome == "ok",
            "outcome": outcome,
            "duration_ms": duration_ms,
            "args_preview": args_preview,
        });
        tracing::info!(audit = %audit.to_string(), "tool");

        match result {
            Ok(r) => r,
            Err(_) => Err(PipelineError::external(
                kind.name(),
                format!("timed out after {}s", self.timeout.as_secs()),
            )),
        }
    }
}

fn args_preview(args: &Value) -> String {
    let s = args.to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::json;

    use crate::tools::scrape::{PageScraper, PageSource};
    use crate::tools::ToolCapability;

    struct SlowSource;

    #[async_trait]
    impl PageSource for SlowSource {
        async fn fetch(&self, _url: &str) -> Result<String, PipelineError> {
            tokio::time::sleep(Duration::from_secs(3)).await;
            Ok("late".to_string())
        }
    }

    #[tokio::test]
    async fn test_timeout_becomes_external_service_error() {
        let contract = ToolContract::new("qdr:w2")
            .with(ToolCapability::Scrape(PageScraper::new(Arc::new(SlowSource), 100)));
        let executor = ToolExecutor::new(contract, 1);
        let err = executor
            .invoke(ToolKind::Scrape, json!({"website_url": "https://slow.example"}))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ExternalService { .. }));
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_args_preview_truncates() {
        let long = json!({"q": "x".repeat(500)});
        assert!(args_preview(&long).ends_with("..."));
        assert_eq!(args_preview(&json!({"q": "a"})), r#"{"q":"a"}"#);
    }
}
