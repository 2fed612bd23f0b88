//! 检索服务传输层：GET {engine, q, tbs, api_key} → JSON
//!
//! SearchClient 与 ImageSearchClient 共用同一传输；测试中以内存实现替换，不访问网络。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::core::PipelineError;
use crate::tools::schema::Query;

pub const SERVICE_NAME: &str = "serpapi";

/// 服务商在“无结果”时也会返回 error 字段，这种情况按空结果处理
const NO_RESULTS_MARKER: &str = "hasn't returned any results";

/// 检索引擎
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engine {
    Google,
    GoogleImages,
}

impl Engine {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::GoogleImages => "google_images",
        }
    }
}

/// 检索服务传输：给定引擎与查询，返回原始 JSON
#[async_trait]
pub trait SerpTransport: Send + Sync {
    async fn fetch(&self, engine: Engine, query: &Query) -> Result<Value, PipelineError>;
}

/// 基于 reqwest 的 HTTP 传输；api_key 在构造时显式传入，错误信息中不带请求 URL
pub struct HttpSerpTransport {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpSerpTransport {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, PipelineError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| PipelineError::Config(format!("http client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl SerpTransport for HttpSerpTransport {
    async fn fetch(&self, engine: Engine, query: &Query) -> Result<Value, PipelineError> {
        let params = [
            ("engine", engine.as_str()),
            ("q", query.text()),
            ("tbs", query.time_filter()),
            ("api_key", self.api_key.as_str()),
        ];
        tracing::debug!(engine = engine.as_str(), q = %query.text(), tbs = %query.time_filter(), "serp request");

        let resp = self
            .client
            .get(&self.base_url)
            .query(&params)
            .send()
            .await
            .map_err(|e| PipelineError::external(SERVICE_NAME, format!("Request failed: {}", e.without_url())))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| PipelineError::external(SERVICE_NAME, format!("Read body: {}", e.without_url())))?;

        if !status.is_success() {
            return Err(PipelineError::ExternalService {
                service: SERVICE_NAME.to_string(),
                status: Some(status.as_u16()),
                message: provider_error(&body).unwrap_or_else(|| preview(&body)),
            });
        }

        parse_body(&body)
    }
}

/// 解析 2xx 响应体；顶层 `error` 字段视为服务端错误（“无结果”除外）
pub fn parse_body(body: &str) -> Result<Value, PipelineError> {
    let value: Value = serde_json::from_str(body).map_err(|e| PipelineError::ResponseParse {
        service: SERVICE_NAME.to_string(),
        message: e.to_string(),
    })?;
    if !value.is_object() {
        return Err(PipelineError::ResponseParse {
            service: SERVICE_NAME.to_string(),
            message: "top-level JSON is not an object".to_string(),
        });
    }
    if let Some(err) = value.get("error").and_then(Value::as_str) {
        if err.contains(NO_RESULTS_MARKER) {
            return Ok(Value::Object(Default::default()));
        }
        return Err(PipelineError::external(SERVICE_NAME, err));
    }
    Ok(value)
}

fn provider_error(body: &str) -> Option<String> {
    serde_json::from_str::<Value>(body)
        .ok()?
        .get("error")?
        .as_str()
        .map(String::from)
}

fn preview(body: &str) -> String {
    if body.chars().count() > 200 {
        format!("{}...", body.chars().take(200).collect::<String>())
    } else {
        body.to_string()
    }
}
