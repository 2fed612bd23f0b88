//! 工具参数 Schema 与校验
//!
//! 参数结构由 schemars 生成 JSON Schema 注入 Researcher 的 prompt；
//! 实际调用前用同一结构反序列化原始 JSON 并做业务校验，失败即 SchemaValidation，不触发外部请求。

use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::PipelineError;

/// 检索参数：`{"q": "...", "tbs": "qdr:w2"}`
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SearchArgs {
    /// 检索关键词，支持 site:、intitle: 等 Google 语法
    #[serde(alias = "query")]
    pub q: String,
    /// 时间过滤（服务商语法），缺省为最近两周
    #[serde(default, alias = "time_filter")]
    pub tbs: Option<String>,
}

/// 抓取参数：`{"website_url": "https://..."}`
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ScrapeArgs {
    /// 需要抓取的网页完整 URL
    #[serde(alias = "url")]
    pub website_url: String,
}

/// 校验后的检索请求；构造后不可变
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Query {
    text: String,
    time_filter: String,
}

impl Query {
    /// text 去除首尾空白后不能为空
    pub fn new(text: &str, time_filter: impl Into<String>) -> Result<Self, String> {
        let text = text.trim();
        if text.is_empty() {
            return Err("query text must not be empty".to_string());
        }
        let time_filter = time_filter.into();
        if time_filter.trim().is_empty() {
            return Err("time filter must not be blank".to_string());
        }
        Ok(Self {
            text: text.to_string(),
            time_filter,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn time_filter(&self) -> &str {
        &self.time_filter
    }
}

impl SearchArgs {
    pub fn into_query(self, default_time_filter: &str) -> Result<Query, String> {
        let tbs = self
            .tbs
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| default_time_filter.to_string());
        Query::new(&self.q, tbs)
    }
}

impl ScrapeArgs {
    /// 只接受绝对 http(s) URL
    pub fn into_url(self) -> Result<String, String> {
        let raw = self.website_url.trim();
        let url = reqwest::Url::parse(raw).map_err(|e| format!("invalid website_url {raw:?}: {e}"))?;
        match url.scheme() {
            "http" | "https" => Ok(url.to_string()),
            other => Err(format!("unsupported url scheme: {other}")),
        }
    }
}

/// 将原始 JSON 参数反序列化为声明的参数结构；类型不符或缺字段时返回 SchemaValidation
pub fn parse_args<T: DeserializeOwned>(tool: &str, raw: Value) -> Result<T, PipelineError> {
    if !raw.is_object() {
        return Err(PipelineError::schema(tool, "arguments must be a JSON object"));
    }
    serde_json::from_value(raw).map_err(|e| PipelineError::schema(tool, e.to_string()))
}

/// 参数结构的 JSON Schema
pub fn args_schema<T: JsonSchema>() -> Value {
    serde_json::to_value(schema_for!(T)).unwrap_or_else(|_| Value::Object(Default::default()))
}
