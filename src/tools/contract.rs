//! 工具契约：带 schema 校验的能力调用
//!
//! 每个外部能力（网页检索、图片检索、网页抓取）都是 ToolCapability 的一个变体，
//! 声明名称、描述与参数 schema；ToolContract 先校验原始参数再委托给对应客户端，
//! 校验失败时返回 SchemaValidation 且不发起外部请求。

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::PipelineError;
use crate::tools::image_search::{ImageResult, ImageSearchClient};
use crate::tools::schema::{args_schema, parse_args, ScrapeArgs, SearchArgs};
use crate::tools::scrape::{PageScraper, ScrapedPage};
use crate::tools::search::{SearchClient, SearchResult};

/// 能力种类（用于阶段声明绑定的工具集合）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    Search,
    ImageSearch,
    Scrape,
}

impl ToolKind {
    pub const ALL: [ToolKind; 3] = [ToolKind::Search, ToolKind::ImageSearch, ToolKind::Scrape];

    /// 工具名（LLM 在 `{"tool": ...}` 中使用）
    pub fn name(self) -> &'static str {
        match self {
            Self::Search => "google_search",
            Self::ImageSearch => "google_images_search",
            Self::Scrape => "website_scraper",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name.trim())
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Search => "Search the internet for recent stories. Args: {\"q\": \"query\", \"tbs\": \"qdr:w2\" (optional)}",
            Self::ImageSearch => "Search the internet for images. Args: {\"q\": \"query\", \"tbs\": \"qdr:w2\" (optional)}",
            Self::Scrape => "Scrape content from a web page. Args: {\"website_url\": \"https://...\"}",
        }
    }

    pub fn parameters_schema(self) -> Value {
        match self {
            Self::Search | Self::ImageSearch => args_schema::<SearchArgs>(),
            Self::Scrape => args_schema::<ScrapeArgs>(),
        }
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// 外部能力（带各自的客户端与凭据）
#[derive(Clone)]
pub enum ToolCapability {
    Search(SearchClient),
    ImageSearch(ImageSearchClient),
    Scrape(PageScraper),
}

impl ToolCapability {
    pub fn kind(&self) -> ToolKind {
        match self {
            Self::Search(_) => ToolKind::Search,
            Self::ImageSearch(_) => ToolKind::ImageSearch,
            Self::Scrape(_) => ToolKind::Scrape,
        }
    }
}

/// 归一化后的工具结果
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolOutput {
    Search(SearchResult),
    Images(ImageResult),
    Page(ScrapedPage),
}

impl ToolOutput {
    /// 作为观察结果喂回 LLM 的文本
    pub fn observation(&self) -> String {
        match self {
            Self::Search(r) if r.is_empty() => "(no notable results)".to_string(),
            Self::Search(r) => r.summary.clone(),
            Self::Images(r) if r.images.is_empty() => "(no images found)".to_string(),
            Self::Images(r) => r.summary.clone(),
            Self::Page(p) if p.text.trim().is_empty() => format!("(no text extracted from {})", p.url),
            Self::Page(p) => p.text.clone(),
        }
    }
}

/// 工具契约：持有本次运行可用的能力与默认时间过滤
pub struct ToolContract {
    capabilities: Vec<ToolCapability>,
    default_time_filter: String,
}

impl ToolContract {
    pub fn new(default_time_filter: impl Into<String>) -> Self {
        Self {
            capabilities: Vec::new(),
            default_time_filter: default_time_filter.into(),
        }
    }

    /// 注册能力；同种能力重复注册时替换旧的
    pub fn register(&mut self, capability: ToolCapability) {
        let kind = capability.kind();
        self.capabilities.retain(|c| c.kind() != kind);
        self.capabilities.push(capability);
    }

    pub fn with(mut self, capability: ToolCapability) -> Self {
        self.register(capability);
        self
    }

    pub fn kinds(&self) -> BTreeSet<ToolKind> {
        self.capabilities.iter().map(ToolCapability::kind).collect()
    }

    pub fn default_time_filter(&self) -> &str {
        &self.default_time_filter
    }

    fn capability(&self, kind: ToolKind) -> Option<&ToolCapability> {
        self.capabilities.iter().find(|c| c.kind() == kind)
    }

    /// 校验参数并调用能力；校验失败不发起外部请求
    pub async fn invoke(&self, kind: ToolKind, raw_args: Value) -> Result<ToolOutput, PipelineError> {
        let tool = kind.name();
        let capability = self
            .capability(kind)
            .ok_or_else(|| PipelineError::schema(tool, "tool not available"))?;

        match capability {
            ToolCapability::Search(client) => {
                let query = parse_args::<SearchArgs>(tool, raw_args)?
                    .into_query(&self.default_time_filter)
                    .map_err(|e| PipelineError::schema(tool, e))?;
                client.search(&query).await.map(ToolOutput::Search)
            }
            ToolCapability::ImageSearch(client) => {
                let query = parse_args::<SearchArgs>(tool, raw_args)?
                    .into_query(&self.default_time_filter)
                    .map_err(|e| PipelineError::schema(tool, e))?;
                client.search_images(&query).await.map(ToolOutput::Images)
            }
            ToolCapability::Scrape(scraper) => {
                let url = parse_args::<ScrapeArgs>(tool, raw_args)?
                    .into_url()
                    .map_err(|e| PipelineError::schema(tool, e))?;
                scraper.scrape(&url).await.map(ToolOutput::Page)
            }
        }
    }

    /// 按名称调用（名称来自 LLM 输出）
    pub async fn invoke_named(&self, name: &str, raw_args: Value) -> Result<ToolOutput, PipelineError> {
        let kind = ToolKind::from_name(name)
            .ok_or_else(|| PipelineError::schema(name, format!("unknown tool: {name}")))?;
        self.invoke(kind, raw_args).await
    }

    /// 已注册能力的名称、描述与参数 schema（拼入 Researcher prompt）
    pub fn to_schema_json(&self) -> String {
        let tools: Vec<Value> = self
            .capabilities
            .iter()
            .map(|c| {
                let kind = c.kind();
                serde_json::json!({
                    "name": kind.name(),
                    "description": kind.description(),
                    "parameters": kind.parameters_schema(),
                })
            })
            .collect();
        serde_json::to_string_pretty(&tools).unwrap_or_else(|_| "[]".to_string())
    }
}
