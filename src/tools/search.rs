//! 网页检索与结果归一化
//!
//! 服务商的响应结构不固定：按有序的 (key, extractor) 表依次查找结果类别，
//! 第一个存在的类别胜出并被展平为文本；一个都没有时返回空摘要（不是错误）。

use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::core::PipelineError;
use crate::tools::schema::Query;
use crate::tools::serp::{Engine, SerpTransport};

/// 将一个结果类别的值展平为文本
pub type Extractor = fn(&Value) -> String;

/// 归一化策略中的一项：响应顶层 key 及其提取函数
#[derive(Clone, Copy)]
pub struct ResultCategory {
    pub key: &'static str,
    pub extract: Extractor,
}

/// 网页检索的类别优先级（越靠前越优先）
pub const SEARCH_CATEGORIES: &[ResultCategory] = &[
    ResultCategory { key: "answer_box_list", extract: render_json },
    ResultCategory { key: "answer_box", extract: render_json },
    ResultCategory { key: "organic_results", extract: render_story_list },
    ResultCategory { key: "sports_results", extract: render_json },
    ResultCategory { key: "knowledge_graph", extract: render_json },
    ResultCategory { key: "top_stories", extract: render_story_list },
];

/// 归一化后的网页检索结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchResult {
    /// 命中的类别 key；无命中时为 None
    pub category: Option<&'static str>,
    pub summary: String,
}

impl SearchResult {
    pub fn is_empty(&self) -> bool {
        self.summary.trim().is_empty()
    }
}

/// 按优先级表归一化；纯函数，相同输入总得到相同文本
pub fn normalize(response: &Value, categories: &[ResultCategory]) -> SearchResult {
    categories
        .iter()
        .find_map(|c| {
            response.get(c.key).map(|v| SearchResult {
                category: Some(c.key),
                summary: (c.extract)(v),
            })
        })
        .unwrap_or_default()
}

/// 紧凑 JSON（serde_json 的 Map 按 key 排序，输出稳定）
pub fn render_json(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

/// 新闻/自然结果列表：每条渲染为 Title / Link / Source / Date / Snippet 块
pub fn render_story_list(value: &Value) -> String {
    let Some(items) = value.as_array() else {
        return render_json(value);
    };
    items
        .iter()
        .map(|item| {
            let Some(obj) = item.as_object() else {
                return render_json(item);
            };
            let mut lines = Vec::new();
            for (label, key) in [
                ("Title", "title"),
                ("Link", "link"),
                ("Source", "source"),
                ("Date", "date"),
                ("Snippet", "snippet"),
            ] {
                if let Some(text) = obj.get(key).and_then(field_text) {
                    lines.push(format!("{label}: {text}"));
                }
            }
            if lines.is_empty() {
                render_json(item)
            } else {
                lines.join("\n")
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// 字段值转单行文本；source 可能是对象（如 {"name": ...}）
fn field_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.split_whitespace().collect::<Vec<_>>().join(" ")),
        Value::Object(map) => map.get("name").and_then(field_text),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

static LINK_LINE_RE: OnceLock<Regex> = OnceLock::new();
static JSON_LINK_RE: OnceLock<Regex> = OnceLock::new();

/// 从检索摘要中提取候选 URL（保持出现顺序、去重、最多 limit 个）
///
/// 优先取 `Link:` 行；摘要为 JSON 形式时退回匹配 `"link": "..."`。
pub fn candidate_urls(summary: &str, limit: usize) -> Vec<String> {
    let line_re = LINK_LINE_RE.get_or_init(|| Regex::new(r"(?m)^Link: (https?://\S+)\s*$").unwrap());
    let json_re =
        JSON_LINK_RE.get_or_init(|| Regex::new(r#""link"\s*:\s*"(https?://[^"\s]+)""#).unwrap());

    let mut urls: Vec<String> = Vec::new();
    let mut push = |u: &str| {
        if urls.len() < limit && !urls.iter().any(|x| x == u) {
            urls.push(u.to_string());
        }
    };
    let from_lines: Vec<&str> = line_re
        .captures_iter(summary)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();
    if from_lines.is_empty() {
        for c in json_re.captures_iter(summary) {
            if let Some(m) = c.get(1) {
                push(m.as_str());
            }
        }
    } else {
        for u in from_lines {
            push(u);
        }
    }
    urls
}

/// 网页检索客户端
#[derive(Clone)]
pub struct SearchClient {
    transport: Arc<dyn SerpTransport>,
}

impl SearchClient {
    pub fn new(transport: Arc<dyn SerpTransport>) -> Self {
        Self { transport }
    }

    pub async fn search(&self, query: &Query) -> Result<SearchResult, PipelineError> {
        let response = self.transport.fetch(Engine::Google, query).await?;
        let result = normalize(&response, SEARCH_CATEGORIES);
        tracing::info!(
            q = %query.text(),
            category = result.category.unwrap_or("none"),
            chars = result.summary.len(),
            "search normalized"
        );
        Ok(result)
    }
}
