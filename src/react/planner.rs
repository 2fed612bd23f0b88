//! Tool Call 解析
//!
//! parse_llm_output 从模型输出中提取 JSON（```json 代码块或裸 `{...}`），
//! 能解析为 `{"tool": "...", "args": {...}}` 且 tool 非空时视为工具调用，否则整段作为回复。

use serde::{Deserialize, Serialize};

/// LLM 返回的 Tool Call（简化 JSON：{"tool": "google_search", "args": {"q": "..."}}）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

/// 解析结果
#[derive(Debug, Clone, PartialEq)]
pub enum PlannerOutput {
    /// 直接给出的文本（Researcher 的最终笔记）
    Response(String),
    /// 需要执行工具
    ToolCall(ToolCall),
}

/// 解析 LLM 输出：若含有效 JSON 且 tool 非空则为 ToolCall，否则为 Response
///
/// 研究笔记中出现的花括号或不完整 JSON 不是错误，按普通文本处理。
pub fn parse_llm_output(output: &str) -> PlannerOutput {
    let trimmed = output.trim();

    // 尝试提取 JSON 块（```json ... ``` 或纯 JSON）
    let json_str = if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        rest.find("```")
            .map(|end| rest[..end].trim())
            .unwrap_or(rest.trim())
    } else if let Some(start) = trimmed.find('{') {
        match trimmed.rfind('}') {
            Some(end) if end > start => &trimmed[start..=end],
            _ => return PlannerOutput::Response(trimmed.to_string()),
        }
    } else {
        return PlannerOutput::Response(trimmed.to_string());
    };

    match serde_json::from_str::<ToolCall>(json_str) {
        Ok(call) if !call.tool.trim().is_empty() => PlannerOutput::ToolCall(ToolCall {
            tool: call.tool.trim().to_string(),
            args: call.args,
        }),
        _ => PlannerOutput::Response(trimmed.to_string()),
    }
}
