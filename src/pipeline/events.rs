//! 流水线过程事件：用于 CLI / 前端展示阶段切换、工具调用、观察与结果

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use crate::core::PipelinePhase;
use crate::pipeline::StageKind;

/// 单步过程事件（可序列化为 JSON）
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// 进入新的状态
    PhaseChanged { phase: PipelinePhase },
    /// 调用工具
    ToolCall {
        tool: String,
        args: serde_json::Value,
    },
    /// 工具返回（预览，避免过长）
    Observation { tool: String, preview: String },
    /// 工具执行失败（Researching 阶段内降级处理）
    ToolFailure { tool: String, reason: String },
    /// 阶段输出已写入上下文
    StageCompleted { stage: StageKind, chars: usize },
    /// Token 使用统计（本次运行增量）
    TokenUsage {
        prompt_tokens: u64,
        completion_tokens: u64,
        total_tokens: u64,
    },
    /// 运行结束
    Done { images: usize },
    /// 错误
    Error { text: String },
}

/// Observation 预览最大字符数
pub(crate) const OBSERVATION_PREVIEW_CHARS: usize = 200;

pub(crate) fn send_event(tx: Option<&UnboundedSender<PipelineEvent>>, ev: PipelineEvent) {
    if let Some(t) = tx {
        let _ = t.send(ev);
    }
}

pub(crate) fn preview(text: &str) -> String {
    let head: String = text.chars().take(OBSERVATION_PREVIEW_CHARS).collect();
    if text.chars().count() > OBSERVATION_PREVIEW_CHARS {
        head + "..."
    } else {
        head
    }
}
