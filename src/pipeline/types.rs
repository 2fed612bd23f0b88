//! 流水线类型定义
//!
//! 定义阶段种类、阶段任务与阶段节点等核心数据类型

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::agent::AgentPersona;
use crate::tools::ToolKind;

/// 阶段种类（按执行顺序）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// 检索、抓取并整理资料
    Researcher,
    /// 为每个故事撰写摘要
    Writer,
    /// 审校摘要
    Reviewer,
    /// 汇编成最终 Newsletter
    FinalWriter,
}

impl StageKind {
    pub const ALL: [StageKind; 4] = [
        StageKind::Researcher,
        StageKind::Writer,
        StageKind::Reviewer,
        StageKind::FinalWriter,
    ];

    /// 在流水线中的位置（0 起）
    pub fn ordinal(self) -> usize {
        match self {
            Self::Researcher => 0,
            Self::Writer => 1,
            Self::Reviewer => 2,
            Self::FinalWriter => 3,
        }
    }

    /// 上下文块标题中使用的名称
    pub fn title(self) -> &'static str {
        match self {
            Self::Researcher => "Researcher",
            Self::Writer => "Writer",
            Self::Reviewer => "Reviewer",
            Self::FinalWriter => "Final Writer",
        }
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Researcher => "researcher",
            Self::Writer => "writer",
            Self::Reviewer => "reviewer",
            Self::FinalWriter => "final_writer",
        };
        f.write_str(s)
    }
}

/// 阶段任务：描述、期望输出契约与可用工具
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageTask {
    pub description: String,
    pub expected_output: String,
    /// 仅 Researcher 非空
    pub bound_tools: BTreeSet<ToolKind>,
}

impl StageTask {
    pub fn new(description: impl Into<String>, expected_output: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            expected_output: expected_output.into(),
            bound_tools: BTreeSet::new(),
        }
    }

    pub fn with_tools(mut self, tools: impl IntoIterator<Item = ToolKind>) -> Self {
        self.bound_tools.extend(tools);
        self
    }
}

/// 流水线中的阶段节点
#[derive(Debug)]
pub struct PipelineStage {
    pub kind: StageKind,
    pub persona: AgentPersona,
    pub task: StageTask,
    /// 本阶段可读取的上游阶段输出（必须严格早于本阶段）
    pub read_set: Vec<StageKind>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordinals_follow_declaration_order() {
        for (i, kind) in StageKind::ALL.iter().enumerate() {
            assert_eq!(kind.ordinal(), i);
        }
        assert!(StageKind::Researcher < StageKind::FinalWriter);
    }

    #[test]
    fn test_display_and_title() {
        assert_eq!(StageKind::FinalWriter.to_string(), "final_writer");
        assert_eq!(StageKind::FinalWriter.title(), "Final Writer");
        assert_eq!(
            serde_json::to_string(&StageKind::FinalWriter).unwrap(),
            "\"final_writer\""
        );
    }
}
