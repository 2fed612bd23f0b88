//! 流水线状态机：Researching → Writing → Reviewing → FinalCompiling → Done
//!
//! 严格线性、单次通过；不存在回退到更早状态的转换。

use serde::Serialize;

use crate::pipeline::StageKind;

/// 流水线所处阶段
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelinePhase {
    Researching,
    Writing,
    Reviewing,
    FinalCompiling,
    Done,
}

impl PipelinePhase {
    /// 某个阶段运行时对应的状态
    pub fn for_stage(stage: StageKind) -> Self {
        match stage {
            StageKind::Researcher => Self::Researching,
            StageKind::Writer => Self::Writing,
            StageKind::Reviewer => Self::Reviewing,
            StageKind::FinalWriter => Self::FinalCompiling,
        }
    }

    /// 下一个状态；Done 为终态
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Researching => Some(Self::Writing),
            Self::Writing => Some(Self::Reviewing),
            Self::Reviewing => Some(Self::FinalCompiling),
            Self::FinalCompiling => Some(Self::Done),
            Self::Done => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == Self::Done
    }
}

impl std::fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Researching => "researching",
            Self::Writing => "writing",
            Self::Reviewing => "reviewing",
            Self::FinalCompiling => "final_compiling",
            Self::Done => "done",
        };
        f.write_str(s)
    }
}

/// 单次运行的状态跟踪：只允许沿 next() 前进
#[derive(Debug)]
pub struct PhaseTracker {
    current: PipelinePhase,
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self {
            current: PipelinePhase::Researching,
        }
    }
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> PipelinePhase {
        self.current
    }

    /// 进入下一状态；已在终态时返回 None
    pub fn advance(&mut self) -> Option<PipelinePhase> {
        let next = self.current.next()?;
        self.current = next;
        Some(next)
    }
}
