//! 流水线构建器
//!
//! 逐个添加阶段，build 时一次性校验：四个阶段按固定顺序各出现一次、
//! 读集合只引用更早的阶段、只有 Researcher 绑定工具且所绑定的工具都已注册。

use std::collections::BTreeSet;

use crate::core::PipelineError;
use crate::pipeline::{PipelineStage, StageKind};
use crate::tools::ToolKind;

/// 校验通过的流水线定义
#[derive(Debug)]
pub struct Pipeline {
    /// 运行标识（用于日志关联）
    pub id: String,
    pub topic: String,
    pub stages: Vec<PipelineStage>,
    pub created_at: i64,
}

/// 流水线构建器
pub struct PipelineBuilder {
    topic: String,
    stages: Vec<PipelineStage>,
    available_tools: BTreeSet<ToolKind>,
}

impl PipelineBuilder {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            stages: Vec::new(),
            available_tools: BTreeSet::new(),
        }
    }

    /// 添加阶段（按执行顺序）
    pub fn stage(mut self, stage: PipelineStage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn stages(mut self, stages: impl IntoIterator<Item = PipelineStage>) -> Self {
        self.stages.extend(stages);
        self
    }

    /// 工具契约中已注册的能力
    pub fn available_tools(mut self, tools: BTreeSet<ToolKind>) -> Self {
        self.available_tools = tools;
        self
    }

    /// 构建流水线
    pub fn build(self) -> Result<Pipeline, PipelineError> {
        if self.topic.trim().is_empty() {
            return Err(PipelineError::InvalidInput("topic must not be empty".to_string()));
        }

        let kinds: Vec<StageKind> = self.stages.iter().map(|s| s.kind).collect();
        if kinds != StageKind::ALL {
            return Err(PipelineError::InvalidPipeline(format!(
                "expected stages {:?}, got {:?}",
                StageKind::ALL,
                kinds
            )));
        }

        for stage in &self.stages {
            for &read in &stage.read_set {
                if read.ordinal() >= stage.kind.ordinal() {
                    return Err(PipelineError::InvalidPipeline(format!(
                        "{} cannot read output of {}",
                        stage.kind, read
                    )));
                }
            }
            if stage.kind != StageKind::Researcher && !stage.task.bound_tools.is_empty() {
                return Err(PipelineError::InvalidPipeline(format!(
                    "only the researcher may bind tools, {} binds {:?}",
                    stage.kind, stage.task.bound_tools
                )));
            }
            if let Some(missing) = stage
                .task
                .bound_tools
                .iter()
                .find(|k| !self.available_tools.contains(k))
            {
                return Err(PipelineError::InvalidPipeline(format!(
                    "{} binds {} which is not registered",
                    stage.kind, missing
                )));
            }
        }

        let researcher = &self.stages[0];
        for required in [ToolKind::Search, ToolKind::Scrape] {
            if !researcher.task.bound_tools.contains(&required) {
                return Err(PipelineError::InvalidPipeline(format!(
                    "researcher must bind {required}"
                )));
            }
        }

        Ok(Pipeline {
            id: format!("nl_{}", uuid::Uuid::new_v4()),
            topic: self.topic.trim().to_string(),
            stages: self.stages,
            created_at: chrono::Utc::now().timestamp_millis(),
        })
    }
}
