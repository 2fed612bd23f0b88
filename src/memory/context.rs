//! PipelineContext：阶段名 → 阶段输出，仅追加
//!
//! 记录顺序必须与阶段顺序一致，已写入的条目不可覆盖；
//! 后续阶段通过声明的读集合（read set）渲染自己可见的上下文。

use serde::Serialize;

use crate::core::PipelineError;
use crate::pipeline::StageKind;

#[derive(Clone, Debug, Serialize)]
pub struct ContextEntry {
    pub stage: StageKind,
    pub output: String,
}

/// 单次运行内累积的阶段输出
#[derive(Clone, Debug, Default, Serialize)]
pub struct PipelineContext {
    entries: Vec<ContextEntry>,
}

impl PipelineContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一个阶段的输出；重复写入或逆序写入都会被拒绝
    pub fn record(&mut self, stage: StageKind, output: impl Into<String>) -> Result<(), PipelineError> {
        if let Some(last) = self.entries.last() {
            if stage.ordinal() <= last.stage.ordinal() {
                return Err(PipelineError::InvalidPipeline(format!(
                    "cannot record {stage} after {}",
                    last.stage
                )));
            }
        }
        self.entries.push(ContextEntry {
            stage,
            output: output.into(),
        });
        Ok(())
    }

    pub fn get(&self, stage: StageKind) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.stage == stage)
            .map(|e| e.output.as_str())
    }

    pub fn entries(&self) -> &[ContextEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 按读集合拼出供某阶段使用的上下文块；读集合中的阶段必须已有输出
    pub fn render(&self, reader: StageKind, read_set: &[StageKind]) -> Result<String, PipelineError> {
        let mut sections = Vec::with_capacity(read_set.len());
        for &stage in read_set {
            if stage.ordinal() >= reader.ordinal() {
                return Err(PipelineError::InvalidPipeline(format!(
                    "{reader} cannot read output of {stage}"
                )));
            }
            let output = self.get(stage).ok_or_else(|| {
                PipelineError::contract(stage, format!("output required by {reader} is missing"))
            })?;
            sections.push(format!("## {} output\n\n{}", stage.title(), output.trim()));
        }
        Ok(sections.join("\n\n"))
    }
}
