//! 最终产出：Newsletter 文本 + 图片列表
//!
//! 首行是吸引读者的 hook，其余为正文；导出为 Markdown 时依次写入标题、hook、正文与图片。

use serde::Serialize;

use crate::core::PipelineError;
use crate::pipeline::research::ToolFailure;
use crate::pipeline::StageKind;

#[derive(Debug, Clone, Serialize)]
pub struct NewsletterOutput {
    pub topic: String,
    pub final_text: String,
    /// 研究阶段收集的图片地址（按故事顺序）
    pub images: Vec<String>,
    /// 研究阶段内被降级处理的工具失败
    pub failures: Vec<ToolFailure>,
}

impl NewsletterOutput {
    /// 拆出 hook（第一条非空行）与其余正文；文本为空时返回 StageContractViolation
    pub fn split_hook(&self) -> Result<(String, String), PipelineError> {
        let mut lines = self.final_text.lines();
        let hook = lines
            .by_ref()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .ok_or_else(|| PipelineError::contract(StageKind::FinalWriter, "final text is empty"))?;
        let rest = lines.collect::<Vec<_>>().join("\n");
        Ok((hook.to_string(), rest.trim().to_string()))
    }

    pub fn to_markdown(&self) -> Result<String, PipelineError> {
        let (hook, body) = self.split_hook()?;
        let mut md = format!("# {}\n\n{}\n", self.topic.trim(), hook);
        if !body.is_empty() {
            md.push('\n');
            md.push_str(&body);
            md.push('\n');
        }
        if !self.images.is_empty() {
            md.push_str("\n## Images\n\n");
            for url in &self.images {
                md.push_str(&format!("![]({})\n", url));
            }
        }
        Ok(md)
    }
}
