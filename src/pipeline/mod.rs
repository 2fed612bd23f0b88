//! Newsletter 流水线：阶段定义、构建校验、研究阶段、编排引擎与最终产出

pub mod builder;
pub mod engine;
pub mod events;
pub mod newsletter;
pub mod research;
pub mod stages;
pub mod types;

pub use builder::{Pipeline, PipelineBuilder};
pub use engine::Orchestrator;
pub use events::PipelineEvent;
pub use newsletter::NewsletterOutput;
pub use research::{ResearchOutcome, Story, ToolFailure};
pub use types::{PipelineStage, StageKind, StageTask};
