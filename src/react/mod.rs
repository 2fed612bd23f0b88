//! 推理层：Tool Call 解析与 Researcher 的工具循环

pub mod loop_;
pub mod planner;

pub use loop_::{ToolLoop, ToolLoopResult};
pub use planner::{parse_llm_output, PlannerOutput, ToolCall};
