//! 记忆层：LLM 消息与单次运行内的阶段上下文

pub mod context;
pub mod conversation;

pub use context::{ContextEntry, PipelineContext};
pub use conversation::{last_content, Message, Role};
