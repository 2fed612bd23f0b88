//! 核心层：错误分类与流水线状态机

pub mod error;
pub mod state;

pub use error::{ErrorKind, PipelineError};
pub use state::{PhaseTracker, PipelinePhase};
