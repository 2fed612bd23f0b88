//! Agent 人设与阶段执行
//!
//! AgentPersona 持有角色、目标、背景与共享的 LLM 句柄；
//! run 把 (任务, 上下文) 拼成一轮对话交给 LLM，respond 供 Researcher 的工具循环多轮调用。
//! LLM 的错误统一映射为所在阶段的 Generation 错误。

use std::sync::Arc;

use crate::core::PipelineError;
use crate::llm::LlmClient;
use crate::memory::Message;
use crate::pipeline::{StageKind, StageTask};

/// 单次运行内的 Agent 人设；不允许委派
#[derive(Clone)]
pub struct AgentPersona {
    pub role: String,
    pub objective: String,
    pub backstory: String,
    pub delegation_allowed: bool,
    llm: Arc<dyn LlmClient>,
}

impl std::fmt::Debug for AgentPersona {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentPersona")
            .field("role", &self.role)
            .field("delegation_allowed", &self.delegation_allowed)
            .finish_non_exhaustive()
    }
}

impl AgentPersona {
    pub fn new(
        role: impl Into<String>,
        objective: impl Into<String>,
        backstory: impl Into<String>,
        llm: Arc<dyn LlmClient>,
    ) -> Self {
        Self {
            role: role.into(),
            objective: objective.into(),
            backstory: backstory.into(),
            delegation_allowed: false,
            llm,
        }
    }

    /// system prompt 以 `You are {role}.` 开头
    pub fn system_prompt(&self) -> String {
        format!(
            "You are {}.\nGoal: {}\nBackstory: {}\nYou work alone and never delegate work to anyone else.",
            self.role, self.objective, self.backstory
        )
    }

    /// 单轮执行：system = 人设，user = 任务 + 上下文
    pub async fn run(
        &self,
        stage: StageKind,
        task: &StageTask,
        context: &str,
    ) -> Result<String, PipelineError> {
        let messages = vec![Message::user(task_prompt(task, context))];
        self.respond(stage, &self.system_prompt(), &messages).await
    }

    /// 以给定 system prompt 与对话历史调用 LLM
    pub async fn respond(
        &self,
        stage: StageKind,
        system: &str,
        messages: &[Message],
    ) -> Result<String, PipelineError> {
        let mut full = Vec::with_capacity(messages.len() + 1);
        full.push(Message::system(system.to_string()));
        full.extend_from_slice(messages);
        tracing::debug!(stage = %stage, role = %self.role, messages = full.len(), "llm request");
        self.llm
            .complete(&full)
            .await
            .map_err(|message| PipelineError::Generation { stage, message })
    }
}

/// 任务文本：描述、期望输出与可见的上游上下文
pub fn task_prompt(task: &StageTask, context: &str) -> String {
    let mut prompt = format!(
        "Current Task: {}\n\nThis is the expected criteria for your final answer: {}",
        task.description.trim(),
        task.expected_output.trim()
    );
    if !context.trim().is_empty() {
        prompt.push_str("\n\nThis is the context you're working with:\n\n");
        prompt.push_str(context.trim());
    }
    prompt.push_str("\n\nBegin! Respond with your final answer only.");
    prompt
}
