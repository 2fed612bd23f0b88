//! Researcher 的工具循环
//!
//! Plan -> Act (Tool) -> Observe -> 下一轮 Plan；工具调用次数受 max_rounds 限制。
//! 工具失败写回为观察结果，不终止循环；次数用尽后要求模型直接给出最终文本。
//! 可选 event_tx：推送 ToolCall / Observation / ToolFailure。

use std::collections::BTreeSet;

use tokio::sync::mpsc::UnboundedSender;

use crate::agent::AgentPersona;
use crate::core::PipelineError;
use crate::memory::Message;
use crate::pipeline::events::{preview, send_event};
use crate::pipeline::research::ToolFailure;
use crate::pipeline::{PipelineEvent, StageKind};
use crate::react::{parse_llm_output, PlannerOutput};
use crate::tools::{ToolExecutor, ToolKind, ToolOutput};

const BUDGET_EXHAUSTED_PROMPT: &str =
    "You have used all available tool calls. Do not call any more tools. Write your final answer now as plain text.";

/// 工具循环配置
pub struct ToolLoop<'a> {
    pub stage: StageKind,
    pub persona: &'a AgentPersona,
    pub executor: &'a ToolExecutor,
    /// 本阶段绑定的工具；其它工具名视为不可用
    pub allowed: &'a BTreeSet<ToolKind>,
    pub max_rounds: usize,
    pub event_tx: Option<&'a UnboundedSender<PipelineEvent>>,
}

/// 循环结果：最终文本、成功的工具输出与失败记录
#[derive(Debug, Default)]
pub struct ToolLoopResult {
    pub response: String,
    pub outputs: Vec<ToolOutput>,
    pub failures: Vec<ToolFailure>,
    pub rounds: usize,
}

impl<'a> ToolLoop<'a> {
    /// 执行循环：system 为人设 + 工具说明，user_input 为任务与资料
    pub async fn run(&self, system: &str, user_input: &str) -> Result<ToolLoopResult, PipelineError> {
        let mut messages = vec![Message::user(user_input.to_string())];
        let mut result = ToolLoopResult::default();
        let mut budget_notice_sent = false;

        loop {
            let output = self.persona.respond(self.stage, system, &messages).await?;

            let call = match parse_llm_output(&output) {
                PlannerOutput::Response(resp) => {
                    result.response = resp;
                    return Ok(result);
                }
                PlannerOutput::ToolCall(call) => call,
            };

            if result.rounds >= self.max_rounds {
                if budget_notice_sent {
                    tracing::warn!(stage = %self.stage, "model kept requesting tools after budget was exhausted");
                    return Ok(result);
                }
                budget_notice_sent = true;
                messages.push(Message::assistant(output));
                messages.push(Message::user(BUDGET_EXHAUSTED_PROMPT));
                continue;
            }

            result.rounds += 1;
            send_event(
                self.event_tx,
                PipelineEvent::ToolCall {
                    tool: call.tool.clone(),
                    args: call.args.clone(),
                },
            );

            let invoked = match ToolKind::from_name(&call.tool).filter(|k| self.allowed.contains(k)) {
                Some(kind) => self.executor.invoke(kind, call.args.clone()).await,
                None => Err(PipelineError::schema(&call.tool, "tool not available")),
            };
            let observation = match invoked {
                Ok(out) => {
                    let obs = out.observation();
                    result.outputs.push(out);
                    obs
                }
                Err(e) if e.is_recoverable_tool_error() => {
                    tracing::warn!(tool = %call.tool, error = %e, "tool call failed");
                    send_event(
                        self.event_tx,
                        PipelineEvent::ToolFailure {
                            tool: call.tool.clone(),
                            reason: e.to_string(),
                        },
                    );
                    result.failures.push(ToolFailure {
                        tool: call.tool.clone(),
                        target: None,
                        reason: e.to_string(),
                    });
                    format!("Error: {}", e)
                }
                Err(e) => return Err(e),
            };
            send_event(
                self.event_tx,
                PipelineEvent::Observation {
                    tool: call.tool.clone(),
                    preview: preview(&observation),
                },
            );

            // 将工具调用与结果写回对话，供下一轮 Plan 使用
            let left = self.max_rounds - result.rounds;
            messages.push(Message::assistant(format!(
                "Tool call: {} | Args: {}",
                call.tool, call.args
            )));
            messages.push(Message::user(format!(
                "Observation from {}: {}\n\n({} tool calls left)",
                call.tool, observation, left
            )));
        }
    }
}
