//! Mock LLM 客户端（用于测试，无需 API）
//!
//! 按 system 消息中的 `You are {role}.` 匹配预置回复；同一角色可排队多条回复（最后一条重复使用）。
//! 未匹配时回显最后一条 User 消息，便于本地跑通整条流水线。所有请求都会被记录。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::LlmClient;
use crate::memory::{last_content, Message, Role};

enum Script {
    Replies(VecDeque<String>),
    Failure(String),
}

fn role_marker(role: &str) -> String {
    format!("You are {role}.")
}

/// Mock 客户端：角色脚本 + 回显兜底
#[derive(Default)]
pub struct MockLlmClient {
    scripts: Mutex<Vec<(String, Script)>>,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// system 消息声明该角色时返回 `reply`；多次调用同一角色会按顺序排队
    pub fn with_reply(self, role: &str, reply: impl Into<String>) -> Self {
        {
            let mut scripts = self.scripts.lock().unwrap_or_else(|e| e.into_inner());
            match scripts.iter_mut().find(|(r, _)| r == role) {
                Some((_, Script::Replies(queue))) => queue.push_back(reply.into()),
                Some((_, script)) => *script = Script::Replies(VecDeque::from([reply.into()])),
                None => scripts.push((
                    role.to_string(),
                    Script::Replies(VecDeque::from([reply.into()])),
                )),
            }
        }
        self
    }

    /// system 消息声明该角色时返回错误
    pub fn with_failure(self, role: &str, error: impl Into<String>) -> Self {
        {
            let mut scripts = self.scripts.lock().unwrap_or_else(|e| e.into_inner());
            scripts.retain(|(r, _)| r != role);
            scripts.push((role.to_string(), Script::Failure(error.into())));
        }
        self
    }

    /// 已记录的全部请求（按调用顺序）
    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// system 消息声明该角色的请求
    pub fn calls_for(&self, role: &str) -> Vec<Vec<Message>> {
        self.calls()
            .into_iter()
            .filter(|msgs| {
                last_content(msgs, Role::System).is_some_and(|s| s.contains(&role_marker(role)))
            })
            .collect()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(messages.to_vec());

        let system = last_content(messages, Role::System).unwrap_or("");
        {
            let mut scripts = self.scripts.lock().unwrap_or_else(|e| e.into_inner());
            if let Some((_, script)) = scripts
                .iter_mut()
                .find(|(role, _)| system.contains(&role_marker(role)))
            {
                return match script {
                    Script::Failure(e) => Err(e.clone()),
                    Script::Replies(queue) if queue.len() > 1 => {
                        Ok(queue.pop_front().unwrap_or_default())
                    }
                    Script::Replies(queue) => Ok(queue.front().cloned().unwrap_or_default()),
                };
            }
        }

        let last_user = last_content(messages, Role::User).unwrap_or("(no input)");
        Ok(format!("Echo from Mock: {}", last_user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replies_are_matched_by_role_and_queued() {
        let llm = MockLlmClient::new()
            .with_reply("Content Writer", "first")
            .with_reply("Content Writer", "second");
        let msgs = vec![
            Message::system("You are Content Writer."),
            Message::user("go"),
        ];
        assert_eq!(llm.complete(&msgs).await.unwrap(), "first");
        assert_eq!(llm.complete(&msgs).await.unwrap(), "second");
        assert_eq!(llm.complete(&msgs).await.unwrap(), "second");
        assert_eq!(llm.calls_for("Content Writer").len(), 3);
    }

    #[tokio::test]
    async fn test_unscripted_roles_echo_last_user_message() {
        let llm = MockLlmClient::new().with_failure("Content Reviewer", "boom");
        let out = llm
            .complete(&[Message::system("You are Someone."), Message::user("hello")])
            .await
            .unwrap();
        assert_eq!(out, "Echo from Mock: hello");

        let err = llm
            .complete(&[Message::system("You are Content Reviewer."), Message::user("x")])
            .await
            .unwrap_err();
        assert_eq!(err, "boom");
    }
}
