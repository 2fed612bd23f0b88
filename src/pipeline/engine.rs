//! 流水线引擎（Orchestrator）
//!
//! 按 Researching → Writing → Reviewing → FinalCompiling → Done 顺序执行四个阶段：
//! 每个阶段的输出写入 PipelineContext 后下一阶段才开始；空输出视为契约违反。
//! 图片由研究阶段直接交给最终产出，不经过后续阶段。

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use crate::config::{AppConfig, PipelineSection};
use crate::core::{PhaseTracker, PipelineError, PipelinePhase};
use crate::llm::{create_llm_client, LlmClient};
use crate::memory::PipelineContext;
use crate::pipeline::events::send_event;
use crate::pipeline::research::Researcher;
use crate::pipeline::stages::newsletter_stages;
use crate::pipeline::{NewsletterOutput, PipelineBuilder, PipelineEvent, StageKind};
use crate::tools::{
    HttpPageSource, HttpSerpTransport, ImageSearchClient, PageScraper, SearchClient, SerpTransport,
    ToolCapability, ToolContract, ToolExecutor,
};

/// 流水线编排器：持有 LLM、工具执行器与运行参数；每次 run 独立构建阶段与上下文
pub struct Orchestrator {
    llm: Arc<dyn LlmClient>,
    executor: ToolExecutor,
    settings: PipelineSection,
    event_tx: Option<UnboundedSender<PipelineEvent>>,
}

impl Orchestrator {
    pub fn new(llm: Arc<dyn LlmClient>, contract: ToolContract, settings: PipelineSection) -> Self {
        let executor = ToolExecutor::new(contract, settings.tool_timeout_secs);
        Self {
            llm,
            executor,
            settings,
            event_tx: None,
        }
    }

    /// 从配置构建：凭据缺失直接失败，不会在半配置状态下运行
    pub fn from_config(cfg: &AppConfig) -> Result<Self, PipelineError> {
        let credentials = cfg.credentials()?;
        let llm = create_llm_client(&cfg.llm, &credentials.llm_api_key)?;

        let transport: Arc<dyn SerpTransport> = Arc::new(HttpSerpTransport::new(
            cfg.search.base_url.clone(),
            credentials.search_api_key,
            cfg.search.timeout_secs,
        )?);
        let source = Arc::new(HttpPageSource::new(cfg.scrape.timeout_secs)?);
        let contract = ToolContract::new(cfg.search.time_filter.clone())
            .with(ToolCapability::Search(SearchClient::new(transport.clone())))
            .with(ToolCapability::ImageSearch(ImageSearchClient::new(transport)))
            .with(ToolCapability::Scrape(PageScraper::new(
                source,
                cfg.scrape.max_result_chars,
            )));

        Ok(Self::new(llm, contract, cfg.pipeline.clone()))
    }

    /// 设置事件推送通道
    pub fn with_event_tx(mut self, tx: UnboundedSender<PipelineEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// 为主题生成一期 Newsletter
    pub async fn run(&self, topic: &str) -> Result<NewsletterOutput, PipelineError> {
        let result = self.run_pipeline(topic).await;
        if let Err(e) = &result {
            tracing::error!(error = %e, kind = ?e.kind(), "pipeline failed");
            send_event(self.event_tx.as_ref(), PipelineEvent::Error { text: e.to_string() });
        }
        result
    }

    async fn run_pipeline(&self, topic: &str) -> Result<NewsletterOutput, PipelineError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(PipelineError::InvalidInput("topic must not be empty".to_string()));
        }
        let event_tx = self.event_tx.as_ref();

        let pipeline = PipelineBuilder::new(topic)
            .stages(newsletter_stages(topic, self.settings.max_stories, self.llm.clone()))
            .available_tools(self.executor.contract().kinds())
            .build()?;
        tracing::info!(id = %pipeline.id, topic = %topic, created_at = pipeline.created_at, "pipeline started");

        let (init_prompt, init_completion, _) = self.llm.token_usage();
        let mut tracker = PhaseTracker::new();
        let mut context = PipelineContext::new();
        let mut images = Vec::new();
        let mut failures = Vec::new();
        let mut story_count = 0;

        for stage in &pipeline.stages {
            let phase = PipelinePhase::for_stage(stage.kind);
            if tracker.current() != phase {
                return Err(PipelineError::InvalidPipeline(format!(
                    "{} cannot run in phase {}",
                    stage.kind,
                    tracker.current()
                )));
            }
            tracing::info!(id = %pipeline.id, phase = %phase, role = %stage.persona.role, "stage started");
            send_event(event_tx, PipelineEvent::PhaseChanged { phase });

            let output = match stage.kind {
                StageKind::Researcher => {
                    let outcome = Researcher {
                        stage,
                        executor: &self.executor,
                        settings: &self.settings,
                        event_tx,
                    }
                    .run(topic)
                    .await?;
                    story_count = outcome.stories.len();
                    images = outcome.images;
                    failures = outcome.failures;
                    outcome.output
                }
                _ => {
                    let upstream = context.render(stage.kind, &stage.read_set)?;
                    let brief = format!(
                        "Newsletter topic: {topic}\nScraped stories: {story_count}\n\n{upstream}"
                    );
                    stage.persona.run(stage.kind, &stage.task, &brief).await?
                }
            };

            let output = output.trim();
            if output.is_empty() {
                return Err(PipelineError::contract(stage.kind, "stage produced empty output"));
            }
            context.record(stage.kind, output)?;
            send_event(
                event_tx,
                PipelineEvent::StageCompleted {
                    stage: stage.kind,
                    chars: output.chars().count(),
                },
            );
            tracker.advance();
        }

        if !tracker.current().is_terminal() {
            return Err(PipelineError::InvalidPipeline(format!(
                "pipeline stopped in phase {}",
                tracker.current()
            )));
        }
        send_event(event_tx, PipelineEvent::PhaseChanged { phase: PipelinePhase::Done });

        let (prompt, completion, _) = self.llm.token_usage();
        let prompt_tokens = prompt.saturating_sub(init_prompt);
        let completion_tokens = completion.saturating_sub(init_completion);
        tracing::info!(prompt_tokens, completion_tokens, "token usage");
        send_event(
            event_tx,
            PipelineEvent::TokenUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            },
        );

        let final_text = context
            .get(StageKind::FinalWriter)
            .ok_or_else(|| PipelineError::contract(StageKind::FinalWriter, "no final output recorded"))?
            .to_string();
        let output = NewsletterOutput {
            topic: topic.to_string(),
            final_text,
            images,
            failures,
        };
        output.split_hook()?;

        tracing::info!(id = %pipeline.id, images = output.images.len(), failures = output.failures.len(), "pipeline done");
        send_event(event_tx, PipelineEvent::Done { images: output.images.len() });
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use crate::pipeline::stages::WRITER_ROLE;

    #[test]
    fn test_from_config_requires_both_credentials() {
        let mut cfg = AppConfig::default();
        cfg.llm.api_key = Some("sk-test".into());
        let err = Orchestrator::from_config(&cfg).err().unwrap();
        assert!(matches!(err, PipelineError::Config(ref m) if m.contains("search.api_key")));

        cfg.search.api_key = Some("serp-test".into());
        assert!(Orchestrator::from_config(&cfg).is_ok());
    }

    #[tokio::test]
    async fn test_blank_topic_rejected_before_any_call() {
        let mock = Arc::new(MockLlmClient::new());
        let orchestrator = Orchestrator::new(mock.clone(), ToolContract::new("qdr:w2"), PipelineSection::default());
        let err = orchestrator.run("   ").await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_tools_rejected_at_build() {
        let mock = Arc::new(MockLlmClient::new().with_reply(WRITER_ROLE, "draft"));
        let orchestrator = Orchestrator::new(mock.clone(), ToolContract::new("qdr:w2"), PipelineSection::default());
        let err = orchestrator.run("fusion").await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidPipeline(_)));
        assert!(mock.calls().is_empty());
    }
}
