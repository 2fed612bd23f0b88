//! Researching 阶段
//!
//! 1. 以主题为查询，网页检索与图片检索并发执行（tokio::join!）
//! 2. 从检索摘要中取候选 URL（≤ max_stories），有界并发抓取，保持输入顺序
//! 3. 图片按顺序挂到抓取成功的故事上
//! 4. Researcher 人设消化资料包，可再调用至多 max_tool_rounds 次工具
//! 5. 输出 = 研究笔记 + Sources 块（每个故事的 URL、图片、摘录）
//!
//! 单个工具失败记录为 ToolFailure 并继续；只有在既没有故事也没有检索摘要时阶段才失败。

use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::mpsc::UnboundedSender;

use crate::agent::task_prompt;
use crate::config::PipelineSection;
use crate::core::PipelineError;
use crate::pipeline::events::{preview, send_event};
use crate::pipeline::{PipelineEvent, PipelineStage, StageKind};
use crate::react::ToolLoop;
use crate::tools::{candidate_urls, ImageRef, ToolExecutor, ToolKind, ToolOutput};

/// 一次失败的工具调用（不终止阶段）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolFailure {
    pub tool: String,
    /// 失败的目标（如抓取的 URL）
    pub target: Option<String>,
    pub reason: String,
}

/// 抓取成功的故事
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Story {
    pub url: String,
    pub excerpt: String,
    pub image: Option<ImageRef>,
}

/// Researching 阶段的产出
#[derive(Debug, Clone)]
pub struct ResearchOutcome {
    /// 写入 PipelineContext 的文本
    pub output: String,
    pub stories: Vec<Story>,
    /// 收集到的图片地址（去重，最多 max_stories 个）
    pub images: Vec<String>,
    pub failures: Vec<ToolFailure>,
}

/// Researcher 阶段执行器
pub struct Researcher<'a> {
    pub stage: &'a PipelineStage,
    pub executor: &'a ToolExecutor,
    pub settings: &'a PipelineSection,
    pub event_tx: Option<&'a UnboundedSender<PipelineEvent>>,
}

impl<'a> Researcher<'a> {
    pub async fn run(&self, topic: &str) -> Result<ResearchOutcome, PipelineError> {
        let bound = &self.stage.task.bound_tools;
        let mut failures = Vec::new();
        let seed = json!({ "q": topic });

        let (search, images) = tokio::join!(self.call(ToolKind::Search, seed.clone()), async {
            if bound.contains(&ToolKind::ImageSearch) {
                Some(self.call(ToolKind::ImageSearch, seed.clone()).await)
            } else {
                None
            }
        });

        let mut search_error = None;
        let summary = match search {
            Ok(ToolOutput::Search(r)) => r.summary,
            Ok(_) => String::new(),
            Err(e) => {
                record_failure(&mut failures, ToolKind::Search, None, &e)?;
                search_error = Some(e);
                String::new()
            }
        };
        let seed_images: Vec<ImageRef> = match images {
            Some(Ok(ToolOutput::Images(r))) => r
                .images
                .into_iter()
                .filter(|i| i.thumbnail_url.is_some())
                .collect(),
            Some(Err(e)) => {
                record_failure(&mut failures, ToolKind::ImageSearch, None, &e)?;
                Vec::new()
            }
            _ => Vec::new(),
        };

        let urls = candidate_urls(&summary, self.settings.max_stories);
        tracing::info!(topic = %topic, candidates = urls.len(), images = seed_images.len(), "research seed complete");

        let scraped: Vec<(String, Result<ToolOutput, PipelineError>)> = stream::iter(urls)
            .map(|url| async move {
                let result = self.call(ToolKind::Scrape, json!({ "website_url": url.clone() })).await;
                (url, result)
            })
            .buffered(self.settings.scrape_concurrency.max(1))
            .collect()
            .await;

        let mut stories = Vec::new();
        for (url, result) in scraped {
            match result {
                Ok(ToolOutput::Page(page)) => stories.push(Story {
                    url: page.url,
                    excerpt: excerpt(&page.text, self.settings.excerpt_chars),
                    image: None,
                }),
                Ok(_) => {}
                Err(e) => record_failure(&mut failures, ToolKind::Scrape, Some(url), &e)?,
            }
        }
        for (story, image) in stories.iter_mut().zip(seed_images) {
            story.image = Some(image);
        }

        if stories.is_empty() && summary.trim().is_empty() {
            return Err(search_error.unwrap_or_else(|| {
                PipelineError::contract(StageKind::Researcher, format!("no material found for topic {topic:?}"))
            }));
        }
        if stories.is_empty() {
            tracing::warn!(topic = %topic, "no page could be scraped, continuing with search summary only");
        }

        let dossier = render_dossier(topic, &summary, &stories);
        let system = format!(
            "{}\n\nYou have access to the following tools:\n{}\n\n\
             To call a tool, reply with only a JSON object: {{\"tool\": \"<name>\", \"args\": {{...}}}}.\n\
             When you have enough material, reply with your final research notes as plain text, without JSON.",
            self.stage.persona.system_prompt(),
            self.executor.contract().to_schema_json(),
        );
        let tool_loop = ToolLoop {
            stage: StageKind::Researcher,
            persona: &self.stage.persona,
            executor: self.executor,
            allowed: bound,
            max_rounds: self.settings.max_tool_rounds,
            event_tx: self.event_tx,
        };
        let looped = tool_loop.run(&system, &task_prompt(&self.stage.task, &dossier)).await?;
        failures.extend(looped.failures);

        let mut images: Vec<String> = stories
            .iter()
            .filter_map(|s| s.image.as_ref().and_then(|i| i.thumbnail_url.clone()))
            .collect();
        for out in &looped.outputs {
            if let ToolOutput::Images(r) = out {
                images.extend(r.thumbnail_urls());
            }
        }
        let images = dedup_capped(images, self.settings.max_stories);

        let output = render_output(&looped.response, &summary, &stories);
        tracing::info!(
            stories = stories.len(),
            images = images.len(),
            failures = failures.len(),
            tool_rounds = looped.rounds,
            "research complete"
        );
        Ok(ResearchOutcome {
            output,
            stories,
            images,
            failures,
        })
    }

    /// 经执行器调用工具并推送事件
    async fn call(&self, kind: ToolKind, args: Value) -> Result<ToolOutput, PipelineError> {
        send_event(
            self.event_tx,
            PipelineEvent::ToolCall {
                tool: kind.name().to_string(),
                args: args.clone(),
            },
        );
        let result = self.executor.invoke(kind, args).await;
        match &result {
            Ok(out) => send_event(
                self.event_tx,
                PipelineEvent::Observation {
                    tool: kind.name().to_string(),
                    preview: preview(&out.observation()),
                },
            ),
            Err(e) => send_event(
                self.event_tx,
                PipelineEvent::ToolFailure {
                    tool: kind.name().to_string(),
                    reason: e.to_string(),
                },
            ),
        }
        result
    }
}

/// 可降级的错误记入 failures；其它错误原样返回
fn record_failure(
    failures: &mut Vec<ToolFailure>,
    kind: ToolKind,
    target: Option<String>,
    err: &PipelineError,
) -> Result<(), PipelineError> {
    if !err.is_recoverable_tool_error() {
        return Err(err.clone());
    }
    tracing::warn!(tool = %kind, target = target.as_deref().unwrap_or("-"), error = %err, "tool failure recorded");
    failures.push(ToolFailure {
        tool: kind.name().to_string(),
        target,
        reason: err.to_string(),
    });
    Ok(())
}

fn excerpt(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() > max_chars {
        text.chars().take(max_chars).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

fn dedup_capped(urls: Vec<String>, cap: usize) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for url in urls {
        if out.len() >= cap {
            break;
        }
        if !out.contains(&url) {
            out.push(url);
        }
    }
    out
}

fn render_sources(summary: &str, stories: &[Story]) -> String {
    let mut out = String::from("## Sources\n\n");
    if stories.is_empty() {
        out.push_str("No page could be scraped. Search summary:\n\n");
        out.push_str(summary.trim());
        return out;
    }
    let blocks: Vec<String> = stories
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let image = s
                .image
                .as_ref()
                .and_then(|img| img.thumbnail_url.as_deref())
                .unwrap_or("(none)");
            let excerpt = if s.excerpt.is_empty() { "(no text extracted)" } else { s.excerpt.as_str() };
            format!("### Story {}\nURL: {}\nImage: {}\nExcerpt:\n{}", i + 1, s.url, image, excerpt)
        })
        .collect();
    out.push_str(&blocks.join("\n\n"));
    out
}

/// 交给 Researcher 人设的资料包
fn render_dossier(topic: &str, summary: &str, stories: &[Story]) -> String {
    let shown = if summary.trim().is_empty() { "(no notable results)" } else { summary.trim() };
    let mut dossier = format!("Topic: {topic}\n\n## Search results\n\n{shown}");
    if !stories.is_empty() {
        dossier.push_str("\n\n");
        dossier.push_str(&render_sources(summary, stories));
    }
    dossier
}

/// 写入上下文的阶段输出
fn render_output(notes: &str, summary: &str, stories: &[Story]) -> String {
    let sources = render_sources(summary, stories);
    if notes.trim().is_empty() {
        sources
    } else {
        format!("{}\n\n{}", notes.trim(), sources)
    }
}
