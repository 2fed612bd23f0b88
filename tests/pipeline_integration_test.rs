//! 流水线集成测试：检索传输、页面来源与 LLM 全部使用进程内替身

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use newsdesk::config::PipelineSection;
use newsdesk::core::{PipelineError, PipelinePhase};
use newsdesk::llm::MockLlmClient;
use newsdesk::memory::{last_content, Role};
use newsdesk::pipeline::stages::{FINAL_WRITER_ROLE, RESEARCHER_ROLE, REVIEWER_ROLE, WRITER_ROLE};
use newsdesk::pipeline::{Orchestrator, PipelineEvent, StageKind};
use newsdesk::tools::{
    Engine, ImageSearchClient, PageScraper, PageSource, Query, SearchClient, SerpTransport,
    ToolCapability, ToolContract,
};

const URL_A: &str = "https://news.example/a";
const URL_B: &str = "https://news.example/b";
const IMAGE: &str = "https://img.example/1.jpg";

struct StubSerp {
    fail_search: bool,
    fail_images: bool,
    /// 追加到网页检索结果末尾的链接
    extra_link: Option<&'static str>,
    calls: AtomicUsize,
}

impl StubSerp {
    fn new() -> Self {
        Self {
            fail_search: false,
            fail_images: false,
            extra_link: None,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SerpTransport for StubSerp {
    async fn fetch(&self, engine: Engine, query: &Query) -> Result<Value, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(query.time_filter(), "qdr:w2");
        match engine {
            Engine::Google if self.fail_search => Err(PipelineError::ExternalService {
                service: "serpapi".into(),
                status: Some(503),
                message: "unavailable".into(),
            }),
            Engine::Google => {
                let mut results = vec![
                    json!({"title": "Reactor hits record", "link": URL_A, "source": "Wire", "snippet": "Record plasma."}),
                    json!({"title": "Startup raises funds", "link": URL_B, "source": "Daily"}),
                ];
                if let Some(link) = self.extra_link {
                    results.push(json!({"title": "Broken link", "link": link}));
                }
                Ok(json!({ "organic_results": results }))
            }
            Engine::GoogleImages if self.fail_images => Err(PipelineError::ExternalService {
                service: "serpapi".into(),
                status: Some(500),
                message: "image backend down".into(),
            }),
            Engine::GoogleImages => Ok(json!({
                "images_results": [
                    {"title": "Reactor", "source": "Wire", "link": URL_A, "thumbnail": IMAGE}
                ]
            })),
        }
    }
}

/// 固定正文；failing 中的 URL 返回 503
struct StubPages {
    failing: Vec<&'static str>,
}

#[async_trait]
impl PageSource for StubPages {
    async fn fetch(&self, url: &str) -> Result<String, PipelineError> {
        if self.failing.iter().any(|f| *f == url) {
            return Err(PipelineError::ExternalService {
                service: "scraper".into(),
                status: Some(503),
                message: format!("HTTP 503 for {url}"),
            });
        }
        Ok(format!("<html><body><p>Full article text from {url}.</p></body></html>"))
    }
}

const FINAL_TEXT: &str = "Fusion had a record-breaking fortnight!\n\n## Contents\n- Reactor hits record\n- Startup raises funds\n\n## Reactor hits record\n![](https://img.example/1.jpg)\n- detail\n\n## Conclusion\nMore to come.";

fn scripted_llm() -> MockLlmClient {
    scripted_llm_with_final(FINAL_TEXT)
}

fn scripted_llm_with_final(final_text: &str) -> MockLlmClient {
    MockLlmClient::new()
        .with_reply(RESEARCHER_ROLE, "Two strong stories this fortnight.")
        .with_reply(WRITER_ROLE, "Summary A (https://news.example/a)\nSummary B (https://news.example/b)")
        .with_reply(REVIEWER_ROLE, "REVIEWER-SENTINEL-42 approved summaries")
        .with_reply(FINAL_WRITER_ROLE, final_text)
}

fn contract(serp: Arc<StubSerp>, pages: StubPages) -> ToolContract {
    ToolContract::new("qdr:w2")
        .with(ToolCapability::Search(SearchClient::new(serp.clone())))
        .with(ToolCapability::ImageSearch(ImageSearchClient::new(serp)))
        .with(ToolCapability::Scrape(PageScraper::new(Arc::new(pages), 4000)))
}

fn orchestrator(llm: Arc<MockLlmClient>, serp: Arc<StubSerp>, pages: StubPages) -> Orchestrator {
    Orchestrator::new(llm, contract(serp, pages), PipelineSection::default())
}

fn drain(rx: &mut tokio::sync::mpsc::UnboundedReceiver<PipelineEvent>) -> Vec<PipelineEvent> {
    let mut events = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        events.push(ev);
    }
    events
}

#[tokio::test]
async fn test_end_to_end_with_two_stories_and_one_image() {
    let llm = Arc::new(scripted_llm());
    let serp = Arc::new(StubSerp::new());
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let orchestrator = orchestrator(llm.clone(), serp.clone(), StubPages { failing: vec![] }).with_event_tx(tx);

    let output = orchestrator.run("fusion energy").await.expect("pipeline should succeed");

    assert_eq!(output.topic, "fusion energy");
    assert_eq!(output.images, vec![IMAGE.to_string()]);
    assert!(output.failures.is_empty());
    assert_eq!(serp.calls.load(Ordering::SeqCst), 2);

    // Writer 看到的研究输出引用了两个 URL 与图片
    let writer_calls = llm.calls_for(WRITER_ROLE);
    assert_eq!(writer_calls.len(), 1);
    let writer_input = last_content(&writer_calls[0], Role::User).unwrap();
    assert!(writer_input.contains(&format!("URL: {URL_A}")));
    assert!(writer_input.contains(&format!("URL: {URL_B}")));
    assert!(writer_input.contains(&format!("Image: {IMAGE}")));
    assert!(writer_input.contains("Two strong stories this fortnight."));
    assert!(writer_input.contains("Scraped stories: 2"));

    // 目录部分恰好列出两条
    let (hook, body) = output.split_hook().unwrap();
    assert_eq!(hook, "Fusion had a record-breaking fortnight!");
    let contents: Vec<&str> = body
        .split("## Contents")
        .nth(1)
        .unwrap()
        .split("\n\n")
        .next()
        .unwrap()
        .lines()
        .filter(|l| l.starts_with("- "))
        .collect();
    assert_eq!(contents.len(), 2);

    let events = drain(&mut rx);
    let phases: Vec<PipelinePhase> = events
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::PhaseChanged { phase } => Some(*phase),
            _ => None,
        })
        .collect();
    assert_eq!(
        phases,
        vec![
            PipelinePhase::Researching,
            PipelinePhase::Writing,
            PipelinePhase::Reviewing,
            PipelinePhase::FinalCompiling,
            PipelinePhase::Done,
        ]
    );
    assert!(matches!(events.last(), Some(PipelineEvent::Done { images: 1 })));
}

#[tokio::test]
async fn test_reviewer_output_reaches_final_writer() {
    let llm = Arc::new(scripted_llm());
    let orchestrator = orchestrator(llm.clone(), Arc::new(StubSerp::new()), StubPages { failing: vec![] });
    orchestrator.run("fusion").await.unwrap();

    let final_calls = llm.calls_for(FINAL_WRITER_ROLE);
    assert_eq!(final_calls.len(), 1);
    let input = last_content(&final_calls[0], Role::User).unwrap();
    assert!(input.contains("REVIEWER-SENTINEL-42"));
    assert!(input.contains("## Reviewer output"));
    // FinalWriter 只读取 Reviewer 的输出
    assert!(!input.contains("## Writer output"));
}

#[tokio::test]
async fn test_one_failed_scrape_degrades_to_one_story() {
    let llm = Arc::new(scripted_llm());
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let orchestrator = orchestrator(
        llm.clone(),
        Arc::new(StubSerp::new()),
        StubPages { failing: vec![URL_B] },
    )
    .with_event_tx(tx);

    let output = orchestrator.run("fusion").await.unwrap();
    assert_eq!(output.failures.len(), 1);
    assert_eq!(output.failures[0].tool, "website_scraper");
    assert_eq!(output.failures[0].target.as_deref(), Some(URL_B));
    assert_eq!(output.images, vec![IMAGE.to_string()]);

    let writer_input = llm.calls_for(WRITER_ROLE);
    let writer_input = last_content(&writer_input[0], Role::User).unwrap();
    assert!(writer_input.contains("### Story 1"));
    assert!(!writer_input.contains("### Story 2"));
    assert!(writer_input.contains("Scraped stories: 1"));

    let events = drain(&mut rx);
    assert!(events.iter().any(|e| matches!(e, PipelineEvent::ToolFailure { tool, .. } if tool == "website_scraper")));
    assert!(events.iter().any(|e| matches!(e, PipelineEvent::PhaseChanged { phase: PipelinePhase::Done })));
}

#[tokio::test]
async fn test_empty_final_output_is_contract_violation() {
    let llm = Arc::new(scripted_llm_with_final("  \n "));
    let orchestrator = orchestrator(llm, Arc::new(StubSerp::new()), StubPages { failing: vec![] });
    let err = orchestrator.run("fusion").await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::StageContractViolation { stage: StageKind::FinalWriter, .. }
    ));
}

#[tokio::test]
async fn test_search_failure_without_material_fails_research() {
    let llm = Arc::new(scripted_llm());
    let serp = Arc::new(StubSerp {
        fail_search: true,
        ..StubSerp::new()
    });
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let orchestrator = orchestrator(llm.clone(), serp, StubPages { failing: vec![] }).with_event_tx(tx);

    let err = orchestrator.run("fusion").await.unwrap_err();
    assert!(matches!(err, PipelineError::ExternalService { status: Some(503), .. }));
    assert!(llm.calls_for(WRITER_ROLE).is_empty());
    assert!(matches!(drain(&mut rx).last(), Some(PipelineEvent::Error { .. })));
}

#[tokio::test]
async fn test_writer_failure_is_fatal() {
    let llm = Arc::new(scripted_llm().with_failure(WRITER_ROLE, "quota exceeded"));
    let orchestrator = orchestrator(llm.clone(), Arc::new(StubSerp::new()), StubPages { failing: vec![] });
    let err = orchestrator.run("fusion").await.unwrap_err();
    assert!(matches!(err, PipelineError::Generation { stage: StageKind::Writer, .. }));
    assert!(llm.calls_for(REVIEWER_ROLE).is_empty());
}

#[tokio::test]
async fn test_researcher_tool_call_adds_image() {
    // Researcher 先请求一次图片检索，再给出笔记
    let llm = Arc::new(
        MockLlmClient::new()
            .with_reply(RESEARCHER_ROLE, r#"{"tool": "google_images_search", "args": {"q": "fusion startup"}}"#)
            .with_reply(RESEARCHER_ROLE, "Notes after image search.")
            .with_reply(WRITER_ROLE, "draft")
            .with_reply(REVIEWER_ROLE, "review")
            .with_reply(FINAL_WRITER_ROLE, FINAL_TEXT),
    );
    let serp = Arc::new(StubSerp::new());
    let orchestrator = orchestrator(llm.clone(), serp.clone(), StubPages { failing: vec![] });
    let output = orchestrator.run("fusion").await.unwrap();

    // 两次种子检索 + 一次 LLM 请求的图片检索；同一缩略图去重
    assert_eq!(serp.calls.load(Ordering::SeqCst), 3);
    assert_eq!(output.images, vec![IMAGE.to_string()]);
    assert_eq!(llm.calls_for(RESEARCHER_ROLE).len(), 2);
}

#[tokio::test]
async fn test_image_search_failure_keeps_text_stories() {
    let llm = Arc::new(scripted_llm());
    let serp = Arc::new(StubSerp {
        fail_images: true,
        ..StubSerp::new()
    });
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let orchestrator = orchestrator(llm.clone(), serp, StubPages { failing: vec![] }).with_event_tx(tx);

    let output = orchestrator.run("fusion").await.expect("image failure must not abort research");
    assert!(output.images.is_empty());
    assert_eq!(output.failures.len(), 1);
    assert_eq!(output.failures[0].tool, "google_images_search");
    assert_eq!(output.failures[0].target, None);
    assert!(output.failures[0].reason.contains("HTTP 500"));

    let writer_calls = llm.calls_for(WRITER_ROLE);
    let writer_input = last_content(&writer_calls[0], Role::User).unwrap();
    assert!(writer_input.contains("### Story 2"));
    assert!(writer_input.contains("Image: (none)"));
    assert!(writer_input.contains("Scraped stories: 2"));

    let events = drain(&mut rx);
    assert!(events.iter().any(|e| matches!(e, PipelineEvent::ToolFailure { tool, .. } if tool == "google_images_search")));
    assert!(matches!(events.last(), Some(PipelineEvent::Done { images: 0 })));
}

#[tokio::test]
async fn test_invalid_candidate_url_is_recorded_as_schema_failure() {
    const BAD_LINK: &str = "https://[newsroom]/story";
    let llm = Arc::new(scripted_llm());
    let serp = Arc::new(StubSerp {
        extra_link: Some(BAD_LINK),
        ..StubSerp::new()
    });
    let orchestrator = orchestrator(llm.clone(), serp, StubPages { failing: vec![] });

    let output = orchestrator.run("fusion").await.unwrap();
    assert_eq!(output.failures.len(), 1);
    let failure = &output.failures[0];
    assert_eq!(failure.tool, "website_scraper");
    assert_eq!(failure.target.as_deref(), Some(BAD_LINK));
    assert!(failure.reason.starts_with("Schema validation failed"));
    assert_eq!(output.images, vec![IMAGE.to_string()]);

    let writer_calls = llm.calls_for(WRITER_ROLE);
    let writer_input = last_content(&writer_calls[0], Role::User).unwrap();
    assert!(writer_input.contains("Scraped stories: 2"));
    assert!(!writer_input.contains("### Story 3"));
}
