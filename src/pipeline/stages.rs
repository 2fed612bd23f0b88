//! Newsletter 的四个阶段：人设、任务与读集合
//!
//! 每次运行按主题重新构建；只有 Researcher 绑定工具。
//! Writer / Reviewer 的任务要求保留 URL 与图片行，FinalWriter 才能在每个故事标题后放图片。

use std::sync::Arc;

use crate::agent::AgentPersona;
use crate::llm::LlmClient;
use crate::pipeline::{PipelineStage, StageKind, StageTask};
use crate::tools::ToolKind;

pub const RESEARCHER_ROLE: &str = "Newsletter Content Researcher";
pub const WRITER_ROLE: &str = "Content Writer";
pub const REVIEWER_ROLE: &str = "Content Reviewer";
pub const FINAL_WRITER_ROLE: &str = "Final Content Writer";

/// 角色名
pub fn role_for(kind: StageKind) -> &'static str {
    match kind {
        StageKind::Researcher => RESEARCHER_ROLE,
        StageKind::Writer => WRITER_ROLE,
        StageKind::Reviewer => REVIEWER_ROLE,
        StageKind::FinalWriter => FINAL_WRITER_ROLE,
    }
}

pub fn researcher(topic: &str, max_stories: usize, llm: Arc<dyn LlmClient>) -> PipelineStage {
    PipelineStage {
        kind: StageKind::Researcher,
        persona: AgentPersona::new(
            RESEARCHER_ROLE,
            format!(
                "Search the latest top {max_stories} stories on the given topic, find {max_stories} unique URLs containing the stories, \
                 a relevant image for each story, and scrape relevant information from these URLs."
            ),
            "An experienced researcher with strong skills in web scraping, fact-finding, and analyzing recent trends \
             to provide up-to-date information for high-quality newsletters.",
            llm,
        ),
        task: StageTask::new(
            format!(
                "Research and identify the most interesting {max_stories} stories on the topic of {topic}. \
                 Scrape detailed content from relevant websites to gather comprehensive material. \
                 Find a relevant image for each story."
            ),
            "A list of 3-4 recent developments and 2 stories from more than a week ago with their respective website URLs. \
             Scraped content from all URLs that can be used further by the writer. \
             A relevant image for each story.",
        )
        .with_tools(ToolKind::ALL),
        read_set: Vec::new(),
    }
}

pub fn writer(topic: &str, llm: Arc<dyn LlmClient>) -> PipelineStage {
    PipelineStage {
        kind: StageKind::Writer,
        persona: AgentPersona::new(
            WRITER_ROLE,
            "Write detailed, engaging, and informative summaries of the developments found by the researcher using the format specified.",
            "An experienced writer with a background in journalism and content creation. \
             Skilled in crafting compelling narratives and distilling complex information into accessible formats. \
             Adept at conducting research and synthesizing insights for engaging content.",
            llm,
        ),
        task: StageTask::new(
            format!(
                "Write detailed summaries of the recent developments about {topic} identified by the researcher. \
                 Ensure each summary is informative, engaging, and provides clear insights into the development. \
                 Do not add stories the researcher did not find. Keep each story's URL and Image lines unchanged."
            ),
            "Summarized content for all the stories, each summary being 150-200 words long, \
             with clear and concise information, followed by the story's URL and Image lines.",
        ),
        read_set: vec![StageKind::Researcher],
    }
}

pub fn reviewer(topic: &str, llm: Arc<dyn LlmClient>) -> PipelineStage {
    PipelineStage {
        kind: StageKind::Reviewer,
        persona: AgentPersona::new(
            REVIEWER_ROLE,
            "Review and refine content drafts to ensure they meet high standards of quality and impact like major newsletters.",
            "A meticulous reviewer with extensive experience in editing and proofreading, known for their keen eye \
             for detail and commitment to maintaining the highest quality standards in published content.",
            llm,
        ),
        task: StageTask::new(
            format!(
                "Review the summarized content about {topic} provided by the writer for accuracy, coherence, and quality. \
                 Ensure that the content is free from errors and meets the publication standards. \
                 Keep each story's URL and Image lines unchanged."
            ),
            "Reviewed content with suggestions for improvements, if any. \
             Final versions of summaries that are ready for inclusion in the newsletter.",
        ),
        read_set: vec![StageKind::Writer],
    }
}

pub fn final_writer(topic: &str, llm: Arc<dyn LlmClient>) -> PipelineStage {
    PipelineStage {
        kind: StageKind::FinalWriter,
        persona: AgentPersona::new(
            FINAL_WRITER_ROLE,
            "Compile, refine, and structure all reviewed and approved content into a cohesive and engaging newsletter format. \
             Ensure that the final product is polished, logically structured, and ready for publication.",
            "An accomplished writer and editor with extensive experience in journalism, content creation, and editorial management. \
             Known for crafting compelling narratives and keeping consistency and quality across all sections of a publication.",
            llm,
        ),
        task: StageTask::new(
            format!(
                "Compile the reviewed and refined content about {topic} into a well-structured newsletter format. \
                 Ensure the newsletter flows logically from one section to the next."
            ),
            "Final newsletter with all the reviewed summaries, formatted and ready for publication. \
             The first line must be a compelling hook sentence that makes readers want to read the entire newsletter. \
             Then a Contents section summarizing each story in one interesting sentence, exactly one line per story. \
             Then one section per story with: the title, the image right after the title, a small introduction, \
             the main details in 3-4 bullet points, and why it matters or a call to action. \
             End with a conclusion that wraps up all content with a final thought.",
        ),
        read_set: vec![StageKind::Reviewer],
    }
}

/// 按执行顺序返回四个阶段
pub fn newsletter_stages(topic: &str, max_stories: usize, llm: Arc<dyn LlmClient>) -> Vec<PipelineStage> {
    vec![
        researcher(topic, max_stories, llm.clone()),
        writer(topic, llm.clone()),
        reviewer(topic, llm.clone()),
        final_writer(topic, llm),
    ]
}
