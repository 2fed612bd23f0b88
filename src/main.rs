//! Newsdesk 命令行入口
//!
//! 加载配置、校验凭据、构建编排器；过程事件转发到日志，最后打印 Newsletter（或 JSON），可选导出 Markdown。

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use newsdesk::{load_config, observability, Orchestrator, PipelineEvent};

/// 为一个主题生成 Newsletter
#[derive(Parser, Debug)]
#[command(name = "newsdesk", version, about)]
struct Args {
    /// Newsletter 主题（多个词会以空格连接）
    #[arg(required = true)]
    topic: Vec<String>,

    /// 额外的配置文件（覆盖 config/default.toml）
    #[arg(short, long, env = "NEWSDESK_CONFIG")]
    config: Option<PathBuf>,

    /// 将 Markdown 写入该文件
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// 以 JSON 打印完整产出
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();
    let args = Args::parse();
    let topic = args.topic.join(" ");

    let cfg = load_config(args.config.clone()).context("Failed to load config")?;
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let orchestrator = Orchestrator::from_config(&cfg)
        .context("Failed to build pipeline")?
        .with_event_tx(tx);

    let forward = tokio::spawn(async move {
        while let Some(ev) = rx.recv().await {
            match &ev {
                PipelineEvent::ToolFailure { tool, reason } => {
                    tracing::warn!(tool = %tool, reason = %reason, "tool failure")
                }
                PipelineEvent::Error { text } => tracing::error!(error = %text, "pipeline error"),
                other => match serde_json::to_string(other) {
                    Ok(json) => tracing::info!(event = %json, "progress"),
                    Err(e) => tracing::warn!(error = %e, "unserializable event"),
                },
            }
        }
    });

    let result = orchestrator.run(&topic).await;
    drop(orchestrator);
    let _ = forward.await;
    let output = result.with_context(|| format!("Newsletter generation failed for {topic:?}"))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        let (hook, body) = output.split_hook()?;
        println!("{hook}\n\n{body}");
        for url in &output.images {
            println!("{url}");
        }
    }

    if let Some(path) = args.out {
        let markdown = output.to_markdown()?;
        std::fs::write(&path, markdown)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::info!(path = %path.display(), "markdown written");
    }

    Ok(())
}
