//! 网页抓取：超时、内容类型检查、结果大小限制
//!
//! GET 请求带超时与浏览器 User-Agent；仅接受文本类响应；
//! 对 HTML 响应使用 html2text 提取可读文本，响应超过 max_result_chars 时截断并追加 ...[truncated]。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use html2text::from_read;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE};
use reqwest::Client;
use serde::Serialize;

use crate::core::PipelineError;

pub const SERVICE_NAME: &str = "scraper";

/// 单个 URL 的抓取结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScrapedPage {
    pub url: String,
    pub text: String,
}

/// 页面来源：返回页面原始文本（HTML 或纯文本）
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, PipelineError>;
}

/// 基于 reqwest 的页面来源
pub struct HttpPageSource {
    client: Client,
}

impl HttpPageSource {
    pub fn new(timeout_secs: u64) -> Result<Self, PipelineError> {
        // 使用现代浏览器 UA 与常用请求头，避免被站点识别为爬虫
        const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            ACCEPT,
            reqwest::header::HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            reqwest::header::HeaderValue::from_static("en-US,en;q=0.9"),
        );
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .map_err(|e| PipelineError::Config(format!("http client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn fetch(&self, url: &str) -> Result<String, PipelineError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PipelineError::external(SERVICE_NAME, format!("Request failed for {}: {}", url, e.without_url())))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(PipelineError::ExternalService {
                service: SERVICE_NAME.to_string(),
                status: Some(status.as_u16()),
                message: format!("HTTP {} for {}", status, url),
            });
        }
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_lowercase();
        if !is_text_content(&content_type) {
            return Err(PipelineError::external(
                SERVICE_NAME,
                format!("unsupported content type {:?} for {}", content_type, url),
            ));
        }
        resp.text()
            .await
            .map_err(|e| PipelineError::external(SERVICE_NAME, format!("Read body for {}: {}", url, e.without_url())))
    }
}

/// 未声明 Content-Type 时按文本处理
fn is_text_content(content_type: &str) -> bool {
    content_type.is_empty()
        || content_type.starts_with("text/")
        || content_type.contains("html")
        || content_type.contains("xml")
        || content_type.contains("json")
}

/// 页面抓取器：来源 + 文本提取 + 截断
#[derive(Clone)]
pub struct PageScraper {
    source: Arc<dyn PageSource>,
    max_result_chars: usize,
}

impl PageScraper {
    pub fn new(source: Arc<dyn PageSource>, max_result_chars: usize) -> Self {
        Self {
            source,
            max_result_chars,
        }
    }

    pub async fn scrape(&self, url: &str) -> Result<ScrapedPage, PipelineError> {
        tracing::info!(url = %url, "scrape");
        let body = self.source.fetch(url).await?;
        Ok(ScrapedPage {
            url: url.to_string(),
            text: extract_text(&body, self.max_result_chars),
        })
    }
}

/// 去 BOM、HTML 转文本、按字符数截断
pub fn extract_text(body: &str, max_chars: usize) -> String {
    let body = body.strip_prefix('\u{FEFF}').unwrap_or(body);
    let text = if looks_like_html(body) {
        html_to_text(body)
    } else {
        body.to_string()
    };
    let text = text.trim();
    if text.chars().count() > max_chars {
        text.chars().take(max_chars).collect::<String>() + "\n...[truncated]"
    } else {
        text.to_string()
    }
}

/// 将 HTML 转为可读文本（html2text 失败或为空时退回去标签）
fn html_to_text(html: &str) -> String {
    match from_read(html.as_bytes(), 120) {
        Ok(text) if !text.trim().is_empty() => text,
        _ => strip_html_tags(html),
    }
}

/// 简易去除 HTML 标签（html2text 失败时的回退）
fn strip_html_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                out.push(' ');
            }
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 判断内容是否像 HTML（需提取可读文本）
fn looks_like_html(s: &str) -> bool {
    let s = s.trim_start();
    let head: String = s.chars().take(15).collect::<String>().to_lowercase();
    head.starts_with("<!doctype") || head.starts_with("<html")
        || (s.len() > 20
            && s.contains('<')
            && (s.contains("</") || s.contains("<meta") || s.contains("<head") || s.contains("<title")))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticSource(&'static str);

    #[async_trait]
    impl PageSource for StaticSource {
        async fn fetch(&self, _url: &str) -> Result<String, PipelineError> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn test_html_is_converted_to_text() {
        let html = "<!DOCTYPE html><html><head><title>t</title></head><body><p>Qubits are fragile.</p></body></html>";
        let text = extract_text(html, 1000);
        assert!(text.contains("Qubits are fragile."));
        assert!(!text.contains("<p>"));
    }

    #[test]
    fn test_plain_text_passes_through_and_is_truncated() {
        assert_eq!(extract_text("\u{FEFF}plain words", 100), "plain words");
        let long = "a".repeat(50);
        let text = extract_text(&long, 10);
        assert_eq!(text, format!("{}\n...[truncated]", "a".repeat(10)));
    }

    #[test]
    fn test_strip_tags_fallback() {
        assert_eq!(strip_html_tags("<div>one<br>two</div>"), "one two");
    }

    #[test]
    fn test_text_content_types() {
        assert!(is_text_content("text/html; charset=utf-8"));
        assert!(is_text_content("application/xhtml+xml"));
        assert!(is_text_content(""));
        assert!(!is_text_content("application/pdf"));
        assert!(!is_text_content("image/png"));
    }

    #[tokio::test]
    async fn test_scraper_uses_source() {
        let scraper = PageScraper::new(Arc::new(StaticSource("<html><body><h1>Hello</h1></body></html>")), 500);
        let page = scraper.scrape("https://example.com").await.unwrap();
        assert_eq!(page.url, "https://example.com");
        assert!(page.text.contains("Hello"));
    }
}
