//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `NEWSDESK__*` 覆盖（双下划线表示嵌套，如 `NEWSDESK__LLM__PROVIDER=gemini`）。
//! 两个凭据（模型 API Key 与检索 API Key）都必须提供，流水线不在半配置状态下运行。

use std::path::PathBuf;

use serde::Deserialize;

use crate::core::PipelineError;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub search: SearchSection,
    #[serde(default)]
    pub scrape: ScrapeSection,
    #[serde(default)]
    pub pipeline: PipelineSection,
}

/// [llm] 段：后端选择、采样参数与凭据
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：openai / gemini
    #[serde(default = "default_provider")]
    pub provider: String,
    /// 未设置时按 provider 取默认模型
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_temperature() -> f32 {
    0.6
}

fn default_max_tokens() -> u32 {
    3500
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            base_url: None,
            api_key: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// [search] 段：检索服务端点、凭据与时间窗口
#[derive(Debug, Clone, Deserialize)]
pub struct SearchSection {
    #[serde(default = "default_search_base_url")]
    pub base_url: String,
    pub api_key: Option<String>,
    /// 服务商语法的时间过滤（qdr:w2 = 最近两周）
    #[serde(default = "default_time_filter")]
    pub time_filter: String,
    #[serde(default = "default_search_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_search_base_url() -> String {
    "https://serpapi.com/search".to_string()
}

pub fn default_time_filter() -> String {
    "qdr:w2".to_string()
}

fn default_search_timeout_secs() -> u64 {
    20
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            base_url: default_search_base_url(),
            api_key: None,
            time_filter: default_time_filter(),
            timeout_secs: default_search_timeout_secs(),
        }
    }
}

/// [scrape] 段：抓取超时与最大字符数
#[derive(Debug, Clone, Deserialize)]
pub struct ScrapeSection {
    #[serde(default = "default_scrape_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_result_chars")]
    pub max_result_chars: usize,
}

fn default_scrape_timeout_secs() -> u64 {
    15
}

fn default_max_result_chars() -> usize {
    8000
}

impl Default for ScrapeSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_scrape_timeout_secs(),
            max_result_chars: default_max_result_chars(),
        }
    }
}

/// [pipeline] 段：故事数量、工具轮数与并发
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineSection {
    #[serde(default = "default_max_stories")]
    pub max_stories: usize,
    /// Researcher 在汇总前最多可追加的工具调用次数
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,
    #[serde(default = "default_scrape_concurrency")]
    pub scrape_concurrency: usize,
    /// 每篇抓取内容放入资料包的最大字符数
    #[serde(default = "default_excerpt_chars")]
    pub excerpt_chars: usize,
    /// 单次工具调用超时（秒）
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
}

fn default_max_stories() -> usize {
    5
}

fn default_max_tool_rounds() -> usize {
    3
}

fn default_scrape_concurrency() -> usize {
    5
}

fn default_excerpt_chars() -> usize {
    1500
}

fn default_tool_timeout_secs() -> u64 {
    45
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            max_stories: default_max_stories(),
            max_tool_rounds: default_max_tool_rounds(),
            scrape_concurrency: default_scrape_concurrency(),
            excerpt_chars: default_excerpt_chars(),
            tool_timeout_secs: default_tool_timeout_secs(),
        }
    }
}

/// 一次运行所用的凭据；由调用方显式传入，不在客户端内部读取环境变量
#[derive(Clone)]
pub struct Credentials {
    pub llm_api_key: String,
    pub search_api_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("llm_api_key", &"***")
            .field("search_api_key", &"***")
            .finish()
    }
}

impl AppConfig {
    /// 取出两个凭据；任一缺失（或为空白）即返回 Config 错误，并列出所有缺失项
    pub fn credentials(&self) -> Result<Credentials, PipelineError> {
        let llm = non_blank(self.llm.api_key.as_deref());
        let search = non_blank(self.search.api_key.as_deref());
        let mut missing = Vec::new();
        if llm.is_none() {
            missing.push("llm.api_key");
        }
        if search.is_none() {
            missing.push("search.api_key");
        }
        match (llm, search) {
            (Some(llm_api_key), Some(search_api_key)) => Ok(Credentials {
                llm_api_key,
                search_api_key,
            }),
            _ => Err(PipelineError::Config(format!(
                "missing credentials: {}",
                missing.join(", ")
            ))),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// 从 config 目录加载配置，环境变量 NEWSDESK__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 NEWSDESK__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("NEWSDESK")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_settings() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.llm.provider, "openai");
        assert!((cfg.llm.temperature - 0.6).abs() < f32::EPSILON);
        assert_eq!(cfg.llm.max_tokens, 3500);
        assert_eq!(cfg.search.time_filter, "qdr:w2");
        assert_eq!(cfg.search.base_url, "https://serpapi.com/search");
        assert_eq!(cfg.pipeline.max_stories, 5);
    }

    #[test]
    fn test_credentials_require_both_keys() {
        let mut cfg = AppConfig::default();
        let err = cfg.credentials().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("llm.api_key") && msg.contains("search.api_key"));

        cfg.llm.api_key = Some("sk-test".into());
        cfg.search.api_key = Some("   ".into());
        let err = cfg.credentials().unwrap_err();
        assert!(err.to_string().contains("search.api_key"));
        assert!(!err.to_string().contains("llm.api_key"));

        cfg.search.api_key = Some("serp-test".into());
        let creds = cfg.credentials().unwrap();
        assert_eq!(creds.search_api_key, "serp-test");
        assert!(!format!("{:?}", creds).contains("sk-test"));
    }

    #[test]
    fn test_load_config_from_explicit_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[llm]
provider = "gemini"
api_key = "g-key"

[search]
api_key = "s-key"
time_filter = "qdr:d"

[pipeline]
max_stories = 3
"#
        )
        .unwrap();

        let cfg = load_config(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(cfg.llm.provider, "gemini");
        assert_eq!(cfg.search.time_filter, "qdr:d");
        assert_eq!(cfg.pipeline.max_stories, 3);
        assert_eq!(cfg.pipeline.scrape_concurrency, 5);
        assert_eq!(cfg.scrape.max_result_chars, 8000);
        assert!(cfg.credentials().is_ok());
    }
}
