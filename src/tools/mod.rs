//! 工具层：检索服务传输、网页检索、图片检索、网页抓取，以及带 schema 校验的工具契约与执行器

pub mod contract;
pub mod executor;
pub mod image_search;
pub mod schema;
pub mod scrape;
pub mod search;
pub mod serp;

pub use contract::{ToolCapability, ToolContract, ToolKind, ToolOutput};
pub use executor::ToolExecutor;
pub use image_search::{ImageRef, ImageResult, ImageSearchClient};
pub use schema::{Query, ScrapeArgs, SearchArgs};
pub use scrape::{HttpPageSource, PageScraper, PageSource, ScrapedPage};
pub use search::{candidate_urls, SearchClient, SearchResult};
pub use serp::{Engine, HttpSerpTransport, SerpTransport};
