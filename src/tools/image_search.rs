//! 图片检索：摘要文本 + 有序图片引用

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::core::PipelineError;
use crate::tools::schema::Query;
use crate::tools::serp::{Engine, SerpTransport};

pub const IMAGES_KEY: &str = "images_results";

/// 单张图片的引用；thumbnail_url 可能缺失
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageRef {
    pub title: Option<String>,
    pub source: Option<String>,
    pub link: Option<String>,
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImageResult {
    pub summary: String,
    pub images: Vec<ImageRef>,
}

impl ImageResult {
    /// 所有存在缩略图的图片地址（保持顺序）
    pub fn thumbnail_urls(&self) -> Vec<String> {
        self.images
            .iter()
            .filter_map(|i| i.thumbnail_url.clone())
            .collect()
    }
}

fn str_field(item: &Value, key: &str) -> Option<String> {
    item.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// 从图片检索响应中提取；没有 images_results 时返回空结果
pub fn normalize_images(response: &Value) -> ImageResult {
    let Some(items) = response.get(IMAGES_KEY).and_then(Value::as_array) else {
        return ImageResult::default();
    };
    let mut result = ImageResult::default();
    for item in items {
        let image = ImageRef {
            title: str_field(item, "title"),
            source: str_field(item, "source"),
            link: str_field(item, "link"),
            thumbnail_url: str_field(item, "thumbnail"),
        };
        let show = |v: &Option<String>| v.clone().unwrap_or_else(|| "(none)".to_string());
        result.summary.push_str(&format!(
            "Title: {}\nSource: {}\nLink: {}\nThumbnail: {}\n\n",
            show(&image.title),
            show(&image.source),
            show(&image.link),
            show(&image.thumbnail_url),
        ));
        result.images.push(image);
    }
    result
}

/// 图片检索客户端
#[derive(Clone)]
pub struct ImageSearchClient {
    transport: Arc<dyn SerpTransport>,
}

impl ImageSearchClient {
    pub fn new(transport: Arc<dyn SerpTransport>) -> Self {
        Self { transport }
    }

    pub async fn search_images(&self, query: &Query) -> Result<ImageResult, PipelineError> {
        let response = self.transport.fetch(Engine::GoogleImages, query).await?;
        let result = normalize_images(&response);
        tracing::info!(q = %query.text(), images = result.images.len(), "image search normalized");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_images_key_is_empty_not_error() {
        let result = normalize_images(&json!({"search_metadata": {}}));
        assert_eq!(result.summary, "");
        assert!(result.images.is_empty());

        let result = normalize_images(&json!({IMAGES_KEY: []}));
        assert_eq!(result, ImageResult::default());
    }

    #[test]
    fn test_images_summarized_in_order() {
        let result = normalize_images(&json!({
            IMAGES_KEY: [
                {"title": "Chip", "source": "Wire", "link": "https://wire.example/a", "thumbnail": "https://img.example/1.jpg"},
                {"title": "No thumb", "source": "Blog", "link": "https://blog.example/b"}
            ]
        }));
        assert_eq!(result.images.len(), 2);
        assert_eq!(result.thumbnail_urls(), vec!["https://img.example/1.jpg"]);
        assert!(result.summary.starts_with(
            "Title: Chip\nSource: Wire\nLink: https://wire.example/a\nThumbnail: https://img.example/1.jpg\n\n"
        ));
        assert!(result.summary.ends_with("Thumbnail: (none)\n\n"));
    }
}
