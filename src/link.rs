/// The link record inserted into the data store
use serde::Serialize;

use crate::crawl::CrawlData;

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Insert payload for the `links` table. Written exactly once per
/// successful save; never read back, updated, or deleted from here.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NewLink {
    pub user_id: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub category_id: Option<String>,
}

impl NewLink {
    pub fn from_page(
        user_id: &str,
        url: &str,
        manual_title: &str,
        category_id: Option<String>,
    ) -> NewLink {
        NewLink {
            user_id: user_id.to_string(),
            url: url.to_string(),
            title: non_empty(manual_title),
            description: None,
            image_url: None,
            category_id,
        }
    }

    /// Apply crawler metadata. Crawler fields win over the form: the manual
    /// title survives only when the crawler returns no title, and the
    /// crawler's canonical URL replaces the captured page URL when present.
    pub fn enriched(mut self, data: &CrawlData) -> NewLink {
        if let Some(url) = data.url.as_deref().and_then(non_empty) {
            self.url = url;
        }
        if let Some(title) = data.title.as_deref().and_then(non_empty) {
            self.title = Some(title);
        }
        if let Some(description) = data.description.as_deref().and_then(non_empty) {
            self.description = Some(description);
        }
        if let Some(image_url) = data.image_url.as_deref().and_then(non_empty) {
            self.image_url = Some(image_url);
        }
        self
    }
}
