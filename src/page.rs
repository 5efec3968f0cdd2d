/// Active-Page Reader: one-shot lookup of the focused tab's URL and title
use serde::Deserialize;
use wasm_bindgen::prelude::*;

// Import JS bridge functions
#[wasm_bindgen(module = "/popup.js")]
extern "C" {
    /// chrome.tabs.query({ active: true, lastFocusedWindow: true })
    #[wasm_bindgen(catch)]
    async fn getActiveTab() -> Result<JsValue, JsValue>;

    /// Runs a page-scoped script that reads the `og:title` meta tag (checked
    /// by both the `property` and `name` attribute forms) and `document.title`.
    #[wasm_bindgen(catch)]
    async fn readPageTitles(tab_id: i32) -> Result<JsValue, JsValue>;
}

/// The browser's record of the focused tab.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
struct ActiveTab {
    id: Option<i32>,
    url: Option<String>,
    title: Option<String>,
}

/// Titles read from inside the page itself.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
struct PageTitles {
    og_title: Option<String>,
    document_title: Option<String>,
}

/// What the popup pre-fills its form with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActivePage {
    pub url: String,
    pub title: String,
}

/// Title fallback chain: Open-Graph title, then the document title, then the
/// tab's own recorded title. All-empty leaves the field for the user.
pub fn resolve_title(
    og_title: Option<&str>,
    document_title: Option<&str>,
    tab_title: Option<&str>,
) -> String {
    [og_title, document_title, tab_title]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|t| !t.is_empty())
        .unwrap_or_default()
        .to_string()
}

/// Read the focused tab once. Never surfaces an error: a missing tab (or a
/// tab without an id) yields an empty URL, and page-script failures degrade
/// to the tab's native title.
pub async fn read_active_page() -> ActivePage {
    let tab = match getActiveTab().await {
        Ok(tab_js) if !tab_js.is_null() && !tab_js.is_undefined() => {
            match serde_wasm_bindgen::from_value::<ActiveTab>(tab_js) {
                Ok(tab) => tab,
                Err(e) => {
                    log::error!("Failed to parse active tab: {:?}", e);
                    return ActivePage::default();
                }
            }
        }
        Ok(_) => return ActivePage::default(),
        Err(e) => {
            log::error!("Load active tab failed: {:?}", e);
            return ActivePage::default();
        }
    };

    let Some(tab_id) = tab.id else {
        return ActivePage::default();
    };

    let titles = match readPageTitles(tab_id).await {
        Ok(titles_js) => {
            serde_wasm_bindgen::from_value::<PageTitles>(titles_js).unwrap_or_default()
        }
        Err(e) => {
            log::warn!("Read page titles failed: {:?}", e);
            PageTitles::default()
        }
    };

    ActivePage {
        url: tab.url.unwrap_or_default(),
        title: resolve_title(
            titles.og_title.as_deref(),
            titles.document_title.as_deref(),
            tab.title.as_deref(),
        ),
    }
}
