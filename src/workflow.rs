/// The save workflow: validate, resolve the category, crawl, persist
///
/// One invocation runs strictly sequentially:
/// validate → (resolve category)? → crawl → persist,
/// and every failure is terminal for that invocation — the user re-triggers
/// the save. At most one save is in flight per view, enforced by a busy
/// flag rather than a queue.
use std::cell::Cell;
use std::fmt;

use crate::category::{
    CategoryAction, CategoryNameError, CategorySelection, Category, resolve_selection,
};
use crate::crawl::{CrawlData, CrawlError};
use crate::identity::Identity;
use crate::link::NewLink;
use crate::store::StoreError;

/// Bearer tokens from the identity provider's session. `None` covers both
/// "no session" and an empty token string.
pub trait TokenSource {
    async fn bearer_token(&self) -> Option<String>;
}

/// The writes the workflow performs against the data store.
pub trait Store {
    async fn insert_category(
        &self,
        token: &str,
        user_id: &str,
        name: &str,
    ) -> Result<Category, StoreError>;

    async fn insert_link(&self, token: &str, link: &NewLink) -> Result<(), StoreError>;
}

/// The external metadata crawler.
pub trait Crawler {
    async fn crawl(&self, url: &str) -> Result<CrawlData, CrawlError>;
}

/// Everything one save invocation needs, captured from the view.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveRequest {
    pub identity: Identity,
    /// Captured once at popup load by the Active-Page Reader.
    pub page_url: String,
    pub manual_title: String,
    pub selection: CategorySelection,
    /// The category list loaded once per popup session, name-ascending.
    pub categories: Vec<Category>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    Saved {
        link: NewLink,
        /// Present when the save inserted a brand-new category; the view
        /// appends it to its list and selects it.
        created_category: Option<Category>,
    },
    /// Another save was already in flight; this invocation did nothing.
    Busy,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SaveError {
    SignInRequired,
    MissingUrl,
    TokenUnavailable,
    CategoryName(CategoryNameError),
    Store(StoreError),
    Crawl,
}

/// A failed invocation. The category inserted earlier in the same
/// invocation (if any) rides along so the view can still append and select
/// it — otherwise a retry with the stale list would insert the same name
/// twice.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveFailure {
    pub error: SaveError,
    pub created_category: Option<Category>,
}

impl fmt::Display for SaveFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl From<SaveError> for SaveFailure {
    fn from(error: SaveError) -> Self {
        SaveFailure {
            error,
            created_category: None,
        }
    }
}

impl From<CategoryNameError> for SaveFailure {
    fn from(e: CategoryNameError) -> Self {
        SaveError::CategoryName(e).into()
    }
}

impl From<StoreError> for SaveFailure {
    fn from(e: StoreError) -> Self {
        SaveError::Store(e).into()
    }
}

impl fmt::Display for SaveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaveError::SignInRequired => write!(f, "Sign-in required."),
            SaveError::MissingUrl => write!(f, "URL not found."),
            SaveError::TokenUnavailable => write!(f, "Could not obtain an auth token."),
            SaveError::CategoryName(e) => write!(f, "{}", e),
            SaveError::Store(e) => write!(f, "{}", e),
            SaveError::Crawl => write!(f, "Crawl request failed."),
        }
    }
}

impl From<CategoryNameError> for SaveError {
    fn from(e: CategoryNameError) -> Self {
        SaveError::CategoryName(e)
    }
}

impl From<StoreError> for SaveError {
    fn from(e: StoreError) -> Self {
        SaveError::Store(e)
    }
}

pub struct Saver<T, S, C> {
    tokens: T,
    store: S,
    crawler: C,
    busy: Cell<bool>,
}

impl<T: TokenSource, S: Store, C: Crawler> Saver<T, S, C> {
    pub fn new(tokens: T, store: S, crawler: C) -> Self {
        Saver {
            tokens,
            store,
            crawler,
            busy: Cell::new(false),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.get()
    }

    /// Run one save. A call while another save is in flight performs no I/O
    /// and reports `Busy`.
    pub async fn save(&self, request: &SaveRequest) -> Result<SaveOutcome, SaveFailure> {
        if self.busy.get() {
            return Ok(SaveOutcome::Busy);
        }
        self.busy.set(true);
        let result = self.run(request).await;
        self.busy.set(false);
        result
    }

    async fn run(&self, request: &SaveRequest) -> Result<SaveOutcome, SaveFailure> {
        let Identity::Authenticated { user_id } = &request.identity else {
            return Err(SaveError::SignInRequired.into());
        };
        if request.page_url.is_empty() {
            return Err(SaveError::MissingUrl.into());
        }

        // Local validation and dedup against the loaded list; no I/O yet.
        let action = resolve_selection(&request.selection, &request.categories)?;

        let token = self
            .tokens
            .bearer_token()
            .await
            .ok_or(SaveError::TokenUnavailable)?;

        // A category created here is not rolled back if a later step fails;
        // it is reported on both paths so the caller's list stays
        // deduplicating.
        let (category_id, created_category) = match action {
            CategoryAction::None => (None, None),
            CategoryAction::Use(id) => (Some(id), None),
            CategoryAction::Create(name) => {
                let category = self.store.insert_category(&token, user_id, &name).await?;
                (Some(category.id.clone()), Some(category))
            }
        };

        let metadata = match self.crawler.crawl(&request.page_url).await {
            Ok(metadata) => metadata,
            Err(e) => {
                log::error!("Crawl failed: {:?}", e);
                return Err(SaveFailure {
                    error: SaveError::Crawl,
                    created_category,
                });
            }
        };

        let link = NewLink::from_page(user_id, &request.page_url, &request.manual_title, category_id)
            .enriched(&metadata);
        if let Err(e) = self.store.insert_link(&token, &link).await {
            return Err(SaveFailure {
                error: SaveError::Store(e),
                created_category,
            });
        }

        Ok(SaveOutcome::Saved {
            link,
            created_category,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::future::Future;
    use std::pin::pin;
    use std::rc::Rc;
    use std::task::{Context, Poll, Waker};

    #[derive(Clone, Default)]
    struct Tokens {
        value: Option<String>,
        calls: Rc<Cell<usize>>,
    }

    impl Tokens {
        fn some() -> Self {
            Tokens {
                value: Some("token-1".to_string()),
                calls: Rc::default(),
            }
        }
    }

    impl TokenSource for Tokens {
        async fn bearer_token(&self) -> Option<String> {
            self.calls.set(self.calls.get() + 1);
            self.value.clone()
        }
    }

    #[derive(Clone, Default)]
    struct RecordingStore {
        category_inserts: Rc<RefCell<Vec<String>>>,
        link_inserts: Rc<RefCell<Vec<NewLink>>>,
        category_error: Option<StoreError>,
        link_error: Option<StoreError>,
    }

    impl Store for RecordingStore {
        async fn insert_category(
            &self,
            _token: &str,
            _user_id: &str,
            name: &str,
        ) -> Result<Category, StoreError> {
            if let Some(err) = &self.category_error {
                return Err(err.clone());
            }
            self.category_inserts.borrow_mut().push(name.to_string());
            Ok(Category {
                id: format!("new-{}", self.category_inserts.borrow().len()),
                name: name.to_string(),
            })
        }

        async fn insert_link(&self, _token: &str, link: &NewLink) -> Result<(), StoreError> {
            if let Some(err) = &self.link_error {
                return Err(err.clone());
            }
            self.link_inserts.borrow_mut().push(link.clone());
            Ok(())
        }
    }

    #[derive(Clone)]
    struct StubCrawler {
        result: Result<CrawlData, CrawlError>,
        calls: Rc<Cell<usize>>,
    }

    impl StubCrawler {
        fn returning(data: CrawlData) -> Self {
            StubCrawler {
                result: Ok(data),
                calls: Rc::default(),
            }
        }

        fn failing(status: u16) -> Self {
            StubCrawler {
                result: Err(CrawlError::Status(status)),
                calls: Rc::default(),
            }
        }
    }

    impl Crawler for StubCrawler {
        async fn crawl(&self, _url: &str) -> Result<CrawlData, CrawlError> {
            self.calls.set(self.calls.get() + 1);
            self.result.clone()
        }
    }

    /// Never resolves; used to hold a save in flight.
    #[derive(Clone, Default)]
    struct NeverCrawler {
        calls: Rc<Cell<usize>>,
    }

    impl Crawler for NeverCrawler {
        async fn crawl(&self, _url: &str) -> Result<CrawlData, CrawlError> {
            self.calls.set(self.calls.get() + 1);
            std::future::pending::<()>().await;
            unreachable!()
        }
    }

    fn signed_in() -> Identity {
        Identity::Authenticated {
            user_id: "user-1".to_string(),
        }
    }

    fn loaded_categories() -> Vec<Category> {
        vec![Category {
            id: "c1".to_string(),
            name: "Tech".to_string(),
        }]
    }

    fn request(selection: CategorySelection) -> SaveRequest {
        SaveRequest {
            identity: signed_in(),
            page_url: "https://example.com/post".to_string(),
            manual_title: "Manual Title".to_string(),
            selection,
            categories: loaded_categories(),
        }
    }

    #[tokio::test]
    async fn test_unauthenticated_save_makes_no_calls() {
        let tokens = Tokens::some();
        let store = RecordingStore::default();
        let crawler = StubCrawler::returning(CrawlData::default());
        let saver = Saver::new(tokens.clone(), store.clone(), crawler.clone());

        let mut req = request(CategorySelection::None);
        req.identity = Identity::Unauthenticated;
        let result = saver.save(&req).await;

        assert_eq!(result, Err(SaveError::SignInRequired.into()));
        assert_eq!(tokens.calls.get(), 0);
        assert_eq!(crawler.calls.get(), 0);
        assert!(store.category_inserts.borrow().is_empty());
        assert!(store.link_inserts.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_empty_url_aborts_before_any_call() {
        let tokens = Tokens::some();
        let store = RecordingStore::default();
        let saver = Saver::new(
            tokens.clone(),
            store.clone(),
            StubCrawler::returning(CrawlData::default()),
        );

        let mut req = request(CategorySelection::None);
        req.page_url = String::new();
        let result = saver.save(&req).await;

        assert_eq!(result, Err(SaveError::MissingUrl.into()));
        assert_eq!(tokens.calls.get(), 0);
    }

    #[tokio::test]
    async fn test_missing_token_aborts() {
        let store = RecordingStore::default();
        let saver = Saver::new(
            Tokens::default(),
            store.clone(),
            StubCrawler::returning(CrawlData::default()),
        );

        let result = saver.save(&request(CategorySelection::None)).await;

        assert_eq!(result, Err(SaveError::TokenUnavailable.into()));
        assert!(store.category_inserts.borrow().is_empty());
        assert!(store.link_inserts.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_blank_category_name_makes_no_store_calls() {
        let tokens = Tokens::some();
        let store = RecordingStore::default();
        let saver = Saver::new(
            tokens.clone(),
            store.clone(),
            StubCrawler::returning(CrawlData::default()),
        );

        let result = saver
            .save(&request(CategorySelection::New("   ".to_string())))
            .await;

        assert_eq!(
            result,
            Err(SaveError::CategoryName(CategoryNameError::Empty).into())
        );
        assert_eq!(tokens.calls.get(), 0);
        assert!(store.category_inserts.borrow().is_empty());
        assert!(store.link_inserts.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_over_long_category_name_makes_no_store_calls() {
        let store = RecordingStore::default();
        let saver = Saver::new(
            Tokens::some(),
            store.clone(),
            StubCrawler::returning(CrawlData::default()),
        );

        let result = saver
            .save(&request(CategorySelection::New("x".repeat(51))))
            .await;

        assert_eq!(
            result,
            Err(SaveError::CategoryName(CategoryNameError::TooLong).into())
        );
        assert!(store.category_inserts.borrow().is_empty());
        assert!(store.link_inserts.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_new_name_matching_loaded_category_reuses_it() {
        let store = RecordingStore::default();
        let saver = Saver::new(
            Tokens::some(),
            store.clone(),
            StubCrawler::returning(CrawlData::default()),
        );

        let result = saver
            .save(&request(CategorySelection::New("tech".to_string())))
            .await;

        let Ok(SaveOutcome::Saved {
            link,
            created_category,
        }) = result
        else {
            panic!("expected a saved outcome");
        };
        assert_eq!(created_category, None);
        assert!(store.category_inserts.borrow().is_empty());
        assert_eq!(link.category_id.as_deref(), Some("c1"));
    }

    #[tokio::test]
    async fn test_unmatched_new_name_creates_category() {
        let store = RecordingStore::default();
        let saver = Saver::new(
            Tokens::some(),
            store.clone(),
            StubCrawler::returning(CrawlData::default()),
        );

        let result = saver
            .save(&request(CategorySelection::New("  Rust  ".to_string())))
            .await;

        let Ok(SaveOutcome::Saved {
            link,
            created_category,
        }) = result
        else {
            panic!("expected a saved outcome");
        };
        assert_eq!(store.category_inserts.borrow().as_slice(), ["Rust"]);
        let created = created_category.expect("a created category");
        assert_eq!(created.name, "Rust");
        assert_eq!(link.category_id.as_deref(), Some(created.id.as_str()));
    }

    #[tokio::test]
    async fn test_category_store_error_surfaces_verbatim() {
        let store = RecordingStore {
            category_error: Some(StoreError::Api {
                code: "23505".to_string(),
                message: "duplicate key".to_string(),
            }),
            ..RecordingStore::default()
        };
        let crawler = StubCrawler::returning(CrawlData::default());
        let saver = Saver::new(Tokens::some(), store.clone(), crawler.clone());

        let result = saver
            .save(&request(CategorySelection::New("Rust".to_string())))
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "23505 duplicate key");
        // Aborted before the crawl and the link insert.
        assert_eq!(crawler.calls.get(), 0);
        assert!(store.link_inserts.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_crawl_failure_keeps_created_category_but_saves_no_link() {
        let store = RecordingStore::default();
        let saver = Saver::new(Tokens::some(), store.clone(), StubCrawler::failing(500));

        let result = saver
            .save(&request(CategorySelection::New("Rust".to_string())))
            .await;

        let failure = result.unwrap_err();
        assert_eq!(failure.error, SaveError::Crawl);
        // The category insert happened earlier in the same invocation and
        // is deliberately not rolled back; the failure reports the new row
        // so the caller can append it.
        let created = failure.created_category.expect("the created category rides along");
        assert_eq!(created.name, "Rust");
        assert_eq!(store.category_inserts.borrow().as_slice(), ["Rust"]);
        assert!(store.link_inserts.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_retry_after_crawl_failure_creates_no_duplicate_category() {
        let store = RecordingStore::default();
        let saver = Saver::new(Tokens::some(), store.clone(), StubCrawler::failing(500));
        let mut req = request(CategorySelection::New("Rust".to_string()));

        let failure = saver.save(&req).await.unwrap_err();
        let created = failure.created_category.expect("the created category rides along");
        // The view appends the reported category before any retry.
        req.categories.push(created);

        let failure = saver.save(&req).await.unwrap_err();
        assert_eq!(failure.error, SaveError::Crawl);
        // The retry resolved the same name to the existing row.
        assert_eq!(failure.created_category, None);
        assert_eq!(store.category_inserts.borrow().as_slice(), ["Rust"]);
    }

    #[tokio::test]
    async fn test_successful_save_persists_crawl_metadata() {
        let store = RecordingStore::default();
        let crawler = StubCrawler::returning(CrawlData {
            title: Some("T".to_string()),
            description: Some("D".to_string()),
            image_url: Some("I".to_string()),
            ..CrawlData::default()
        });
        let saver = Saver::new(Tokens::some(), store.clone(), crawler);

        let result = saver
            .save(&request(CategorySelection::Existing("c1".to_string())))
            .await;

        assert!(result.is_ok());
        let links = store.link_inserts.borrow();
        assert_eq!(links.len(), 1);
        let link = &links[0];
        assert_eq!(link.user_id, "user-1");
        assert_eq!(link.url, "https://example.com/post");
        assert_eq!(link.title.as_deref(), Some("T"));
        assert_eq!(link.description.as_deref(), Some("D"));
        assert_eq!(link.image_url.as_deref(), Some("I"));
        assert_eq!(link.category_id.as_deref(), Some("c1"));
    }

    #[tokio::test]
    async fn test_no_category_selection_saves_null_reference() {
        let store = RecordingStore::default();
        let saver = Saver::new(
            Tokens::some(),
            store.clone(),
            StubCrawler::returning(CrawlData::default()),
        );

        let result = saver.save(&request(CategorySelection::None)).await;

        assert!(result.is_ok());
        assert_eq!(store.link_inserts.borrow()[0].category_id, None);
        // No crawl title, so the manual title survives.
        assert_eq!(
            store.link_inserts.borrow()[0].title.as_deref(),
            Some("Manual Title")
        );
    }

    #[tokio::test]
    async fn test_link_store_error_surfaces_verbatim() {
        let store = RecordingStore {
            link_error: Some(StoreError::Api {
                code: "42501".to_string(),
                message: "permission denied".to_string(),
            }),
            ..RecordingStore::default()
        };
        let saver = Saver::new(
            Tokens::some(),
            store.clone(),
            StubCrawler::returning(CrawlData::default()),
        );

        let result = saver
            .save(&request(CategorySelection::New("Rust".to_string())))
            .await;

        let failure = result.unwrap_err();
        assert_eq!(failure.to_string(), "42501 permission denied");
        // The category created before the failed link insert is reported.
        assert_eq!(
            failure.created_category.map(|c| c.name),
            Some("Rust".to_string())
        );
    }

    #[test]
    fn test_reentrant_save_is_a_no_op() {
        let tokens = Tokens::some();
        let store = RecordingStore::default();
        let crawler = NeverCrawler::default();
        let saver = Saver::new(tokens.clone(), store.clone(), crawler.clone());
        let req = request(CategorySelection::None);

        let mut cx = Context::from_waker(Waker::noop());

        // First save parks inside the crawler call.
        let first = saver.save(&req);
        let mut first = pin!(first);
        assert!(matches!(first.as_mut().poll(&mut cx), Poll::Pending));
        assert!(saver.is_busy());
        assert_eq!(crawler.calls.get(), 1);
        let token_calls = tokens.calls.get();

        // Second invocation completes immediately with zero additional I/O.
        let second = saver.save(&req);
        let mut second = pin!(second);
        match second.as_mut().poll(&mut cx) {
            Poll::Ready(Ok(SaveOutcome::Busy)) => {}
            other => panic!("expected Busy, got {:?}", other),
        }
        assert_eq!(tokens.calls.get(), token_calls);
        assert_eq!(crawler.calls.get(), 1);
        assert!(store.link_inserts.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_busy_flag_clears_after_failure() {
        let saver = Saver::new(
            Tokens::some(),
            RecordingStore::default(),
            StubCrawler::failing(500),
        );
        let req = request(CategorySelection::None);

        assert!(saver.save(&req).await.is_err());
        assert!(!saver.is_busy());

        // The next invocation runs again rather than reporting Busy.
        assert_eq!(saver.save(&req).await, Err(SaveError::Crawl.into()));
    }
}
