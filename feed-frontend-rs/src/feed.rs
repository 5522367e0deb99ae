//! The main feed: entries from every subscribed RSS feed, loaded a page at a time.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::{Rc, Weak};

use chrono::{DateTime, Utc};
use futures::FutureExt as _;
use futures::future::{self, LocalBoxFuture};
use hunch::{LifecycleGuard, ListenerKey, Listeners, MountScope};

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(target_arch = "wasm32", derive(tsify::Tsify))]
#[cfg_attr(target_arch = "wasm32", tsify(into_wasm_abi, from_wasm_abi))]
pub struct FeedEntry {
    /// The item's RSS `guid`, unique across feeds.
    pub guid: String,
    pub feed_title: String,
    pub title: String,
    pub link: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[cfg_attr(target_arch = "wasm32", tsify(type = "string"))]
    pub published_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedPage {
    pub entries: Vec<FeedEntry>,
    /// Pass back to get the page after this one.
    pub continue_cursor: Option<String>,
    pub is_done: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeedError {
    #[error("a page is already loading")]
    AlreadyLoading,
    #[error("the feed was closed before the page arrived")]
    Detached,
    #[error("failed to load feed: {0}")]
    Source(String),
}

pub trait PageSource {
    fn load_page(
        &self,
        cursor: Option<&str>,
        page_size: usize,
    ) -> LocalBoxFuture<'static, Result<FeedPage, FeedError>>;
}

struct PagerState {
    entries: im::Vector<FeedEntry>,
    seen: HashSet<String>,
    cursor: Option<String>,
    has_more: bool,
    loading: bool,
}

struct PagerShared {
    state: RefCell<PagerState>,
    source: Rc<dyn PageSource>,
    page_size: usize,
    guard: LifecycleGuard,
    listeners: Listeners<im::Vector<FeedEntry>>,
}

#[derive(Clone)]
pub struct FeedPager {
    shared: Rc<PagerShared>,
}

impl FeedPager {
    pub fn new(source: Rc<dyn PageSource>, page_size: usize) -> Self {
        Self {
            shared: Rc::new(PagerShared {
                state: RefCell::new(PagerState {
                    entries: im::Vector::new(),
                    seen: HashSet::new(),
                    cursor: None,
                    has_more: true,
                    loading: false,
                }),
                source,
                page_size,
                guard: LifecycleGuard::new(),
                listeners: Listeners::new(),
            }),
        }
    }

    pub fn entries(&self) -> im::Vector<FeedEntry> {
        self.shared.state.borrow().entries.clone()
    }

    pub fn has_more(&self) -> bool {
        self.shared.state.borrow().has_more
    }

    pub fn is_loading(&self) -> bool {
        self.shared.state.borrow().loading
    }

    pub fn subscribe(&self, listener: impl Fn(&im::Vector<FeedEntry>) + 'static) -> ListenerKey {
        self.shared.listeners.insert(listener)
    }

    pub fn unsubscribe(&self, key: ListenerKey) {
        self.shared.listeners.remove(key)
    }

    /// Fetch the next page and append it. Resolves to the number of new entries.
    pub fn load_more(&self) -> LocalBoxFuture<'static, Result<usize, FeedError>> {
        let cursor = {
            let mut state = self.shared.state.borrow_mut();
            if !self.shared.guard.is_live() {
                return future::ready(Err(FeedError::Detached)).boxed_local();
            }
            if state.loading {
                return future::ready(Err(FeedError::AlreadyLoading)).boxed_local();
            }
            if !state.has_more {
                return future::ready(Ok(0)).boxed_local();
            }
            state.loading = true;
            state.cursor.clone()
        };

        let request = self
            .shared
            .source
            .load_page(cursor.as_deref(), self.shared.page_size);
        let weak: Weak<PagerShared> = Rc::downgrade(&self.shared);

        async move {
            let result = request.await;
            let Some(shared) = weak.upgrade() else {
                return Err(FeedError::Detached);
            };
            if !shared.guard.is_live() {
                log::debug!("Feed page arrived after the feed was closed");
                return Err(FeedError::Detached);
            }

            let appended = {
                let mut state = shared.state.borrow_mut();
                state.loading = false;
                let page = result.inspect_err(|e| log::error!("{e}"))?;
                let mut appended = 0;
                for entry in page.entries {
                    if state.seen.insert(entry.guid.clone()) {
                        state.entries.push_back(entry);
                        appended += 1;
                    }
                }
                state.cursor = page.continue_cursor;
                state.has_more = !page.is_done;
                appended
            };

            if appended > 0 {
                let entries = shared.state.borrow().entries.clone();
                shared.listeners.notify(&entries);
            }
            Ok(appended)
        }
        .boxed_local()
    }

    pub fn teardown(&self) {
        self.shared.guard.teardown();
        self.shared.listeners.clear();
    }

    pub fn scope(&self) -> MountScope {
        self.shared.guard.scope()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::oneshot;
    use futures::executor::block_on;

    fn entry(guid: &str) -> FeedEntry {
        FeedEntry {
            guid: guid.to_string(),
            feed_title: "Example Blog".to_string(),
            title: format!("Post {guid}"),
            link: format!("https://example.com/{guid}"),
            summary: None,
            published_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        }
    }

    /// Serves queued pages in order, and records the cursors it was asked for.
    #[derive(Default)]
    struct QueuedPages {
        pages: RefCell<Vec<oneshot::Receiver<Result<FeedPage, FeedError>>>>,
        cursors: RefCell<Vec<Option<String>>>,
    }

    impl PageSource for QueuedPages {
        fn load_page(
            &self,
            cursor: Option<&str>,
            _page_size: usize,
        ) -> LocalBoxFuture<'static, Result<FeedPage, FeedError>> {
            self.cursors.borrow_mut().push(cursor.map(str::to_string));
            let rx = self.pages.borrow_mut().remove(0);
            async move { rx.await.unwrap_or(Err(FeedError::Detached)) }.boxed_local()
        }
    }

    impl QueuedPages {
        fn queue(&self) -> oneshot::Sender<Result<FeedPage, FeedError>> {
            let (tx, rx) = oneshot::channel();
            self.pages.borrow_mut().push(rx);
            tx
        }
    }

    #[test]
    fn test_pages_append_and_dedupe() {
        let source = Rc::new(QueuedPages::default());
        let pager = FeedPager::new(source.clone(), 2);

        let first = source.queue();
        let second = source.queue();
        first
            .send(Ok(FeedPage {
                entries: vec![entry("a"), entry("b")],
                continue_cursor: Some("c1".to_string()),
                is_done: false,
            }))
            .unwrap();
        assert_eq!(block_on(pager.load_more()), Ok(2));

        // a new post at the top shifts "b" onto the second page
        second
            .send(Ok(FeedPage {
                entries: vec![entry("b"), entry("c")],
                continue_cursor: None,
                is_done: true,
            }))
            .unwrap();
        assert_eq!(block_on(pager.load_more()), Ok(1));

        let guids: Vec<_> = pager.entries().iter().map(|e| e.guid.clone()).collect();
        assert_eq!(guids, ["a", "b", "c"]);
        assert!(!pager.has_more());
        assert_eq!(*source.cursors.borrow(), [None, Some("c1".to_string())]);

        // nothing left to ask for
        assert_eq!(block_on(pager.load_more()), Ok(0));
        assert_eq!(source.cursors.borrow().len(), 2);
    }

    #[test]
    fn test_no_concurrent_loads() {
        let source = Rc::new(QueuedPages::default());
        let pager = FeedPager::new(source.clone(), 10);
        let tx = source.queue();

        let loading = pager.load_more();
        assert!(pager.is_loading());
        assert_eq!(block_on(pager.load_more()), Err(FeedError::AlreadyLoading));

        tx.send(Ok(FeedPage {
            entries: vec![entry("a")],
            continue_cursor: None,
            is_done: false,
        }))
        .unwrap();
        assert_eq!(block_on(loading), Ok(1));
        assert!(!pager.is_loading());
    }

    #[test]
    fn test_failed_load_can_be_retried() {
        let source = Rc::new(QueuedPages::default());
        let pager = FeedPager::new(source.clone(), 10);

        source
            .queue()
            .send(Err(FeedError::Source("503".to_string())))
            .unwrap();
        assert_eq!(
            block_on(pager.load_more()),
            Err(FeedError::Source("503".to_string()))
        );
        assert!(!pager.is_loading());
        assert!(pager.has_more());
    }

    #[test]
    fn test_page_after_teardown_is_ignored() {
        let source = Rc::new(QueuedPages::default());
        let pager = FeedPager::new(source.clone(), 10);
        let tx = source.queue();
        let renders = Rc::new(std::cell::Cell::new(0));
        {
            let renders = Rc::clone(&renders);
            pager.subscribe(move |_| renders.set(renders.get() + 1));
        }

        let loading = pager.load_more();
        drop(pager.scope());
        tx.send(Ok(FeedPage {
            entries: vec![entry("a")],
            continue_cursor: None,
            is_done: true,
        }))
        .unwrap();

        assert_eq!(block_on(loading), Err(FeedError::Detached));
        assert!(pager.entries().is_empty());
        assert_eq!(renders.get(), 0);
    }
}
