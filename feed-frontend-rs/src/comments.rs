//! The comment drawer under a feed entry: the newest comments plus a count, with the user's own
//! comment shown before the server has it.

use std::rc::Rc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use hunch::{
    Binding, Clock, ListBinding, ListItem, ListWindow, ListenerKey, Mutation, MutationGateway, Row,
    Submission, SubscriptionKey, SubscriptionTransport, Tally,
};
use serde_json::json;

use crate::config::FeedConfig;

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(target_arch = "wasm32", derive(tsify::Tsify))]
#[cfg_attr(target_arch = "wasm32", tsify(into_wasm_abi, from_wasm_abi))]
pub struct Comment {
    /// Empty until the server has assigned one.
    pub id: String,
    pub entry_id: String,
    pub author_id: String,
    pub author_name: String,
    pub content: String,
    #[cfg_attr(target_arch = "wasm32", tsify(type = "string"))]
    pub created_at: DateTime<Utc>,
}

impl ListItem for Comment {
    fn matches_placeholder(&self, placeholder: &Self, tolerance: Duration) -> bool {
        let apart = (self.created_at - placeholder.created_at)
            .num_milliseconds()
            .unsigned_abs();
        self.entry_id == placeholder.entry_id
            && self.author_id == placeholder.author_id
            && self.content == placeholder.content
            && u128::from(apart) <= tolerance.as_millis()
    }
}

/// One displayed row, in the shape the UI renders.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(target_arch = "wasm32", derive(tsify::Tsify))]
#[cfg_attr(target_arch = "wasm32", tsify(into_wasm_abi))]
pub struct CommentRow {
    /// `temp-N` while the comment only exists locally.
    pub temp_id: Option<String>,
    pub comment: Comment,
}

impl From<&Row<Comment>> for CommentRow {
    fn from(row: &Row<Comment>) -> Self {
        match row {
            Row::Placeholder { temp_id, item } => CommentRow {
                temp_id: Some(temp_id.to_string()),
                comment: item.clone(),
            },
            Row::Confirmed(item) => CommentRow {
                temp_id: None,
                comment: item.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommentError {
    #[error("comment is empty")]
    Empty,
    #[error("comment is {len} characters, the limit is {max}")]
    TooLong { len: usize, max: usize },
}

pub struct CommentDrawer {
    entry_id: String,
    comments: ListBinding<Comment>,
    count: Binding<u64, Tally>,
    gateway: Rc<MutationGateway>,
    max_chars: usize,
}

impl CommentDrawer {
    pub fn new(
        entry_id: impl Into<String>,
        seed: ListWindow<Comment>,
        seed_count: u64,
        config: &FeedConfig,
        clock: Rc<dyn Clock>,
        gateway: Rc<MutationGateway>,
    ) -> Self {
        Self {
            entry_id: entry_id.into(),
            comments: ListBinding::new(seed, config.placeholder_window()),
            count: Binding::new(seed_count, Tally, config.comment_count_config(), clock),
            gateway,
            max_chars: config.max_comment_chars,
        }
    }

    pub fn entry_id(&self) -> &str {
        &self.entry_id
    }

    pub fn rows(&self) -> Vec<CommentRow> {
        self.comments.displayed().iter().map(CommentRow::from).collect()
    }

    pub fn count(&self) -> u64 {
        self.count.displayed()
    }

    pub fn has_more(&self) -> bool {
        self.comments.has_more()
    }

    pub fn push_window(&self, window: ListWindow<Comment>) {
        self.comments.push_window(window);
    }

    pub fn push_count(&self, count: u64) {
        self.count.push(count);
    }

    pub fn subscribe_to<L, C>(&self, comments: &L, counts: &C)
    where
        L: SubscriptionTransport<ListWindow<Comment>> + ?Sized,
        C: SubscriptionTransport<u64> + ?Sized,
    {
        self.comments
            .subscribe_to(comments, &SubscriptionKey::new(&self.entry_id, "comments"));
        self.count
            .subscribe_to(counts, &SubscriptionKey::new(&self.entry_id, "comment_count"));
    }

    pub fn on_rows(&self, listener: impl Fn(Vec<CommentRow>) + 'static) -> ListenerKey {
        self.comments
            .subscribe(move |rows| listener(rows.iter().map(CommentRow::from).collect()))
    }

    pub fn on_count(&self, listener: impl Fn(u64) + 'static) -> ListenerKey {
        self.count.subscribe(move |count| listener(*count))
    }

    /// Post a comment. It shows up at the top right away, and the count goes up by one.
    pub fn post(
        &self,
        author_id: &str,
        author_name: &str,
        text: &str,
    ) -> Result<Submission, CommentError> {
        let content = text.trim();
        if content.is_empty() {
            return Err(CommentError::Empty);
        }
        let len = content.chars().count();
        if len > self.max_chars {
            return Err(CommentError::TooLong {
                len,
                max: self.max_chars,
            });
        }

        let draft = Comment {
            id: String::new(),
            entry_id: self.entry_id.clone(),
            author_id: author_id.to_string(),
            author_name: author_name.to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
        };
        let mutation = Mutation::new(
            "comments:add",
            json!({"entryId": self.entry_id, "content": content}),
        );

        Ok(self.gateway.submit(mutation, |stage| {
            stage.placeholder(&self.comments, draft);
            stage.predict(&self.count, |count| count + 1);
        }))
    }

    pub fn teardown(&self) {
        self.comments.teardown();
        self.count.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestBackend;
    use futures::executor::block_on;
    use hunch::{MutationError, MutationOutcome, Settled};

    fn drawer(backend: &TestBackend, seed_count: u64) -> CommentDrawer {
        CommentDrawer::new(
            "entry-1",
            ListWindow {
                items: vec![],
                has_more: false,
            },
            seed_count,
            &FeedConfig::default(),
            backend.clock(),
            backend.gateway(),
        )
    }

    #[test]
    fn test_rejects_empty_and_oversized() {
        let backend = TestBackend::signed_in();
        let drawer = drawer(&backend, 0);

        assert_eq!(drawer.post("u1", "Ada", "   \n").err(), Some(CommentError::Empty));
        let long = "x".repeat(2_001);
        assert_eq!(
            drawer.post("u1", "Ada", &long).err(),
            Some(CommentError::TooLong {
                len: 2_001,
                max: 2_000
            })
        );
        assert!(backend.endpoint.writes.borrow().is_empty());
        assert!(drawer.rows().is_empty());
    }

    #[test]
    fn test_placeholder_until_server_copy_arrives() {
        let backend = TestBackend::signed_in();
        let drawer = drawer(&backend, 4);

        let submission = drawer.post("u1", "Ada", "  nice piece  ").unwrap();
        let rows = drawer.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].temp_id.as_deref(), Some("temp-1"));
        assert_eq!(rows[0].comment.content, "nice piece");
        assert_eq!(drawer.count(), 5);

        backend
            .endpoint
            .resolve(0, MutationOutcome::Confirmed(json!("c-77")));
        assert!(matches!(block_on(submission), Settled::Confirmed(_)));

        let server_copy = Comment {
            id: "c-77".to_string(),
            ..rows[0].comment.clone()
        };
        drawer.push_window(ListWindow {
            items: vec![server_copy],
            has_more: true,
        });
        drawer.push_count(5);

        let rows = drawer.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].temp_id, None);
        assert_eq!(rows[0].comment.id, "c-77");
        assert!(drawer.has_more());
        assert_eq!(drawer.count(), 5);
    }

    #[test]
    fn test_failed_post_removes_placeholder() {
        let backend = TestBackend::signed_in();
        let drawer = drawer(&backend, 4);
        drawer.push_count(4);

        let submission = drawer.post("u1", "Ada", "hello").unwrap();
        backend.endpoint.resolve(
            0,
            MutationOutcome::Failed(MutationError::VerificationRequired),
        );
        block_on(submission);

        assert!(drawer.rows().is_empty());
        assert_eq!(drawer.count(), 4);
        let notices = backend.notifier.notices.borrow();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].title, "Verify your email");
    }
}
