use hunch::{Copywriter, Mutation, MutationError, Notice, RateLimitScope, Severity};

use crate::engagement::Interaction;

#[derive(serde::Deserialize, serde::Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    SlowDown,
    HourlyLimit,
    VerifyEmail,
    SignInRequired,
    WriteFailed,
    CommentPosted,
}

impl NoticeKind {
    pub fn for_failure(error: &MutationError) -> Self {
        match error {
            MutationError::RateLimited {
                scope: RateLimitScope::Cooldown,
            } => NoticeKind::SlowDown,
            MutationError::RateLimited {
                scope: RateLimitScope::HourlyCap,
            } => NoticeKind::HourlyLimit,
            MutationError::VerificationRequired => NoticeKind::VerifyEmail,
            MutationError::AuthRequired => NoticeKind::SignInRequired,
            MutationError::TransientWriteFailure { .. } => NoticeKind::WriteFailed,
        }
    }

    pub fn for_success(mutation: &Mutation) -> Option<Self> {
        (mutation.name == "comments:add").then_some(NoticeKind::CommentPosted)
    }

    /// `activity` completes "You're ... too quickly", e.g. "liking posts".
    pub fn show(&self, activity: &str) -> Notice {
        match self {
            NoticeKind::SlowDown => Notice::error(
                "Slow down",
                format!("You're {activity} too quickly. Please wait a moment and try again."),
            ),
            NoticeKind::HourlyLimit => Notice::error(
                "Hourly limit reached",
                format!("You've reached the hourly limit for {activity}. Please try again later."),
            ),
            NoticeKind::VerifyEmail => Notice::error(
                "Verify your email",
                format!("Please verify your email address before {activity}."),
            ),
            NoticeKind::SignInRequired => {
                Notice::error("Sign in required", "Please sign in to continue.")
            }
            NoticeKind::WriteFailed => {
                Notice::error("Error", "Something went wrong. Please try again.")
            }
            NoticeKind::CommentPosted => Notice {
                title: "Comment posted".to_string(),
                description: "Your comment is live.".to_string(),
                severity: Severity::Success,
            },
        }
    }
}

fn activity(mutation: &Mutation) -> &'static str {
    match Interaction::from_mutation_name(&mutation.name) {
        Some(Interaction::Like) => "liking posts",
        Some(Interaction::Retweet) => "retweeting",
        Some(Interaction::Follow) => "following people",
        None if mutation.name == "comments:add" => "commenting",
        None => "doing that",
    }
}

/// Notification copy for the feed reader.
#[derive(Clone, Copy, Debug, Default)]
pub struct FeedCopy;

impl Copywriter for FeedCopy {
    fn failure(&self, mutation: &Mutation, error: &MutationError) -> Notice {
        NoticeKind::for_failure(error).show(activity(mutation))
    }

    fn success(&self, mutation: &Mutation) -> Option<Notice> {
        NoticeKind::for_success(mutation).map(|kind| kind.show(activity(mutation)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_failure_copy_names_the_action() {
        let mutation = Mutation::new("follows:toggle", json!({"userId": "u1"}));
        let notice = FeedCopy.failure(
            &mutation,
            &MutationError::rate_limited(RateLimitScope::HourlyCap),
        );
        assert_eq!(notice.title, "Hourly limit reached");
        assert!(notice.description.contains("following people"));
        assert_eq!(notice.severity, Severity::Error);
    }

    #[test]
    fn test_transient_copy_is_generic() {
        let mutation = Mutation::new("likes:toggle", json!({}));
        let notice = FeedCopy.failure(&mutation, &MutationError::transient("HTTP 502"));
        assert_eq!(notice.title, "Error");
        assert!(!notice.description.contains("502"));
    }

    #[test]
    fn test_only_comments_announce_success() {
        assert!(FeedCopy.success(&Mutation::new("likes:toggle", json!({}))).is_none());
        let notice = FeedCopy
            .success(&Mutation::new("comments:add", json!({})))
            .unwrap();
        assert_eq!(notice.severity, Severity::Success);
    }
}
