//! Client core of the feed reader: the engagement buttons, comment drawer, feed and trending sidebar,
//! all built on `hunch` bindings so the UI answers a click before the backend does.

pub mod auth;
pub mod comments;
pub mod config;
pub mod engagement;
pub mod feed;
pub mod notifications;
pub mod trending;
pub mod utils;

#[cfg(target_arch = "wasm32")]
pub mod wasm;

#[cfg(test)]
mod test_support;

use std::rc::Rc;

use hunch::convex::{ConvexConfig, ConvexEndpoint};
use hunch::{Clock, ListWindow, MutationEndpoint, MutationGateway, Notifier, Scheduler};

use crate::auth::Session;
use crate::comments::{Comment, CommentDrawer};
use crate::config::FeedConfig;
use crate::engagement::{EngagementSnapshot, Interaction, ToggleButton};
use crate::feed::{FeedPager, PageSource};
use crate::notifications::FeedCopy;
use crate::trending::{TrendingCache, TrendingSource, TrendingWidget};

/// Everything the bindings on one page share.
pub struct FeedApp {
    config: FeedConfig,
    clock: Rc<dyn Clock>,
    session: Rc<Session>,
    gateway: Rc<MutationGateway>,
    trending_cache: Rc<TrendingCache>,
}

impl FeedApp {
    pub fn new(
        config: FeedConfig,
        clock: Rc<dyn Clock>,
        session: Rc<Session>,
        endpoint: Rc<dyn MutationEndpoint>,
        notifier: Rc<dyn Notifier>,
        scheduler: Option<Rc<dyn Scheduler>>,
    ) -> Self {
        let mut gateway = MutationGateway::new(session.clone(), endpoint, notifier)
            .with_copy(Rc::new(FeedCopy))
            .announce_success(config.announce_success);
        if let Some(scheduler) = scheduler {
            gateway = gateway.with_scheduler(scheduler);
        }
        let trending_cache = Rc::new(TrendingCache::new(config.trending_ttl()));

        Self {
            config,
            clock,
            session,
            gateway: Rc::new(gateway),
            trending_cache,
        }
    }

    /// The production endpoint: the configured Convex deployment, authorized with the session's token.
    pub fn convex_endpoint(config: &FeedConfig, session: &Rc<Session>) -> ConvexEndpoint {
        let session = Rc::clone(session);
        ConvexEndpoint::new(
            ConvexConfig {
                deployment_url: config.deployment_url.clone(),
            },
            Rc::new(move || session.access_token()),
        )
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    pub fn session(&self) -> &Rc<Session> {
        &self.session
    }

    pub fn gateway(&self) -> &Rc<MutationGateway> {
        &self.gateway
    }

    pub fn toggle_button(
        &self,
        interaction: Interaction,
        target_id: impl Into<String>,
        seed: EngagementSnapshot,
    ) -> ToggleButton {
        ToggleButton::new(
            interaction,
            target_id,
            seed,
            self.config.binding_config(interaction),
            Rc::clone(&self.clock),
            Rc::clone(&self.gateway),
        )
    }

    pub fn comment_drawer(
        &self,
        entry_id: impl Into<String>,
        seed: ListWindow<Comment>,
        seed_count: u64,
    ) -> CommentDrawer {
        CommentDrawer::new(
            entry_id,
            seed,
            seed_count,
            &self.config,
            Rc::clone(&self.clock),
            Rc::clone(&self.gateway),
        )
    }

    pub fn feed_pager(&self, source: Rc<dyn PageSource>) -> FeedPager {
        FeedPager::new(source, self.config.feed_page_size)
    }

    pub fn trending_widget(&self, source: Rc<dyn TrendingSource>) -> TrendingWidget {
        TrendingWidget::new(
            source,
            Rc::clone(&self.trending_cache),
            self.config.trending_size,
        )
    }
}
