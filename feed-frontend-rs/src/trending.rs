use std::rc::Rc;
use std::sync::Arc;

use chokepoint::ChokePoint;
use futures::future::LocalBoxFuture;

use crate::feed::FeedEntry;

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(target_arch = "wasm32", derive(tsify::Tsify))]
#[cfg_attr(target_arch = "wasm32", tsify(into_wasm_abi))]
pub struct TrendingEntry {
    pub entry: FeedEntry,
    /// Likes plus retweets over the trending window.
    pub score: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrendingError {
    #[error("failed to load trending entries: {0}")]
    Source(String),
}

pub trait TrendingSource {
    fn top_entries(&self, limit: usize)
    -> LocalBoxFuture<'static, Result<Vec<TrendingEntry>, TrendingError>>;
}

pub type TrendingCache = ChokePoint<usize, Vec<TrendingEntry>, TrendingError>;

/// The "trending" sidebar. Many widgets can share one cache; they then share one request too.
pub struct TrendingWidget {
    source: Rc<dyn TrendingSource>,
    cache: Rc<TrendingCache>,
    size: usize,
}

impl TrendingWidget {
    pub fn new(source: Rc<dyn TrendingSource>, cache: Rc<TrendingCache>, size: usize) -> Self {
        Self {
            source,
            cache,
            size,
        }
    }

    /// Highest score first, at most `size` entries.
    pub async fn entries(&self) -> Result<Arc<Vec<TrendingEntry>>, TrendingError> {
        let source = Rc::clone(&self.source);
        let size = self.size;
        self.cache
            .get(size, move || {
                let request = source.top_entries(size);
                async move {
                    let mut entries = request.await?;
                    entries.sort_by(|a, b| b.score.cmp(&a.score));
                    entries.truncate(size);
                    log::debug!("Loaded {} trending entries", entries.len());
                    Ok::<_, TrendingError>(entries)
                }
            })
            .await
    }

    /// Drop the cached list so the next read goes to the source.
    pub fn invalidate(&self) {
        self.cache.invalidate(&self.size);
    }
}
