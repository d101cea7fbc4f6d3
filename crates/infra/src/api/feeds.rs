//! Curated indicator feeds

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use threatlink_core::RequestDispatcher;
use threatlink_domain::{ApiResult, RequestSpec};
use tracing::{debug, instrument};
use urlencoding::encode;

use super::models::{Indicator, Page};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feed {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, alias = "itemCount")]
    pub item_count: Option<u64>,
    #[serde(default, alias = "updatedAt")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct FeedList {
    #[serde(default)]
    feeds: Vec<Feed>,
}

#[derive(Clone)]
pub struct FeedsClient {
    dispatcher: Arc<RequestDispatcher>,
}

impl FeedsClient {
    pub fn new(dispatcher: Arc<RequestDispatcher>) -> Self {
        Self { dispatcher }
    }

    #[instrument(skip(self))]
    pub async fn list(&self) -> ApiResult<Vec<Feed>> {
        let list: FeedList =
            self.dispatcher.execute_json(RequestSpec::get("/v1/feeds").build()).await?;
        debug!(count = list.feeds.len(), "feeds listed");
        Ok(list.feeds)
    }

    /// One page of a feed; pass the previous page's `next_cursor` to continue
    #[instrument(skip(self))]
    pub async fn items(
        &self,
        feed_id: &str,
        cursor: Option<&str>,
        limit: Option<u32>,
    ) -> ApiResult<Page<Indicator>> {
        let spec = RequestSpec::get(format!("/v1/feeds/{}/items", encode(feed_id)))
            .query_opt("cursor", cursor)
            .query_opt("limit", limit)
            .build();
        self.dispatcher.execute_json(spec).await
    }

    /// Follow cursors until the feed is exhausted or `max_pages` were read
    #[instrument(skip(self))]
    pub async fn collect_items(
        &self,
        feed_id: &str,
        max_pages: usize,
    ) -> ApiResult<Vec<Indicator>> {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..max_pages {
            let page = self.items(feed_id, cursor.as_deref(), None).await?;
            let more = page.has_more();
            items.extend(page.items);
            if !more {
                break;
            }
            cursor = page.next_cursor;
        }

        debug!(count = items.len(), "feed collected");
        Ok(items)
    }
}
