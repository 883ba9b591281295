//! [`PageSource`] implementations for every paginated list endpoint.
//!
//! Each source is a thin struct naming one endpoint; the pager drives it
//! through the trait without knowing which list it is paging.

use std::sync::Arc;

use reqwest::Method;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use stitch_core::{
    Category, ClothesItem, CommentItem, CoordHistoryItem, Cursor, FeedItem, LikeItem, Page,
};
use stitch_pager::{PageSource, SourceFuture};

use crate::client::ApiClient;

/// Wire shape of one page in a list response.
///
/// Older endpoints omit the boolean and signal exhaustion with a missing
/// cursor, so `has_more` is inferred when absent.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageData<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    #[serde(default)]
    next_cursor: Option<String>,
    #[serde(default, alias = "hasNext")]
    has_more: Option<bool>,
}

impl<T> PageData<T> {
    fn into_page(self) -> Page<T> {
        let has_more = self.has_more.unwrap_or(self.next_cursor.is_some());
        Page {
            items: self.items,
            next_cursor: self.next_cursor.map(Cursor::new),
            has_more,
        }
    }
}

/// Build `path?limit=..&extra..&cursor_param=..` with encoded values.
fn paged(
    path: &str,
    cursor_param: &str,
    cursor: Option<&Cursor>,
    limit: usize,
    extra: &[(&str, &str)],
) -> String {
    let mut out = format!("{path}?limit={limit}");
    for (key, value) in extra {
        out.push_str(&format!("&{key}={}", urlencoding::encode(value)));
    }
    if let Some(cursor) = cursor {
        out.push_str(&format!(
            "&{cursor_param}={}",
            urlencoding::encode(cursor.as_str())
        ));
    }
    out
}

async fn fetch<T: DeserializeOwned>(client: &ApiClient, path: String) -> Result<Page<T>, String> {
    client
        .request::<PageData<T>>(Method::GET, &path, None)
        .await
        .map(PageData::into_page)
        .map_err(|e| e.to_string())
}

/// The feed home list, `GET /feeds?after&limit`.
pub struct FeedSource {
    client: Arc<ApiClient>,
    page_size: usize,
}

impl FeedSource {
    pub fn new(client: Arc<ApiClient>, page_size: usize) -> Self {
        FeedSource { client, page_size }
    }
}

impl PageSource<FeedItem> for FeedSource {
    fn name(&self) -> &str {
        "feeds"
    }

    fn fetch_page<'a>(&'a self, cursor: Option<&'a Cursor>) -> SourceFuture<'a, FeedItem> {
        Box::pin(async move {
            let path = paged("/feeds", "after", cursor, self.page_size, &[]);
            fetch(&self.client, path).await
        })
    }
}

/// One user's feed list, `GET /users/{id}/feeds?after&limit`.
pub struct UserFeedSource {
    client: Arc<ApiClient>,
    user_id: u64,
    page_size: usize,
}

impl UserFeedSource {
    pub fn new(client: Arc<ApiClient>, user_id: u64, page_size: usize) -> Self {
        UserFeedSource {
            client,
            user_id,
            page_size,
        }
    }
}

impl PageSource<FeedItem> for UserFeedSource {
    fn name(&self) -> &str {
        "user-feeds"
    }

    fn fetch_page<'a>(&'a self, cursor: Option<&'a Cursor>) -> SourceFuture<'a, FeedItem> {
        Box::pin(async move {
            let base = format!("/users/{}/feeds", self.user_id);
            let path = paged(&base, "after", cursor, self.page_size, &[]);
            fetch(&self.client, path).await
        })
    }
}

/// A closet list with a category filter: the caller's own closet
/// (`GET /closet`) or another user's (`GET /users/{id}/closet`).
pub struct ClosetSource {
    client: Arc<ApiClient>,
    user_id: Option<u64>,
    category: Category,
    page_size: usize,
}

impl ClosetSource {
    pub fn mine(client: Arc<ApiClient>, category: Category, page_size: usize) -> Self {
        ClosetSource {
            client,
            user_id: None,
            category,
            page_size,
        }
    }

    pub fn for_user(
        client: Arc<ApiClient>,
        user_id: u64,
        category: Category,
        page_size: usize,
    ) -> Self {
        ClosetSource {
            client,
            user_id: Some(user_id),
            category,
            page_size,
        }
    }
}

impl PageSource<ClothesItem> for ClosetSource {
    fn name(&self) -> &str {
        "closet"
    }

    fn fetch_page<'a>(&'a self, cursor: Option<&'a Cursor>) -> SourceFuture<'a, ClothesItem> {
        Box::pin(async move {
            let base = match self.user_id {
                Some(id) => format!("/users/{id}/closet"),
                None => "/closet".to_string(),
            };
            let path = paged(
                &base,
                "cursor",
                cursor,
                self.page_size,
                &[("category", self.category.as_str())],
            );
            fetch(&self.client, path).await
        })
    }
}

/// Top-level comments of one feed, `GET /feeds/{id}/comments?after&limit`.
pub struct CommentSource {
    client: Arc<ApiClient>,
    feed_id: u64,
    page_size: usize,
}

impl CommentSource {
    pub fn new(client: Arc<ApiClient>, feed_id: u64, page_size: usize) -> Self {
        CommentSource {
            client,
            feed_id,
            page_size,
        }
    }
}

impl PageSource<CommentItem> for CommentSource {
    fn name(&self) -> &str {
        "comments"
    }

    fn fetch_page<'a>(&'a self, cursor: Option<&'a Cursor>) -> SourceFuture<'a, CommentItem> {
        Box::pin(async move {
            let base = format!("/feeds/{}/comments", self.feed_id);
            let path = paged(&base, "after", cursor, self.page_size, &[]);
            fetch(&self.client, path).await
        })
    }
}

/// Replies under one comment,
/// `GET /feeds/{id}/comments/{id}/replies?after&limit`.
pub struct ReplySource {
    client: Arc<ApiClient>,
    feed_id: u64,
    comment_id: u64,
    page_size: usize,
}

impl ReplySource {
    pub fn new(client: Arc<ApiClient>, feed_id: u64, comment_id: u64, page_size: usize) -> Self {
        ReplySource {
            client,
            feed_id,
            comment_id,
            page_size,
        }
    }
}

impl PageSource<CommentItem> for ReplySource {
    fn name(&self) -> &str {
        "replies"
    }

    fn fetch_page<'a>(&'a self, cursor: Option<&'a Cursor>) -> SourceFuture<'a, CommentItem> {
        Box::pin(async move {
            let base = format!("/feeds/{}/comments/{}/replies", self.feed_id, self.comment_id);
            let path = paged(&base, "after", cursor, self.page_size, &[]);
            fetch(&self.client, path).await
        })
    }
}

/// Users who liked one feed, `GET /feeds/{id}/likes?after&limit`.
pub struct FeedLikeSource {
    client: Arc<ApiClient>,
    feed_id: u64,
    page_size: usize,
}

impl FeedLikeSource {
    pub fn new(client: Arc<ApiClient>, feed_id: u64, page_size: usize) -> Self {
        FeedLikeSource {
            client,
            feed_id,
            page_size,
        }
    }
}

impl PageSource<LikeItem> for FeedLikeSource {
    fn name(&self) -> &str {
        "feed-likes"
    }

    fn fetch_page<'a>(&'a self, cursor: Option<&'a Cursor>) -> SourceFuture<'a, LikeItem> {
        Box::pin(async move {
            let base = format!("/feeds/{}/likes", self.feed_id);
            let path = paged(&base, "after", cursor, self.page_size, &[]);
            fetch(&self.client, path).await
        })
    }
}

/// Past AI-coordination searches, `GET /ai/coordination/history`.
pub struct CoordHistorySource {
    client: Arc<ApiClient>,
    page_size: usize,
}

impl CoordHistorySource {
    pub fn new(client: Arc<ApiClient>, page_size: usize) -> Self {
        CoordHistorySource { client, page_size }
    }
}

impl PageSource<CoordHistoryItem> for CoordHistorySource {
    fn name(&self) -> &str {
        "coordination-history"
    }

    fn fetch_page<'a>(&'a self, cursor: Option<&'a Cursor>) -> SourceFuture<'a, CoordHistoryItem> {
        Box::pin(async move {
            let path = paged(
                "/ai/coordination/history",
                "after",
                cursor,
                self.page_size,
                &[],
            );
            fetch(&self.client, path).await
        })
    }
}
