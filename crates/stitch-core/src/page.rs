//! Cursor pagination primitives shared by every paginated resource.

use std::hash::Hash;

use serde::{Deserialize, Serialize};

/// Opaque pagination token returned by the data source.
///
/// The client never inspects the contents; it only hands the token back on
/// the next page request. The feed endpoints use numeric ids, the closet
/// endpoint uses encoded composite keys — both travel through here unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(token: impl Into<String>) -> Self {
        Cursor(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Cursor {
    fn from(s: &str) -> Self {
        Cursor(s.to_string())
    }
}

impl std::fmt::Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One fetched page of items.
///
/// Invariant: `has_more` is false whenever `next_cursor` is absent; servers
/// that return a trailing cursor with an explicit exhaustion flag are
/// normalized by [`Page::exhausted`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<Cursor>,
    pub has_more: bool,
}

impl<T> Page<T> {
    /// True when this page ends the sequence: the server either signalled
    /// exhaustion or stopped producing cursors.
    pub fn exhausted(&self) -> bool {
        !self.has_more || self.next_cursor.is_none()
    }

    /// An empty terminal page.
    pub fn empty() -> Self {
        Page {
            items: Vec::new(),
            next_cursor: None,
            has_more: false,
        }
    }
}

/// Identity of an item within a paginated sequence.
///
/// Adjacent pages can overlap when the server's underlying data shifts
/// between requests; the pager deduplicates on this identity.
pub trait PageItem {
    type Id: Eq + Hash + Clone;

    fn identity(&self) -> Self::Id;
}
