use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod config_file;
pub mod credentials;
pub mod page;

// Re-export for convenience
pub use credentials::{CredentialProvider, MemoryCredentials};
pub use page::{Cursor, Page, PageItem};

/// Clothing category as the service defines it. `All` is a filter value,
/// never a stored category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    All,
    Top,
    Bottom,
    Onepiece,
    Shoes,
    Accessory,
    Etc,
}

impl Category {
    /// Query-string value for this category.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::All => "ALL",
            Category::Top => "TOP",
            Category::Bottom => "BOTTOM",
            Category::Onepiece => "ONEPIECE",
            Category::Shoes => "SHOES",
            Category::Accessory => "ACCESSORY",
            Category::Etc => "ETC",
        }
    }
}

/// AI-suggested or user-confirmed attributes of one clothing item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClothesAttributes {
    pub category: Option<Category>,
    #[serde(default)]
    pub materials: Vec<String>,
    #[serde(default)]
    pub colors: Vec<String>,
    #[serde(default)]
    pub style_tags: Vec<String>,
}

/// One item in a closet list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClothesItem {
    pub clothes_id: u64,
    pub product_name: String,
    pub category: Category,
    pub image_url: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
}

impl PageItem for ClothesItem {
    type Id = u64;

    fn identity(&self) -> u64 {
        self.clothes_id
    }
}

/// One entry in the feed home list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedItem {
    pub feed_id: u64,
    pub author_nickname: String,
    #[serde(default)]
    pub image_urls: Vec<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub like_count: u64,
    #[serde(default)]
    pub comment_count: u64,
    #[serde(default)]
    pub liked_by_me: bool,
}

impl PageItem for FeedItem {
    type Id = u64;

    fn identity(&self) -> u64 {
        self.feed_id
    }
}

/// One comment (or reply) under a feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentItem {
    pub comment_id: u64,
    pub author_nickname: String,
    pub content: String,
    #[serde(default)]
    pub parent_id: Option<u64>,
    #[serde(default)]
    pub reply_count: u64,
    #[serde(default)]
    pub like_count: u64,
}

impl PageItem for CommentItem {
    type Id = u64;

    fn identity(&self) -> u64 {
        self.comment_id
    }
}

/// One user in a feed's like list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeItem {
    pub user_id: u64,
    pub nickname: String,
    #[serde(default)]
    pub profile_image_url: Option<String>,
}

impl PageItem for LikeItem {
    type Id = u64;

    fn identity(&self) -> u64 {
        self.user_id
    }
}

/// One past AI-coordination search.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordHistoryItem {
    pub coordination_id: u64,
    pub tpo: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub liked: bool,
}

impl PageItem for CoordHistoryItem {
    type Id = u64;

    fn identity(&self) -> u64 {
        self.coordination_id
    }
}

/// Errors from the config loader.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("config error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_serializes_screaming_snake() {
        let json = serde_json::to_string(&Category::Onepiece).unwrap();
        assert_eq!(json, "\"ONEPIECE\"");
        assert_eq!(Category::Accessory.as_str(), "ACCESSORY");
    }

    #[test]
    fn clothes_item_round_trips_camel_case() {
        let raw = r#"{
            "clothesId": 7,
            "productName": "Linen shirt",
            "category": "TOP",
            "imageUrl": null
        }"#;
        let item: ClothesItem = serde_json::from_str(raw).unwrap();
        assert_eq!(item.identity(), 7);
        assert_eq!(item.category, Category::Top);
        assert!(item.brand.is_none());
    }

    #[test]
    fn attributes_default_to_empty_sets() {
        let attrs: ClothesAttributes = serde_json::from_str("{}").unwrap();
        assert!(attrs.category.is_none());
        assert!(attrs.materials.is_empty());
        assert!(attrs.style_tags.is_empty());
    }
}
