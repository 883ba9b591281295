//! Narrow one-shot operations that don't fit the pager or the pipeline.

use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use stitch_core::ClothesAttributes;

use crate::ApiError;
use crate::client::ApiClient;

/// Payload for creating one feed post from already-uploaded files.
#[derive(Debug, Clone, Default)]
pub struct NewFeed {
    pub file_ids: Vec<u64>,
    pub content: Option<String>,
    pub clothes_ids: Vec<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedFeed {
    feed_id: u64,
}

/// Full detail of one closet item.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClothesDetail {
    pub clothes_id: u64,
    pub product_name: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(flatten)]
    pub attributes: ClothesAttributes,
    #[serde(default)]
    pub image_urls: Vec<String>,
}

impl ApiClient {
    /// `POST /feeds/{id}/likes`.
    pub async fn like_feed(&self, feed_id: u64) -> Result<(), ApiError> {
        self.request_empty(Method::POST, &format!("/feeds/{feed_id}/likes"), None)
            .await
    }

    /// `DELETE /feeds/{id}/likes`.
    pub async fn unlike_feed(&self, feed_id: u64) -> Result<(), ApiError> {
        self.request_empty(Method::DELETE, &format!("/feeds/{feed_id}/likes"), None)
            .await
    }

    /// `POST /feeds`; optional fields are omitted from the body entirely.
    pub async fn create_feed(&self, feed: &NewFeed) -> Result<u64, ApiError> {
        let mut body = json!({ "fileIds": feed.file_ids });
        if let Some(content) = &feed.content {
            body["content"] = json!(content);
        }
        if !feed.clothes_ids.is_empty() {
            body["clothesIds"] = json!(feed.clothes_ids);
        }
        let created: CreatedFeed = self.request(Method::POST, "/feeds", Some(body)).await?;
        Ok(created.feed_id)
    }

    /// `GET /closet/{id}`.
    pub async fn clothes_detail(&self, clothes_id: u64) -> Result<ClothesDetail, ApiError> {
        self.request(Method::GET, &format!("/closet/{clothes_id}"), None)
            .await
    }

    /// `DELETE /closet/{id}`.
    pub async fn delete_clothes(&self, clothes_id: u64) -> Result<(), ApiError> {
        self.request_empty(Method::DELETE, &format!("/closet/{clothes_id}"), None)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stitch_core::Category;

    #[test]
    fn clothes_detail_decodes_flattened_attributes() {
        let raw = r#"{
            "clothesId": 3,
            "productName": "Wide pants",
            "category": "BOTTOM",
            "materials": ["cotton"],
            "colors": [],
            "imageUrls": ["https://cdn/x.png"]
        }"#;
        let detail: ClothesDetail = serde_json::from_str(raw).unwrap();
        assert_eq!(detail.clothes_id, 3);
        assert_eq!(detail.attributes.category, Some(Category::Bottom));
        assert_eq!(detail.attributes.materials, vec!["cotton"]);
        assert!(detail.brand.is_none());
    }
}
