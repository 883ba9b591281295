//! Registration-pipeline backends: presigned uploads and the analysis API.

use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use stitch_pipeline::{
    AnalysisService, BatchPoll, BatchReceipt, CommitRequest, FileMeta, FileStore, ServiceFuture,
    UploadSlot,
};

use crate::client::ApiClient;

/// One assigned slot as the presigned-url endpoint returns it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PresignedSlot {
    file_id: u64,
    presigned_url: String,
    #[serde(default)]
    #[allow(dead_code)]
    object_key: Option<String>,
}

impl From<PresignedSlot> for UploadSlot {
    fn from(slot: PresignedSlot) -> Self {
        UploadSlot {
            file_id: slot.file_id,
            upload_url: slot.presigned_url,
        }
    }
}

fn slot_request_body(purpose: &str, files: &[FileMeta]) -> serde_json::Value {
    json!({
        "purpose": purpose,
        "files": files
            .iter()
            .map(|f| json!({ "name": f.name, "type": f.mime_type }))
            .collect::<Vec<_>>(),
    })
}

impl FileStore for ApiClient {
    fn request_upload_slots<'a>(
        &'a self,
        purpose: &'a str,
        files: &'a [FileMeta],
    ) -> ServiceFuture<'a, Vec<UploadSlot>> {
        Box::pin(async move {
            let body = slot_request_body(purpose, files);
            let slots: Vec<PresignedSlot> = self
                .request(Method::POST, "/presigned-url", Some(body))
                .await
                .map_err(|e| e.to_string())?;
            Ok(slots.into_iter().map(UploadSlot::from).collect())
        })
    }

    fn put_object<'a>(
        &'a self,
        upload_url: &'a str,
        mime_type: &'a str,
        bytes: &'a [u8],
    ) -> ServiceFuture<'a, ()> {
        Box::pin(async move {
            self.put_raw(upload_url, mime_type, bytes.to_vec())
                .await
                .map_err(|e| e.to_string())
        })
    }
}

impl AnalysisService for ApiClient {
    fn submit_batch<'a>(&'a self, file_ids: &'a [u64]) -> ServiceFuture<'a, BatchReceipt> {
        Box::pin(async move {
            self.request(
                Method::POST,
                "/ai/analysis-batches",
                Some(json!({ "fileIds": file_ids })),
            )
            .await
            .map_err(|e| e.to_string())
        })
    }

    fn poll_batch<'a>(&'a self, batch_id: &'a str) -> ServiceFuture<'a, BatchPoll> {
        Box::pin(async move {
            let path = format!(
                "/ai/analysis-batches/{}",
                urlencoding::encode(batch_id)
            );
            self.request(Method::GET, &path, None)
                .await
                .map_err(|e| e.to_string())
        })
    }

    fn commit_item<'a>(&'a self, request: &'a CommitRequest) -> ServiceFuture<'a, ()> {
        Box::pin(async move {
            let body = serde_json::to_value(request).map_err(|e| e.to_string())?;
            self.request_empty(Method::POST, "/closet", Some(body))
                .await
                .map_err(|e| e.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_body_uses_the_wire_field_names() {
        let files = vec![FileMeta {
            name: "a.png".into(),
            mime_type: "image/png".into(),
        }];
        let body = slot_request_body("CLOTHES", &files);
        assert_eq!(body["purpose"], "CLOTHES");
        assert_eq!(body["files"][0]["name"], "a.png");
        assert_eq!(body["files"][0]["type"], "image/png");
    }

    #[test]
    fn presigned_slot_maps_to_upload_slot() {
        let raw = r#"{"fileId": 7, "objectKey": "clothes/7.png", "presignedUrl": "https://s3/x"}"#;
        let slot: PresignedSlot = serde_json::from_str(raw).unwrap();
        let slot = UploadSlot::from(slot);
        assert_eq!(slot.file_id, 7);
        assert_eq!(slot.upload_url, "https://s3/x");
    }

    #[test]
    fn commit_request_flattens_the_form() {
        let request = CommitRequest {
            task_id: "t1".into(),
            file_id: 9,
            form: stitch_pipeline::ItemForm::default(),
        };
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["taskId"], "t1");
        assert_eq!(body["fileId"], 9);
        // Flattened form fields sit at the top level.
        assert!(body.get("productName").is_some());
        assert!(body.get("form").is_none());
    }
}
