//! HTTP client for the closet service REST API (`/api/v1`).
//!
//! Every response body uses the envelope `{ code, message, data }`. The
//! client unwraps the envelope, attaches a bearer token from the injected
//! [`CredentialProvider`], and transparently refreshes an expired token once
//! before giving up with [`ApiError::Unauthorized`].

use serde::Deserialize;
use thiserror::Error;

mod actions;
mod client;
mod registry;
mod sources;

pub use actions::{ClothesDetail, NewFeed};
pub use client::ApiClient;
pub use sources::{
    ClosetSource, CommentSource, CoordHistorySource, FeedLikeSource, FeedSource, ReplySource,
    UserFeedSource,
};

/// Standard response envelope wrapped around every JSON body.
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ApiEnvelope<T> {
    pub code: i64,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<T>,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("authentication failed")]
    Unauthorized,
    #[error("malformed response: {0}")]
    Decode(String),
    #[error("response carried no data")]
    MissingData,
}
