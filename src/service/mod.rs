pub mod http;

pub use http::HttpReviewService;

use std::future::Future;

use serde_json::Value;

use crate::error::ServiceError;
use crate::models::PropertyKey;

/// Remote side of the review dashboard
pub trait ReviewService: Send + Sync {
    /// Fetch the raw review listing, optionally scoped to one property
    ///
    /// The body is returned untouched; shaping it is the normalizer's job.
    fn fetch_reviews(
        &self,
        property: Option<&PropertyKey>,
    ) -> impl Future<Output = Result<Value, ServiceError>> + Send;

    /// Record a moderation decision for one review
    fn update_approval(
        &self,
        review_id: &str,
        approved: bool,
    ) -> impl Future<Output = Result<(), ServiceError>> + Send;
}
