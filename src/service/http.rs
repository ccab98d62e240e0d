use std::time::Duration;

use reqwest::{Client, Url};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument};

use super::ReviewService;
use crate::config::ServiceConfig;
use crate::error::ServiceError;
use crate::models::PropertyKey;
use crate::normalizer::{normalize, Normalized};

/// Review service reached over the dashboard's JSON API
pub struct HttpReviewService {
    client: Client,
    base_url: Url,
}

#[derive(Debug, Serialize)]
struct ApprovalRequest {
    approved: bool,
}

impl HttpReviewService {
    /// `base_url` is the API root, e.g. `http://localhost:8080/api`
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ServiceError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ServiceError::InvalidBaseUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ServiceError::InvalidBaseUrl(base_url.to_string()));
        }

        let client = Client::builder().timeout(timeout).build()?;

        info!(base_url = %base_url, "Created review service client");

        Ok(Self { client, base_url })
    }

    pub fn from_config(config: &ServiceConfig) -> Result<Self, ServiceError> {
        Self::new(&config.base_url, Duration::from_secs(config.timeout_secs))
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // cannot-be-a-base URLs are rejected in `new`, so this always succeeds
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn with_property(mut url: Url, property: Option<&PropertyKey>) -> Url {
        if let Some(property) = property {
            url.query_pairs_mut()
                .append_pair("propertyId", property.as_str());
        }
        url
    }

    async fn get_json(&self, url: Url) -> Result<Value, ServiceError> {
        debug!(url = %url, "GET");

        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        debug!(bytes = text.len(), "Received response body");

        // A non-JSON body is still a "response": let the normalizer flag it
        Ok(serde_json::from_str::<Value>(&text).unwrap_or_else(|err| {
            debug!(error = %err, "Response body is not JSON");
            Value::String(text)
        }))
    }

    /// Reviews of one property, as served by `/reviews/property/{id}`
    pub async fn property_reviews(&self, property: &PropertyKey) -> Result<Normalized, ServiceError> {
        let url = self.endpoint(&["reviews", "property", property.as_str()]);
        Ok(normalize(&self.get_json(url).await?))
    }

    /// Server-side approved listing, optionally scoped to one property
    pub async fn approved_reviews(
        &self,
        property: Option<&PropertyKey>,
    ) -> Result<Normalized, ServiceError> {
        let url = Self::with_property(self.endpoint(&["reviews", "approved"]), property);
        Ok(normalize(&self.get_json(url).await?))
    }
}

impl ReviewService for HttpReviewService {
    #[instrument(skip(self))]
    async fn fetch_reviews(&self, property: Option<&PropertyKey>) -> Result<Value, ServiceError> {
        let url = Self::with_property(self.endpoint(&["reviews", "hostaway"]), property);
        self.get_json(url).await
    }

    #[instrument(skip(self))]
    async fn update_approval(&self, review_id: &str, approved: bool) -> Result<(), ServiceError> {
        let url = self.endpoint(&["reviews", review_id, "approve"]);

        let response = self
            .client
            .patch(url)
            .json(&ApprovalRequest { approved })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        info!(review_id, approved, "Approval recorded by review service");

        Ok(())
    }
}
