use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::error::ServiceError;
use crate::models::{PropertyKey, Review};
use crate::normalizer::normalize;
use crate::repository::{FetchCompletion, RepositoryState, ReviewRepository};
use crate::service::ReviewService;
use crate::views::{self, Statistics};

/// Result of an approval toggle that reached no error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// The service accepted the decision and the local review now reflects it
    Applied { approved: bool },
    /// No review with that id is loaded; nothing was sent or changed
    UnknownReview,
}

/// Load status shown next to the dashboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadStatus {
    pub loading: bool,
    pub error: Option<String>,
}

/// Coordinates the review service with the in-memory repository
///
/// The repository lock is only held for the synchronous parts of an operation,
/// never across a call to the service.
pub struct ReviewStore<S: ReviewService> {
    service: S,
    repository: RwLock<ReviewRepository>,
}

impl<S: ReviewService> ReviewStore<S> {
    pub fn new(service: S) -> Self {
        Self::with_repository(service, ReviewRepository::new())
    }

    pub fn with_repository(service: S, repository: ReviewRepository) -> Self {
        Self {
            service,
            repository: RwLock::new(repository),
        }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Fetch reviews (all, or one property's) and merge them into the collection
    ///
    /// A body in an unexpected shape counts as an empty result. Transport errors
    /// are recorded on the repository and returned.
    #[instrument(skip(self))]
    pub async fn fetch(
        &self,
        property: Option<&PropertyKey>,
    ) -> Result<FetchCompletion, ServiceError> {
        let token = self.repository.write().await.begin_fetch();
        debug!(?token, "Fetching reviews");

        match self.service.fetch_reviews(property).await {
            Ok(body) => {
                let normalized = normalize(&body);
                let count = normalized.reviews.len();
                let completion = self.repository.write().await.complete_fetch(
                    token,
                    property,
                    Ok(normalized.reviews),
                );
                info!(count, ?completion, "Fetched reviews");
                Ok(completion)
            }
            Err(err) => {
                warn!(error = %err, "Error fetching reviews");
                self.repository
                    .write()
                    .await
                    .complete_fetch(token, property, Err(err.to_string()));
                Err(err)
            }
        }
    }

    /// Flip a review between approved and not approved
    ///
    /// The local review only changes once the service has accepted the decision.
    #[instrument(skip(self))]
    pub async fn toggle_approval(&self, id: &str) -> Result<ToggleOutcome, ServiceError> {
        let current = self.repository.read().await.find(id).map(Review::is_approved);

        match current {
            Some(approved) => self.set_approval(id, !approved).await,
            None => {
                debug!("No such review loaded, nothing to toggle");
                Ok(ToggleOutcome::UnknownReview)
            }
        }
    }

    /// Send an explicit approve or reject decision, then apply it locally
    #[instrument(skip(self))]
    pub async fn set_approval(
        &self,
        id: &str,
        approved: bool,
    ) -> Result<ToggleOutcome, ServiceError> {
        if self.repository.read().await.find(id).is_none() {
            return Ok(ToggleOutcome::UnknownReview);
        }

        if let Err(err) = self.service.update_approval(id, approved).await {
            warn!(error = %err, "Error updating approval");
            return Err(err);
        }

        // the review may have been replaced by a fetch while the call was in flight
        if self.repository.write().await.apply_approval(id, approved) {
            info!(approved, "Approval updated");
            Ok(ToggleOutcome::Applied { approved })
        } else {
            Ok(ToggleOutcome::UnknownReview)
        }
    }

    pub async fn set_filter(&self, field: &str, value: &str) -> bool {
        self.repository.write().await.set_filter(field, value)
    }

    pub async fn set_sort_key(&self, key: &str) -> bool {
        self.repository.write().await.set_sort_key(key)
    }

    /// Run `f` with exclusive access to the repository
    pub async fn update<R>(&self, f: impl FnOnce(&mut ReviewRepository) -> R) -> R {
        let mut repository = self.repository.write().await;
        f(&mut *repository)
    }

    pub async fn snapshot(&self) -> RepositoryState {
        self.repository.read().await.state().clone()
    }

    pub async fn status(&self) -> LoadStatus {
        let repository = self.repository.read().await;
        LoadStatus {
            loading: repository.state().loading,
            error: repository.state().error.clone(),
        }
    }

    pub async fn filtered_view(&self) -> Vec<Review> {
        let repository = self.repository.read().await;
        views::filtered_view(repository.state())
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn approved_view(&self, property: Option<&PropertyKey>) -> Vec<Review> {
        let repository = self.repository.read().await;
        views::approved_view(repository.reviews(), property)
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn property_list(&self) -> Vec<PropertyKey> {
        views::property_list(self.repository.read().await.reviews())
    }

    pub async fn channel_list(&self) -> Vec<String> {
        views::channel_list(self.repository.read().await.reviews())
    }

    pub async fn statistics(&self) -> Statistics {
        views::statistics(self.repository.read().await.reviews())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    use serde_json::{json, Value};
    use tokio::sync::oneshot;
    use tokio_test::{assert_err, assert_ok, assert_pending, assert_ready, task};
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::models::ApprovalStatus;
    use crate::service::HttpReviewService;

    /// Scripted review service: replies are consumed in order
    #[derive(Default)]
    struct FakeService {
        replies: Mutex<VecDeque<Result<Value, ServiceError>>>,
        gates: Mutex<VecDeque<oneshot::Receiver<Value>>>,
        fetched: Mutex<Vec<Option<PropertyKey>>>,
        approvals: Mutex<Vec<(String, bool)>>,
        reject_approvals: bool,
    }

    impl FakeService {
        fn replying(self, reply: Result<Value, ServiceError>) -> Self {
            self.replies.lock().unwrap().push_back(reply);
            self
        }

        /// Next fetch waits until the paired sender delivers its body
        fn gated(self, gate: oneshot::Receiver<Value>) -> Self {
            self.gates.lock().unwrap().push_back(gate);
            self
        }

        fn rejecting_approvals(mut self) -> Self {
            self.reject_approvals = true;
            self
        }
    }

    impl ReviewService for FakeService {
        async fn fetch_reviews(&self, property: Option<&PropertyKey>) -> Result<Value, ServiceError> {
            self.fetched.lock().unwrap().push(property.cloned());
            let gate = self.gates.lock().unwrap().pop_front();
            if let Some(gate) = gate {
                return Ok(gate.await.unwrap());
            }
            let reply = self.replies.lock().unwrap().pop_front();
            reply.unwrap_or_else(|| Ok(json!([])))
        }

        async fn update_approval(&self, review_id: &str, approved: bool) -> Result<(), ServiceError> {
            self.approvals
                .lock()
                .unwrap()
                .push((review_id.to_string(), approved));
            if self.reject_approvals {
                return Err(ServiceError::Status {
                    status: 500,
                    body: "approval store unavailable".to_string(),
                });
            }
            Ok(())
        }
    }

    fn unavailable() -> ServiceError {
        ServiceError::Status {
            status: 503,
            body: "down".to_string(),
        }
    }

    fn ids(reviews: &[Review]) -> Vec<&str> {
        reviews.iter().map(|r| r.id.as_str()).collect()
    }

    fn loaded(reviews: Vec<Review>) -> ReviewStore<FakeService> {
        ReviewStore::with_repository(FakeService::default(), ReviewRepository::with_reviews(reviews))
    }

    #[tokio::test]
    async fn test_fetch_populates_in_response_order() {
        let service = FakeService::default().replying(Ok(json!({
            "result": [{ "id": "r1", "rating": 2 }, { "id": "r2", "rating": 5 }]
        })));
        let store = ReviewStore::new(service);

        let completion = assert_ok!(store.fetch(None).await);
        assert_eq!(completion, FetchCompletion::Applied);

        let state = store.snapshot().await;
        assert_eq!(ids(&state.reviews), vec!["r1", "r2"]);
        assert!(!state.loading);
        assert_eq!(state.error, None);
    }

    #[tokio::test]
    async fn test_fetch_failure_records_error_and_keeps_reviews() {
        let service = FakeService::default().replying(Err(unavailable()));
        let store = ReviewStore::with_repository(
            service,
            ReviewRepository::with_reviews(vec![Review::new("kept", "A", "airbnb")]),
        );

        let err = assert_err!(store.fetch(None).await);
        assert!(matches!(err, ServiceError::Status { status: 503, .. }));

        let status = store.status().await;
        assert!(!status.loading);
        assert_eq!(status.error.as_deref(), Some("Review service returned 503: down"));
        assert_eq!(ids(&store.snapshot().await.reviews), vec!["kept"]);
    }

    #[tokio::test]
    async fn test_next_fetch_clears_previous_error() {
        let service = FakeService::default()
            .replying(Err(unavailable()))
            .replying(Ok(json!([{ "id": "r1" }])));
        let store = ReviewStore::new(service);

        assert!(store.fetch(None).await.is_err());
        assert!(store.status().await.error.is_some());

        assert_ok!(store.fetch(None).await);
        assert_eq!(store.status().await.error, None);
    }

    #[tokio::test]
    async fn test_malformed_response_empties_without_error() {
        let service = FakeService::default().replying(Ok(json!({ "message": "no reviews here" })));
        let store = ReviewStore::with_repository(
            service,
            ReviewRepository::with_reviews(vec![Review::new("old", "A", "airbnb")]),
        );

        assert_ok!(store.fetch(None).await);

        let state = store.snapshot().await;
        assert!(state.reviews.is_empty());
        assert_eq!(state.error, None);
    }

    #[tokio::test]
    async fn test_non_json_body_is_malformed_not_an_error() {
        let service = FakeService::default()
            .replying(Ok(Value::String("<html>Bad Gateway</html>".to_string())));
        let store = ReviewStore::with_repository(
            service,
            ReviewRepository::with_reviews(vec![Review::new("old", "A", "airbnb")]),
        );

        assert_ok!(store.fetch(None).await);

        let status = store.status().await;
        assert!(!status.loading);
        assert_eq!(status.error, None);
        assert!(store.snapshot().await.reviews.is_empty());
    }

    #[tokio::test]
    async fn test_scoped_fetch_merges_one_property() {
        let service = FakeService::default().replying(Ok(json!({
            "reviews": [{ "id": "a-new", "propertyId": "A" }]
        })));
        let store = ReviewStore::with_repository(
            service,
            ReviewRepository::with_reviews(vec![
                Review::new("a-old", "A", "airbnb"),
                Review::new("b", "B", "airbnb"),
            ]),
        );

        let property = PropertyKey::from("A");
        assert_ok!(store.fetch(Some(&property)).await);

        assert_eq!(ids(&store.snapshot().await.reviews), vec!["b", "a-new"]);
        assert_eq!(*store.service().fetched.lock().unwrap(), vec![Some(property)]);
    }

    #[tokio::test]
    async fn test_stale_fetch_is_discarded() {
        let (slow_tx, slow_rx) = oneshot::channel();
        let service = FakeService::default()
            .gated(slow_rx)
            .replying(Ok(json!([{ "id": "new" }])));
        let store = ReviewStore::new(service);

        let mut slow = task::spawn(store.fetch(None));
        assert_pending!(slow.poll());

        let fast = assert_ok!(store.fetch(None).await);
        assert_eq!(fast, FetchCompletion::Applied);

        slow_tx.send(json!([{ "id": "old" }])).unwrap();
        assert!(slow.is_woken());
        let slow_result = assert_ready!(slow.poll());
        assert_eq!(slow_result.unwrap(), FetchCompletion::Stale);

        assert_eq!(ids(&store.snapshot().await.reviews), vec!["new"]);
        assert!(!store.status().await.loading);
    }

    #[tokio::test]
    async fn test_toggle_approval_applies_after_service_confirms() {
        let store = loaded(vec![Review::new("r1", "A", "airbnb")]);

        let outcome = assert_ok!(store.toggle_approval("r1").await);
        assert_eq!(outcome, ToggleOutcome::Applied { approved: true });
        assert_eq!(store.approved_view(None).await.len(), 1);

        let outcome = assert_ok!(store.toggle_approval("r1").await);
        assert_eq!(outcome, ToggleOutcome::Applied { approved: false });

        let review = &store.snapshot().await.reviews[0];
        assert_eq!(review.approval_status, Some(ApprovalStatus::decided(false)));
        assert_eq!(
            *store.service().approvals.lock().unwrap(),
            vec![("r1".to_string(), true), ("r1".to_string(), false)]
        );
    }

    #[tokio::test]
    async fn test_toggle_approval_failure_changes_nothing() {
        let service = FakeService::default().rejecting_approvals();
        let store = ReviewStore::with_repository(
            service,
            ReviewRepository::with_reviews(vec![Review::new("r1", "A", "airbnb")]),
        );

        assert_err!(store.toggle_approval("r1").await);

        let review = &store.snapshot().await.reviews[0];
        assert_eq!(review.approval_status, None);
        assert_eq!(store.status().await.error, None);
    }

    #[tokio::test]
    async fn test_toggle_unknown_review_is_noop() {
        let store = loaded(vec![Review::new("r1", "A", "airbnb")]);
        let before = store.snapshot().await.reviews;

        let outcome = assert_ok!(store.toggle_approval("missing").await);
        assert_eq!(outcome, ToggleOutcome::UnknownReview);
        assert_eq!(store.snapshot().await.reviews, before);
        assert!(store.service().approvals.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_views_follow_filter_and_sort_changes() {
        let store = loaded(vec![
            Review::new("low", "A", "airbnb").with_rating(2.0),
            Review::new("high", "A", "airbnb").with_rating(5.0),
            Review::new("other", "B", "booking").with_rating(4.0),
        ]);

        assert!(store.set_sort_key("rating").await);
        assert_eq!(ids(&store.filtered_view().await), vec!["high", "other", "low"]);

        assert!(store.set_filter("property", "A").await);
        assert_eq!(ids(&store.filtered_view().await), vec!["high", "low"]);

        assert!(!store.set_sort_key("newest").await);
        assert!(!store.set_filter("dates", "2024").await);
        assert_eq!(ids(&store.filtered_view().await), vec!["high", "low"]);

        assert_eq!(store.property_list().await.len(), 2);
        assert_eq!(store.channel_list().await, vec!["airbnb", "booking"]);
        assert_eq!(store.statistics().await.avg_rating, 3.7);
    }

    async fn http_store(server: &MockServer) -> ReviewStore<HttpReviewService> {
        let service =
            HttpReviewService::new(&format!("{}/api", server.uri()), Duration::from_secs(5)).unwrap();
        ReviewStore::new(service)
    }

    #[tokio::test]
    async fn test_end_to_end_fetch_and_toggle() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/reviews/hostaway"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "result": [
                    { "id": "r1", "propertyName": "Loft", "channel": "airbnb", "rating": 4 },
                    { "id": "r2", "propertyName": "Loft", "channel": "booking" }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/api/reviews/r2/approve"))
            .and(body_json(json!({ "approved": true })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let store = http_store(&server).await;
        assert_ok!(store.fetch(None).await);
        assert_eq!(ids(&store.snapshot().await.reviews), vec!["r1", "r2"]);

        let outcome = assert_ok!(store.toggle_approval("r2").await);
        assert_eq!(outcome, ToggleOutcome::Applied { approved: true });

        let approved = store.approved_view(Some(&PropertyKey::from("Loft"))).await;
        assert_eq!(ids(&approved), vec!["r2"]);
    }

    #[tokio::test]
    async fn test_end_to_end_unknown_review_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let store = http_store(&server).await;
        let outcome = assert_ok!(store.toggle_approval("ghost").await);
        assert_eq!(outcome, ToggleOutcome::UnknownReview);
    }
}
