use serde::Serialize;
use tracing::{debug, info, warn};

use crate::models::{
    ApprovalStatus, FilterCriteria, FilterField, PropertyKey, Review, SortKey,
};

/// Everything the dashboard reads from
#[derive(Debug, Clone, Default, Serialize)]
pub struct RepositoryState {
    pub reviews: Vec<Review>,
    pub filters: FilterCriteria,
    pub sort_key: SortKey,
    pub loading: bool,
    pub error: Option<String>,
}

/// Identifies one fetch; only the most recently issued token may update the collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FetchToken(u64);

/// What happened to the result of a fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchCompletion {
    Applied,
    /// A newer fetch was issued before this one finished; its result was dropped
    Stale,
}

/// In-memory review collection plus the dashboard's filter and sort settings
#[derive(Debug, Default)]
pub struct ReviewRepository {
    state: RepositoryState,
    latest_token: u64,
}

impl ReviewRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reviews(reviews: Vec<Review>) -> Self {
        Self {
            state: RepositoryState {
                reviews,
                ..RepositoryState::default()
            },
            latest_token: 0,
        }
    }

    pub fn state(&self) -> &RepositoryState {
        &self.state
    }

    pub fn reviews(&self) -> &[Review] {
        &self.state.reviews
    }

    pub fn find(&self, id: &str) -> Option<&Review> {
        self.state.reviews.iter().find(|r| r.id == id)
    }

    /// Mark a fetch as started and hand out its token
    pub fn begin_fetch(&mut self) -> FetchToken {
        self.latest_token += 1;
        self.state.loading = true;
        self.state.error = None;
        FetchToken(self.latest_token)
    }

    pub fn is_current(&self, token: FetchToken) -> bool {
        token.0 == self.latest_token
    }

    /// Replace the whole collection, or with a scope, every review of that property
    ///
    /// A scoped merge is an upsert of the whole property: if `incoming` is only a
    /// partial page, the property's other reviews are gone afterwards.
    pub fn merge_reviews(&mut self, scope: Option<&PropertyKey>, incoming: Vec<Review>) {
        match scope {
            None => {
                debug!(count = incoming.len(), "Replacing review collection");
                self.state.reviews = incoming;
            }
            Some(property) => {
                let before = self.state.reviews.len();
                self.state.reviews.retain(|r| &r.property_key != property);
                debug!(
                    property = %property,
                    removed = before - self.state.reviews.len(),
                    added = incoming.len(),
                    "Merging property reviews"
                );
                self.state.reviews.extend(incoming);
            }
        }
    }

    pub fn end_fetch(&mut self, error: Option<String>) {
        self.state.loading = false;
        if let Some(error) = error {
            self.state.error = Some(error);
        }
    }

    /// Apply a fetch result if `token` is still the latest one issued
    pub fn complete_fetch(
        &mut self,
        token: FetchToken,
        scope: Option<&PropertyKey>,
        outcome: Result<Vec<Review>, String>,
    ) -> FetchCompletion {
        if !self.is_current(token) {
            info!(
                token = token.0,
                latest = self.latest_token,
                "Discarding stale fetch result"
            );
            return FetchCompletion::Stale;
        }

        match outcome {
            Ok(reviews) => {
                self.merge_reviews(scope, reviews);
                self.end_fetch(None);
            }
            Err(error) => self.end_fetch(Some(error)),
        }

        FetchCompletion::Applied
    }

    /// Set one filter field by name; returns false (and changes nothing) for unknown names
    pub fn set_filter(&mut self, field: &str, value: &str) -> bool {
        match FilterField::parse(field) {
            Some(field) => {
                self.set_filter_field(field, value);
                true
            }
            None => {
                warn!(field, "Ignoring unknown filter field");
                false
            }
        }
    }

    pub fn set_filter_field(&mut self, field: FilterField, value: &str) {
        debug!(?field, value, "Setting filter");
        self.state.filters.set(field, value);
    }

    /// Set the sort key by name; returns false (and changes nothing) for unknown keys
    pub fn set_sort_key(&mut self, key: &str) -> bool {
        match SortKey::parse(key) {
            Some(key) => {
                self.state.sort_key = key;
                true
            }
            None => {
                warn!(key, "Ignoring unknown sort key");
                false
            }
        }
    }

    /// Record a moderator decision; unknown ids are ignored and return false
    pub fn apply_approval(&mut self, id: &str, approved: bool) -> bool {
        let Some(review) = self.state.reviews.iter_mut().find(|r| r.id == id) else {
            debug!(id, "No review to apply approval to");
            return false;
        };

        review.approval_status = Some(ApprovalStatus::decided(approved));
        true
    }
}
