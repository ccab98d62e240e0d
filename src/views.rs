//! Read-only views derived from repository state. Nothing here is cached; every
//! call recomputes from the current collection.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::models::{FilterCriteria, PropertyKey, Review, SortKey};
use crate::repository::RepositoryState;

/// Aggregates for one property
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PropertyStats {
    pub count: usize,
    pub total_rating: f64,
    pub approved: usize,
}

/// Dashboard-wide aggregates
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Statistics {
    pub total: usize,
    pub approved: usize,
    pub pending: usize,
    /// Mean effective rating over all reviews, to one decimal
    pub avg_rating: f64,
    pub property_stats: BTreeMap<PropertyKey, PropertyStats>,
}

/// Reviews passing the current filters, in the current sort order
pub fn filtered_view(state: &RepositoryState) -> Vec<&Review> {
    let mut reviews: Vec<&Review> = state
        .reviews
        .iter()
        .filter(|r| matches_filters(r, &state.filters))
        .collect();
    sort_reviews(&mut reviews, state.sort_key);
    reviews
}

pub fn matches_filters(review: &Review, filters: &FilterCriteria) -> bool {
    let property = filters
        .property
        .as_ref()
        .map_or(true, |p| &review.property_key == p);
    let channel = filters
        .channel
        .as_deref()
        .map_or(true, |c| review.channel == c);
    let rating = filters
        .rating
        .as_ref()
        .map_or(true, |bucket| bucket.contains(review.effective_rating()));

    property && channel && rating
}

/// Stable descending sort by the chosen key
pub fn sort_reviews(reviews: &mut [&Review], key: SortKey) {
    match key {
        SortKey::Date => {
            reviews.sort_by(|a, b| b.effective_submitted_at().cmp(&a.effective_submitted_at()))
        }
        SortKey::Rating => {
            reviews.sort_by(|a, b| b.effective_rating().total_cmp(&a.effective_rating()))
        }
    }
}

/// Approved reviews, optionally only those of one property
pub fn approved_view<'a>(reviews: &'a [Review], property: Option<&PropertyKey>) -> Vec<&'a Review> {
    reviews
        .iter()
        .filter(|r| r.is_approved())
        .filter(|r| property.map_or(true, |p| &r.property_key == p))
        .collect()
}

pub fn property_list(reviews: &[Review]) -> Vec<PropertyKey> {
    reviews
        .iter()
        .map(|r| r.property_key.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub fn channel_list(reviews: &[Review]) -> Vec<String> {
    reviews
        .iter()
        .map(|r| r.channel.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub fn statistics(reviews: &[Review]) -> Statistics {
    let total = reviews.len();
    let mut approved = 0;
    let mut rating_sum = 0.0;
    let mut property_stats: BTreeMap<PropertyKey, PropertyStats> = BTreeMap::new();

    for review in reviews {
        let rating = review.effective_rating();
        rating_sum += rating;

        let stats = property_stats.entry(review.property_key.clone()).or_default();
        stats.count += 1;
        stats.total_rating += rating;

        if review.is_approved() {
            approved += 1;
            stats.approved += 1;
        }
    }

    let avg_rating = if total == 0 {
        0.0
    } else {
        round_to_tenth(rating_sum / total as f64)
    };

    Statistics {
        total,
        approved,
        pending: total - approved,
        avg_rating,
        property_stats,
    }
}

fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
