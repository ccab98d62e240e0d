use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Value that switches a filter field off
pub const ALL: &str = "all";

/// Canonical identity of a rental property
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyKey(String);

impl PropertyKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PropertyKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for PropertyKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// Moderation state of a review
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ApprovalStatus {
    pub is_approved: bool,
    pub is_rejected: bool,
}

impl ApprovalStatus {
    /// Status after a moderator decision: exactly one of the two flags is set
    pub fn decided(approved: bool) -> Self {
        Self {
            is_approved: approved,
            is_rejected: !approved,
        }
    }
}

/// A guest review in canonical form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: String,
    pub property_key: PropertyKey,
    pub property_name: Option<String>,
    pub channel: String,
    pub rating: Option<f64>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub approval_status: Option<ApprovalStatus>,
    pub guest_name: Option<String>,
    pub text: Option<String>,
    #[serde(default)]
    pub categories: BTreeMap<String, f64>,
}

impl Review {
    pub fn new(
        id: impl Into<String>,
        property_key: impl Into<PropertyKey>,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            property_key: property_key.into(),
            property_name: None,
            channel: channel.into(),
            rating: None,
            submitted_at: None,
            approval_status: None,
            guest_name: None,
            text: None,
            categories: BTreeMap::new(),
        }
    }

    pub fn with_rating(mut self, rating: f64) -> Self {
        self.rating = Some(rating);
        self
    }

    pub fn with_submitted_at(mut self, submitted_at: DateTime<Utc>) -> Self {
        self.submitted_at = Some(submitted_at);
        self
    }

    pub fn with_approval(mut self, status: ApprovalStatus) -> Self {
        self.approval_status = Some(status);
        self
    }

    /// Rating used for filtering and aggregation; a missing rating counts as zero
    pub fn effective_rating(&self) -> f64 {
        self.rating.unwrap_or(0.0)
    }

    /// Submission time used for ordering; a missing timestamp counts as the Unix epoch
    pub fn effective_submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at.unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }

    pub fn is_approved(&self) -> bool {
        self.approval_status.is_some_and(|s| s.is_approved)
    }
}

/// Inclusive `min-max` rating range, kept in its textual form
///
/// A bucket whose text does not yield two numbers matches no review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RatingBucket(String);

impl RatingBucket {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self(bucket.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn bounds(&self) -> Option<(f64, f64)> {
        let mut parts = self.0.split('-');
        let min = parts.next()?.trim().parse().ok()?;
        let max = parts.next()?.trim().parse().ok()?;
        Some((min, max))
    }

    pub fn contains(&self, rating: f64) -> bool {
        self.bounds()
            .is_some_and(|(min, max)| rating >= min && rating <= max)
    }
}

/// Names of the fields a filter can be set on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterField {
    Property,
    Channel,
    Rating,
    DateRange,
}

impl FilterField {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "property" => Some(Self::Property),
            "channel" => Some(Self::Channel),
            "rating" | "ratingBucket" | "rating_bucket" => Some(Self::Rating),
            "dateRange" | "date_range" => Some(Self::DateRange),
            _ => None,
        }
    }
}

/// Current dashboard filter; `None` on a field means "all"
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterCriteria {
    pub property: Option<PropertyKey>,
    pub channel: Option<String>,
    pub rating: Option<RatingBucket>,
    /// Accepted and stored but not applied by any view yet
    pub date_range: Option<String>,
}

impl FilterCriteria {
    pub fn set(&mut self, field: FilterField, value: &str) {
        let value = (value != ALL).then(|| value.to_string());
        match field {
            FilterField::Property => self.property = value.map(PropertyKey::from),
            FilterField::Channel => self.channel = value,
            FilterField::Rating => self.rating = value.map(RatingBucket::new),
            FilterField::DateRange => self.date_range = value,
        }
    }
}

/// Ordering applied to the filtered view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    /// Newest first
    #[default]
    Date,
    /// Highest rated first
    Rating,
}

impl SortKey {
    pub fn parse(key: &str) -> Option<Self> {
        if key.eq_ignore_ascii_case("date") {
            Some(Self::Date)
        } else if key.eq_ignore_ascii_case("rating") {
            Some(Self::Rating)
        } else {
            None
        }
    }
}
