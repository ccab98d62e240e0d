//! Turns whatever the review service sends back into canonical [`Review`] records.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::models::{ApprovalStatus, PropertyKey, Review};

/// Key given to reviews that carry no property identity at all
pub const UNKNOWN_PROPERTY: &str = "unknown";

/// Channel given to reviews that do not name their source platform
pub const UNKNOWN_CHANNEL: &str = "unknown";

/// Envelope the review list was found in, in the order they are tried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Envelope {
    Bare,
    Result,
    Reviews,
    Data,
}

/// Outcome of normalizing one response body
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Normalized {
    pub reviews: Vec<Review>,
    /// `None` when no envelope matched (malformed response)
    pub envelope: Option<Envelope>,
    /// Array elements that could not be read as a review
    pub skipped: usize,
}

impl Normalized {
    pub fn is_malformed(&self) -> bool {
        self.envelope.is_none()
    }
}

/// Normalize a response body into reviews
///
/// A body in none of the accepted shapes is logged and yields no reviews; it is
/// never an error.
pub fn normalize(body: &Value) -> Normalized {
    let Some((envelope, items)) = locate(body) else {
        warn!(kind = value_kind(body), "Unexpected reviews response format");
        return Normalized::default();
    };

    let mut reviews = Vec::with_capacity(items.len());
    let mut skipped = 0;
    for (index, item) in items.iter().enumerate() {
        match item.as_object().and_then(review_from_object) {
            Some(review) => reviews.push(review),
            None => {
                warn!(index, kind = value_kind(item), "Skipping unreadable review record");
                skipped += 1;
            }
        }
    }

    debug!(?envelope, count = reviews.len(), skipped, "Normalized reviews response");

    Normalized {
        reviews,
        envelope: Some(envelope),
        skipped,
    }
}

fn locate(body: &Value) -> Option<(Envelope, &Vec<Value>)> {
    if let Value::Array(items) = body {
        return Some((Envelope::Bare, items));
    }

    [
        (Envelope::Result, "result"),
        (Envelope::Reviews, "reviews"),
        (Envelope::Data, "data"),
    ]
    .into_iter()
    .find_map(|(envelope, key)| {
        body.get(key)
            .and_then(Value::as_array)
            .map(|items| (envelope, items))
    })
}

/// Resolve the one property key a review is matched by from now on
///
/// Stable identifiers win over display names: property id, then listing id,
/// then property or listing name.
pub fn canonical_property_key(
    property_id: Option<&str>,
    listing_id: Option<&str>,
    property_name: Option<&str>,
) -> PropertyKey {
    [property_id, listing_id, property_name]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|candidate| !candidate.is_empty())
        .map(PropertyKey::from)
        .unwrap_or_else(|| PropertyKey::from(UNKNOWN_PROPERTY))
}

fn review_from_object(obj: &Map<String, Value>) -> Option<Review> {
    let id = text_field(obj, &["id", "ID", "Id"])?;

    let property_id = text_field(obj, &["propertyId", "PropertyID", "PropertyId", "property_id"]);
    let listing_id = text_field(
        obj,
        &["listingId", "ListingID", "ListingId", "listing_id", "listingMapId"],
    );
    let property_name = text_field(
        obj,
        &["propertyName", "PropertyName", "property_name", "listingName", "ListingName"],
    );
    let property_key = canonical_property_key(
        property_id.as_deref(),
        listing_id.as_deref(),
        property_name.as_deref(),
    );

    let channel = text_field(obj, &["channel", "Channel", "channelName", "source", "Source"])
        .unwrap_or_else(|| UNKNOWN_CHANNEL.to_string());

    let categories = categories(obj);
    let rating = field(obj, &["rating", "Rating"])
        .and_then(number)
        .or_else(|| mean(&categories));

    let submitted_at = text_field(obj, &["submittedAt", "SubmittedAt", "submitted_at"])
        .and_then(|raw| parse_timestamp(&raw));

    Some(Review {
        id,
        property_key,
        property_name,
        channel,
        rating,
        submitted_at,
        approval_status: approval_status(obj),
        guest_name: text_field(obj, &["guestName", "GuestName", "guest_name"]),
        text: text_field(obj, &["reviewText", "ReviewText", "publicReview", "text"]),
        categories,
    })
}

/// First present, non-null value among `keys`
fn field<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| obj.get(*key))
        .find(|value| !value.is_null())
}

/// Identifier-like field: strings are taken as-is, numbers are rendered in decimal
fn text_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    match field(obj, keys)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Finite number from a JSON number or numeric string; "NaN" and "inf" are absent
fn number(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|n| n.is_finite())
}

fn categories(obj: &Map<String, Value>) -> BTreeMap<String, f64> {
    match field(obj, &["reviewCategory", "categories", "Categories"]) {
        // Hostaway style: [{ "category": "cleanliness", "rating": 10 }]
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| {
                let name = item.get("category")?.as_str()?;
                let rating = number(item.get("rating")?)?;
                Some((name.to_string(), rating))
            })
            .collect(),
        Some(Value::Object(map)) => map
            .iter()
            .filter_map(|(name, rating)| Some((name.clone(), number(rating)?)))
            .collect(),
        _ => BTreeMap::new(),
    }
}

fn mean(categories: &BTreeMap<String, f64>) -> Option<f64> {
    if categories.is_empty() {
        return None;
    }
    Some(categories.values().sum::<f64>() / categories.len() as f64)
}

fn approval_status(obj: &Map<String, Value>) -> Option<ApprovalStatus> {
    if let Some(Value::Object(status)) = field(obj, &["approvalStatus", "ApprovalStatus"]) {
        let flag = |keys: &[&str]| {
            field(status, keys)
                .and_then(Value::as_bool)
                .unwrap_or(false)
        };
        return Some(ApprovalStatus {
            is_approved: flag(&["isApproved", "IsApproved"]),
            is_rejected: flag(&["isRejected", "IsRejected"]),
        });
    }

    match field(obj, &["status", "Status"]).and_then(Value::as_str)? {
        "published" | "approved" => Some(ApprovalStatus::decided(true)),
        "rejected" => Some(ApprovalStatus::decided(false)),
        _ => None,
    }
}

/// Parse RFC 3339, or the `YYYY-MM-DD HH:MM:SS` form Hostaway uses (taken as UTC)
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
