use crate::models::Review;
use crate::views::Statistics;

/// Render a markdown table of reviews
pub fn render_reviews(title: &str, reviews: &[Review]) -> String {
    let mut md = format!("## {}\n\n", title);

    if reviews.is_empty() {
        md.push_str("No reviews found.\n");
        return md;
    }

    md.push_str("| ID | Property | Channel | Rating | Submitted | Status |\n");
    md.push_str("|----|----------|---------|--------|-----------|--------|\n");

    for review in reviews {
        let property = review
            .property_name
            .as_deref()
            .unwrap_or(review.property_key.as_str());
        let rating = review
            .rating
            .map(|r| format!("{:.1}", r))
            .unwrap_or_else(|| "-".to_string());
        let submitted = review
            .submitted_at
            .map(|t| t.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string());

        md.push_str(&format!(
            "| `{}` | {} | {} | {} | {} | {} |\n",
            review.id,
            property,
            review.channel,
            rating,
            submitted,
            status_label(review)
        ));
    }

    md.push_str(&format!("\n{} review(s)\n", reviews.len()));

    md
}

fn status_label(review: &Review) -> &'static str {
    match review.approval_status {
        Some(s) if s.is_approved => "✅ approved",
        Some(s) if s.is_rejected => "❌ rejected",
        _ => "⏳ pending",
    }
}

/// Render dashboard statistics with a per-property breakdown
pub fn render_statistics(stats: &Statistics) -> String {
    let mut md = String::new();

    md.push_str("## Review Statistics\n\n");
    md.push_str(&format!(
        "| Total | Approved | Pending | Average Rating |\n|-------|----------|---------|----------------|\n| {} | {} | {} | {:.1} |\n\n",
        stats.total, stats.approved, stats.pending, stats.avg_rating
    ));

    if stats.property_stats.is_empty() {
        return md;
    }

    md.push_str("### By Property\n\n");
    md.push_str("| Property | Reviews | Approved | Average |\n");
    md.push_str("|----------|---------|----------|---------|\n");

    for (property, entry) in &stats.property_stats {
        let average = if entry.count == 0 {
            0.0
        } else {
            entry.total_rating / entry.count as f64
        };
        md.push_str(&format!(
            "| {} | {} | {} | {:.1} |\n",
            property, entry.count, entry.approved, average
        ));
    }

    md
}
