pub mod config;
pub mod error;
pub mod models;
pub mod normalizer;
pub mod report;
pub mod repository;
pub mod service;
pub mod store;
pub mod views;

pub use config::Config;
pub use error::ServiceError;
pub use models::*;
pub use normalizer::{normalize, Envelope, Normalized};
pub use report::{render_reviews, render_statistics};
pub use repository::{FetchCompletion, FetchToken, RepositoryState, ReviewRepository};
pub use service::{HttpReviewService, ReviewService};
pub use store::{LoadStatus, ReviewStore, ToggleOutcome};
pub use views::{PropertyStats, Statistics};
