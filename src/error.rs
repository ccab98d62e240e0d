/// Failure talking to the review service
#[derive(thiserror::Error, Debug)]
pub enum ServiceError {
    #[error("Invalid review service URL: {0}")]
    InvalidBaseUrl(String),
    #[error("Review service request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Review service returned {status}: {body}")]
    Status { status: u16, body: String },
}
