use reqwest::StatusCode;
use thiserror::Error;

/// Failure of a call to the inference service or the backend API.
///
/// Both clients collapse everything into the same two cases: the request
/// never completed (connect error, timeout, malformed body) or the server
/// answered with a non-success status. Callers decide what to do with it;
/// the clients themselves never retry.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server returned {0}")]
    Status(StatusCode),
}
