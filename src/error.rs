//! Request-level error type.
//!
//! Local file problems never show up here: the guide index and sidecar
//! readers collapse their failures into empty data. What remains are client
//! input errors and upstream transport failures.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Missing query. Use ?q=... or body.query")]
    MissingQuery,

    #[error("Request body too large (limit {limit} bytes)")]
    BodyTooLarge { limit: usize },

    #[error("Malformed JSON body: {0}")]
    MalformedBody(#[from] serde_json::Error),

    #[error("Failed to read request body: {0}")]
    BodyRead(String),

    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),
}

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;
