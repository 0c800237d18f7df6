use thiserror::Error;

#[derive(Debug, Error)]
pub enum SubgraphError {
    #[error("Invalid subgraph URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx response; `body` is the raw response text.
    #[error("Subgraph returned HTTP {code}: {body}")]
    Status { code: u16, body: String },

    #[error("Malformed subgraph response: {0}")]
    Decode(String),

    #[error("Field {field} is not a valid big integer: {value}")]
    InvalidBigInt { field: &'static str, value: String },
}

impl From<serde_json::Error> for SubgraphError {
    fn from(e: serde_json::Error) -> Self {
        SubgraphError::Decode(e.to_string())
    }
}
