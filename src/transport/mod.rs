pub mod http_json;

use thiserror::Error;

pub use http_json::MatrixClient;

/// A decoded JSON response body. Only objects are accepted.
pub type JsonObject = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid url {base} + {path}: {source}")]
    InvalidUrl {
        base: String,
        path: String,
        #[source]
        source: url::ParseError,
    },

    #[error("serializing request body: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("response from {url} is not valid JSON: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("response from {url} is a JSON {found}, expected an object")]
    NotAnObject { url: String, found: &'static str },
}
