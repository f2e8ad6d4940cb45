use thiserror::Error;

/// Top-level error type for the `sdnlink-api` crate.
///
/// Transport-level failures (connection refused, DNS, timeout) are
/// recovered inside the request handler by failing over to the next
/// configured controller and never escape `execute`. What remains here
/// are caller-side problems: bad configuration, bad URLs, and bodies
/// that cannot be encoded in the negotiated wire format.
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP transport error surfaced outside the failover loop
    /// (e.g. while building the client).
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS or client-construction error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// Request body could not be serialized.
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// The configured wire format has no encoder.
    #[error("Unsupported wire format: {0}")]
    UnsupportedFormat(&'static str),

    /// No controller addresses were configured.
    #[error("No controller addresses configured")]
    NoEndpoints,
}
