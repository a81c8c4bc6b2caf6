//! Error types for the control-plane client.

use thiserror::Error;

/// Errors raised while talking to the control-plane API.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ApiError {
    /// Raised when the configured endpoint cannot be used as a base URL.
    #[error("invalid API endpoint '{endpoint}': {message}")]
    Endpoint {
        /// Endpoint taken from configuration.
        endpoint: String,
        /// Parser error message.
        message: String,
    },
    /// Raised when the request never produced a response.
    #[error("{method} {path} failed: {message}")]
    Request {
        /// HTTP method of the failed request.
        method: String,
        /// Request path.
        path: String,
        /// Transport error message.
        message: String,
    },
    /// Raised when the response status is not one of the accepted codes.
    #[error("{method} {path} returned status {status}: {body}")]
    Status {
        /// HTTP method of the failed request.
        method: String,
        /// Request path.
        path: String,
        /// Status code returned by the control plane.
        status: u16,
        /// Response body, lossily decoded.
        body: String,
    },
    /// Raised when the response body cannot be decoded.
    #[error("failed to decode response from {path}: {message}")]
    Decode {
        /// Request path.
        path: String,
        /// Decoder error message.
        message: String,
    },
}

impl ApiError {
    /// Returns `true` when the control plane answered with `404 Not Found`.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }
}
