//! Error types for the Tether handler chain

/// Result type alias using [`Error`]
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Main error type for the handler chain
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid HTTP request
    #[error("Invalid HTTP request: {0}")]
    InvalidRequest(String),

    /// Route not found
    #[error("Route not found: {0}")]
    RouteNotFound(String),

    /// A route exists for the path but not for the method
    #[error("Method {method} not allowed for {path}")]
    MethodNotAllowed {
        /// Requested method
        method: http::Method,
        /// Requested path
        path: String,
    },

    /// Middleware error
    #[error("Middleware error: {0}")]
    Middleware(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] http::Error),

    /// Internal error (should not happen in production)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Convert error to HTTP status code
    pub fn to_status_code(&self) -> http::StatusCode {
        use http::StatusCode;
        match self {
            Error::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Error::RouteNotFound(_) => StatusCode::NOT_FOUND,
            Error::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Create a middleware error from anything printable
    pub fn middleware(message: impl std::fmt::Display) -> Self {
        Error::Middleware(message.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            Error::RouteNotFound("/test".to_string()).to_status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            Error::MethodNotAllowed {
                method: http::Method::POST,
                path: "/".to_string(),
            }
            .to_status_code(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(
            Error::middleware("boom").to_status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_middleware_error_message() {
        let err = Error::middleware("csrf token mismatch");
        assert!(matches!(err, Error::Middleware(_)));
        assert!(err.to_string().contains("csrf token mismatch"));
    }
}
