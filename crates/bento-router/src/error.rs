//! Routing errors.

use http::StatusCode;

/// Why a request could not be routed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    /// No rule matches the path (and method).
    #[error("No route found for path: {path}")]
    RouteNotFound { path: String },

    /// A rule matched but its service has no base URL.
    #[error("Service {service} is not configured")]
    ServiceNotConfigured { service: String },
}

impl RouteError {
    /// The HTTP status a client should see.
    pub fn status(&self) -> StatusCode {
        match self {
            RouteError::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            RouteError::ServiceNotConfigured { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
