//! Request Context
//!
//! Metadata about the current request for audit logging and tracing.

use std::net::IpAddr;
use uuid::Uuid;

/// Context for a request, carried from the HTTP layer into the services.
///
/// The acting user is the authenticated identity from the `X-User-ID`
/// header; every ownership-checked operation receives it.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Acting user id from the X-User-ID header
    pub acting_user_id: Option<i64>,

    /// Correlation ID for request tracing
    pub correlation_id: Option<Uuid>,

    /// Client IP address
    pub client_ip: Option<IpAddr>,
}

impl RequestContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Context with an acting user id
    pub fn with_acting_user(mut self, user_id: i64) -> Self {
        self.acting_user_id = Some(user_id);
        self
    }

    /// Context with a correlation ID
    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    /// Context with a client IP
    pub fn with_client_ip(mut self, ip: IpAddr) -> Self {
        self.client_ip = Some(ip);
        self
    }

    /// Generate a correlation ID if not present
    pub fn ensure_correlation_id(&mut self) -> Uuid {
        *self.correlation_id.get_or_insert_with(Uuid::new_v4)
    }
}
