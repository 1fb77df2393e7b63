use serde::Serialize;
use thiserror::Error;

/// A failed admin API call, scoped to the domains it affected.
///
/// `status_code` is the HTTP status of the response, or `0` when no response arrived at all.
/// During the legacy per-domain fallback `domains` holds the single domain whose update failed;
/// otherwise it is the certificate's whole domain set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{message}")]
pub struct GatewayError {
    pub status_code: u16,
    pub domains: Vec<String>,
    pub message: String,
}

impl GatewayError {
    #[must_use]
    pub fn new(status_code: u16, domains: Vec<String>, message: impl Into<String>) -> Self {
        Self {
            status_code,
            domains,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_no_response(&self) -> bool {
        self.status_code == 0
    }
}
