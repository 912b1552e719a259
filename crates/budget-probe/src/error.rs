//! Probe failure taxonomy

use std::time::Duration;

/// Why a single budget probe failed.
///
/// Every variant is absorbed by the pool and recorded on the credential's
/// status; none of them reaches the pool's callers.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProbeError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    #[error("credential rejected (HTTP {status})")]
    Unauthorized { status: u16 },

    #[error("{endpoint} returned HTTP {status}")]
    Status { endpoint: String, status: u16 },

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl ProbeError {
    /// Short stable label for log fields and metric labels.
    pub fn reason(&self) -> &'static str {
        match self {
            ProbeError::Transport(_) => "transport",
            ProbeError::Timeout(_) => "timeout",
            ProbeError::Unauthorized { .. } => "unauthorized",
            ProbeError::Status { .. } => "status",
            ProbeError::Malformed(_) => "malformed",
        }
    }
}

/// Result alias for probe operations.
pub type Result<T> = std::result::Result<T, ProbeError>;

/// Classify a non-success status from one of the account endpoints.
///
/// 401/403 mean the token itself is bad; anything else (429, 5xx, unexpected
/// 3xx/4xx) is reported with the endpoint that produced it.
pub fn classify_status(endpoint: &str, status: u16) -> ProbeError {
    match status {
        401 | 403 => ProbeError::Unauthorized { status },
        _ => ProbeError::Status {
            endpoint: endpoint.to_string(),
            status,
        },
    }
}
