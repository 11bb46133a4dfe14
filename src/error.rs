//! Failure taxonomy shared by the resolver strategies, the pipeline and the
//! stream relay.

use std::fmt;

/// Every way a resolution or relay can fail. The payload is the message shown
/// to the caller, so it must stay free of credentials and local paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// Missing, malformed or wrong-domain URL. Never retried.
    InvalidInput(String),
    /// The extraction strategy failed; carries the underlying cause.
    ExtractionFailed(String),
    /// The post was reachable but no media URL could be located.
    NotFound(String),
    /// The relay's upstream GET errored or answered with a non-success status.
    UpstreamUnavailable(String),
}

impl ResolveError {
    pub fn message(&self) -> &str {
        match self {
            Self::InvalidInput(msg)
            | Self::ExtractionFailed(msg)
            | Self::NotFound(msg)
            | Self::UpstreamUnavailable(msg) => msg,
        }
    }

    /// Client errors map to 4xx; everything else is an upstream problem.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }

    /// Only extraction failures are worth a second attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ExtractionFailed(_))
    }
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for ResolveError {}
