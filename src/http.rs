//! Outbound HTTP client setup.

use std::time::Duration;

/// Agent shared by the scrape/oEmbed strategies and the relay. Every request
/// carries the browser-like User-Agent and the upstream timeout.
pub fn build_agent(user_agent: &str, timeout: Duration) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .user_agent(user_agent)
        .timeout(timeout)
        .build()
}

/// Turns a ureq failure into a short message that is safe to hand back to a
/// client: the status code, or the transport error kind and its detail.
pub fn describe_error(err: &ureq::Error) -> String {
    match err {
        ureq::Error::Status(code, _) => format!("upstream returned HTTP {code}"),
        ureq::Error::Transport(transport) => transport.to_string(),
    }
}
