use std::io;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::StatusCode;

/// Failures inside the remote store client. They never cross the
/// [`crate::RemoteStore`] boundary; callers there only see `false` or an empty
/// listing.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
    #[error("failed to build http client")]
    Client(#[source] reqwest::Error),
    #[error("request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} responded with HTTP {status}")]
    Status {
        url: String,
        status: StatusCode,
        retry_after: Option<Duration>,
    },
    #[error("malformed listing returned by {url}")]
    Listing {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to write {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether another attempt could plausibly succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { source, .. } => {
                source.is_connect()
                    || source.is_timeout()
                    || source.is_request()
                    || source.is_body()
                    || source.is_decode()
            }
            Self::Status { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            Self::InvalidEndpoint { .. }
            | Self::Client(_)
            | Self::Listing { .. }
            | Self::Io { .. } => false,
        }
    }

    /// Delay the server asked for before the next attempt, if any.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Status { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Throttling responses make the backoff more conservative.
    #[must_use]
    pub fn is_throttled(&self) -> bool {
        matches!(
            self,
            Self::Status { status, .. }
                if *status == StatusCode::TOO_MANY_REQUESTS
                    || *status == StatusCode::SERVICE_UNAVAILABLE
        )
    }
}

/// Render an error and its sources as a single `outer: inner` line for logs.
pub(crate) fn error_chain(err: &dyn std::error::Error) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_chain_joins_sources() {
        let err = StoreError::io("/tmp/cache/hero.png", io::Error::other("disk full"));
        assert_eq!(error_chain(&err), "failed to write /tmp/cache/hero.png: disk full");
    }

    fn status(code: u16) -> StoreError {
        StoreError::Status {
            url: "http://store.invalid/game-assets".into(),
            status: StatusCode::from_u16(code).expect("status"),
            retry_after: None,
        }
    }

    #[test]
    fn server_errors_and_throttling_are_transient() {
        assert!(status(500).is_transient());
        assert!(status(503).is_transient());
        assert!(status(429).is_transient());
        assert!(!status(404).is_transient());
        assert!(!status(403).is_transient());
    }

    #[test]
    fn throttling_is_detected() {
        assert!(status(429).is_throttled());
        assert!(status(503).is_throttled());
        assert!(!status(500).is_throttled());
    }

    #[test]
    fn io_errors_are_not_retried() {
        let err = StoreError::io("/tmp/x", io::Error::other("disk full"));
        assert!(!err.is_transient());
        assert!(err.retry_after().is_none());
    }
}
