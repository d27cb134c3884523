//! Feed error shared by the data ports.

/// Failure of a feed call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeedError {
    /// The call did not finish in time.
    #[error("{feed} request timed out")]
    Timeout {
        /// Feed name.
        feed: &'static str,
    },

    /// Transport failure.
    #[error("{feed} network error: {message}")]
    Network {
        /// Feed name.
        feed: &'static str,
        /// Error details.
        message: String,
    },

    /// Non-success HTTP status.
    #[error("{feed} returned HTTP {status}")]
    Status {
        /// Feed name.
        feed: &'static str,
        /// HTTP status code.
        status: u16,
    },

    /// Body could not be decoded.
    #[error("{feed} parse error: {message}")]
    Parse {
        /// Feed name.
        feed: &'static str,
        /// Error details.
        message: String,
    },

    /// Provider answered with no usable data.
    #[error("{feed} returned no data")]
    Empty {
        /// Feed name.
        feed: &'static str,
    },

    /// Provider refused the request (rate limit note, bad key, unknown pair).
    #[error("{feed} rejected request: {message}")]
    Rejected {
        /// Feed name.
        feed: &'static str,
        /// Provider message.
        message: String,
    },

    /// Feed has no credentials configured.
    #[error("{feed} is not configured")]
    NotConfigured {
        /// Feed name.
        feed: &'static str,
    },
}

impl FeedError {
    /// Short kind label for metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::Network { .. } => "network",
            Self::Status { .. } => "status",
            Self::Parse { .. } => "parse",
            Self::Empty { .. } => "empty",
            Self::Rejected { .. } => "rejected",
            Self::NotConfigured { .. } => "not_configured",
        }
    }
}
