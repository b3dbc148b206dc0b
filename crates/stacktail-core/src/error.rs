//! Error types and result alias for stacktail.
//!
//! Two failure classes matter at runtime: a control-plane query failing
//! (recoverable, retried on the next cycle) and the output sink failing
//! (fatal, the durable log can no longer be trusted). Startup problems in
//! the binary crate are reported through `anyhow` before any of these
//! types come into play.

/// The result type used throughout stacktail.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while following a stack.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A control-plane query for one stack failed.
    ///
    /// Always recoverable: the follower logs a warning and retries the
    /// affected stack on the next cycle.
    #[error("query failed for stack {stack}: {message}")]
    Query {
        /// Short name of the stack the query was for.
        stack: String,
        /// Description of the failure, including the underlying cause.
        message: String,
    },

    /// Writing to the output sink failed.
    ///
    /// Fatal: continuing would silently drop history from the durable log.
    #[error("sink error: {message}")]
    Sink {
        /// Description of the failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl Error {
    /// Creates a query error with the given message.
    #[must_use]
    pub fn query(stack: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Query {
            stack: stack.into(),
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Sink {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}
