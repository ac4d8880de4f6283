//! Failure payloads carried by [`AsyncResult`](crate::AsyncResult)
//!
//! A failure is either *raw* (nobody has looked at it yet) or *processed*
//! (it already received user-facing treatment). Processed errors keep the
//! error they replaced so the full cause chain can still be printed.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// The settled value of an [`AsyncResult`](crate::AsyncResult)
pub type Outcome<T> = std::result::Result<T, Error>;

/// Failure payload of an [`AsyncResult`](crate::AsyncResult)
///
/// # Examples
///
/// ```rust
/// use resultex::Error;
///
/// let raw = Error::from("connection refused");
/// assert!(!raw.is_processed());
///
/// let processed = raw.into_processed("could not reach the server");
/// assert!(processed.is_processed());
/// assert_eq!(processed.message(), "could not reach the server");
/// ```
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// A failure nobody has handled yet
    #[error(transparent)]
    Raw(#[from] RawError),

    /// A failure that was already surfaced to the user
    #[error(transparent)]
    Processed(#[from] ProcessedError),
}

impl Error {
    /// Create a raw error from a message
    pub fn msg(message: impl Into<String>) -> Self {
        Error::Raw(RawError::new(message))
    }

    /// Create a raw error from any standard error, keeping it as the source
    pub fn new<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Raw(RawError::with_source(error.to_string(), error))
    }

    /// Human readable message of this failure
    pub fn message(&self) -> &str {
        match self {
            Error::Raw(raw) => raw.message(),
            Error::Processed(processed) => processed.message(),
        }
    }

    /// Fold several failures into one raw error, see [`RawError::aggregate`]
    pub fn aggregate(failures: Vec<Error>) -> Self {
        Error::Raw(RawError::aggregate(failures))
    }

    /// Whether this failure was already processed
    pub fn is_processed(&self) -> bool {
        matches!(self, Error::Processed(_))
    }

    /// Wrap this error as processed with a new message.
    ///
    /// Wrapping always happens, even for an already processed error; use
    /// [`Error::process`] for the idempotent variant.
    pub fn into_processed(self, message: impl Into<String>) -> Self {
        Error::Processed(ProcessedError::new(message, self))
    }

    /// Mark this error as processed, keeping its message.
    ///
    /// Already processed errors are returned unchanged.
    pub fn process(self) -> Self {
        match self {
            Error::Raw(raw) => {
                let message = raw.message().to_string();
                Error::Processed(ProcessedError::new(message, Error::Raw(raw)))
            }
            processed => processed,
        }
    }

    /// Formatted trace of this error and every cause behind it
    pub fn trace(&self) -> String {
        match self {
            Error::Raw(raw) => raw.trace(),
            Error::Processed(processed) => processed.trace(),
        }
    }

    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(text) = payload.downcast_ref::<&str>() {
            (*text).to_string()
        } else if let Some(text) = payload.downcast_ref::<String>() {
            text.clone()
        } else {
            "unknown panic payload".to_string()
        };

        tracing::error!(panic = %message, "callback panicked inside a result chain");
        Error::msg(format!("panicked: {message}"))
    }
}

impl From<&str> for Error {
    fn from(message: &str) -> Self {
        Error::msg(message)
    }
}

impl From<String> for Error {
    fn from(message: String) -> Self {
        Error::msg(message)
    }
}

/// Equality compares messages and processing state, not sources
impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.is_processed() == other.is_processed() && self.message() == other.message()
    }
}

/// A failure that has not been handled yet
#[derive(Clone, thiserror::Error)]
#[error("{message}")]
pub struct RawError {
    message: String,
    #[source]
    source: Option<Arc<dyn std::error::Error + Send + Sync + 'static>>,
    failures: Vec<Error>,
}

impl RawError {
    /// Create a raw error without a source
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
            failures: Vec::new(),
        }
    }

    /// Create a raw error that remembers what caused it
    pub fn with_source<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            message: message.into(),
            source: Some(Arc::new(source)),
            failures: Vec::new(),
        }
    }

    /// Create a raw error standing for several failures at once
    ///
    /// The message lists every failure in order.
    pub fn aggregate(failures: Vec<Error>) -> Self {
        let listed: Vec<&str> = failures.iter().map(Error::message).collect();
        Self {
            message: format!("{} joined results failed: {}", failures.len(), listed.join("; ")),
            source: None,
            failures,
        }
    }

    /// The error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The failures folded into this one, empty unless built by
    /// [`RawError::aggregate`]
    pub fn failures(&self) -> &[Error] {
        &self.failures
    }

    fn trace(&self) -> String {
        let mut trace = format!("Error: {}", self.message);
        let mut cause = self
            .source
            .as_deref()
            .map(|source| source as &(dyn std::error::Error + 'static));

        // Error::new copies the source's message
        if let Some(source) = cause {
            if source.to_string() == self.message {
                cause = source.source();
            }
        }
        while let Some(source) = cause {
            trace.push_str(&format!("\nCaused by: {source}"));
            cause = source.source();
        }

        for (index, failure) in self.failures.iter().enumerate() {
            trace.push_str(&format!("\nFailure {}: {}", index + 1, failure.trace()));
        }
        trace
    }
}

impl fmt::Debug for RawError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawError")
            .field("message", &self.message)
            .field("source", &self.source.as_ref().map(|s| s.to_string()))
            .field("failures", &self.failures)
            .finish()
    }
}

/// Error marking a failure as already surfaced to the user
///
/// The replaced error is kept as [`ProcessedError::original`] and is reported
/// as the `source` of this one.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct ProcessedError {
    message: String,
    #[source]
    original: Box<Error>,
}

impl ProcessedError {
    /// Wrap `original` under a new user-facing message
    pub fn new(message: impl Into<String>, original: Error) -> Self {
        Self {
            message: message.into(),
            original: Box::new(original),
        }
    }

    /// The user-facing message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The error this one replaced
    pub fn original(&self) -> &Error {
        &self.original
    }

    /// Own trace followed by the original error's trace
    pub fn trace(&self) -> String {
        format!(
            "ProcessedError: {}\nCaused by: {}",
            self.message,
            self.original.trace()
        )
    }
}
