//! Error handling strategies for joined outcomes
//!
//! A join collects one [`Outcome`] per input. A strategy decides what the
//! joined result looks like when some of those outcomes are failures.

use crate::{Outcome, Settled};

/// Trait for custom error handling strategies
///
/// # Examples
///
/// ```rust
/// use resultex::{Error, ErrorHandler, FailFastHandler};
///
/// let outcomes = vec![Ok(1), Err(Error::msg("first")), Err(Error::msg("second"))];
/// let joined = FailFastHandler::handle_results(outcomes);
/// assert_eq!(joined.unwrap_err().message(), "first");
/// ```
pub trait ErrorHandler<T> {
    /// What the strategy produces from the joined outcomes
    type Output;

    /// Handle the outcomes according to the strategy
    fn handle_results(results: Vec<Outcome<T>>) -> Self::Output;
}

/// Fail fast strategy
///
/// All values on success, otherwise the first failure in input order.
pub struct FailFastHandler;

impl<T> ErrorHandler<T> for FailFastHandler {
    type Output = Outcome<Vec<T>>;

    fn handle_results(results: Vec<Outcome<T>>) -> Outcome<Vec<T>> {
        results.into_iter().collect()
    }
}

/// Collect all strategy
///
/// Never fails: every outcome becomes a positional [`Settled`] record.
pub struct CollectHandler;

impl<T> ErrorHandler<T> for CollectHandler {
    type Output = Vec<Settled<T>>;

    fn handle_results(results: Vec<Outcome<T>>) -> Vec<Settled<T>> {
        results.into_iter().map(Settled::from).collect()
    }
}

/// Log and ignore errors strategy
///
/// Failures are logged at `warn` level and dropped; the fulfilled values are
/// kept in order.
pub struct LogAndIgnoreHandler;

impl<T> ErrorHandler<T> for LogAndIgnoreHandler {
    type Output = Vec<T>;

    fn handle_results(results: Vec<Outcome<T>>) -> Vec<T> {
        results
            .into_iter()
            .enumerate()
            .filter_map(|(index, outcome)| match outcome {
                Ok(value) => Some(value),
                Err(error) => {
                    tracing::warn!(index, error = %error, "joined result failed (ignored)");
                    None
                }
            })
            .collect()
    }
}
