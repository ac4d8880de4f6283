//! Fluent wrapper around an asynchronous computation
//!
//! [`AsyncResult`] owns a single boxed future that settles to an
//! [`Outcome`]. Every chaining operation consumes the receiver and returns a
//! new handle over a derived future, so a chain can never be aliased.
//! Nothing runs until the result is awaited, [`run`](AsyncResult::run) or
//! [`spawn`](AsyncResult::spawn)ed.

use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::future::{self, BoxFuture, FutureExt};

use crate::traits::IntoAsyncResult;
use crate::{Combiner, Error, Outcome, ProcessedError};

/// Asynchronous computation settling to a value of type `T` or an [`Error`]
///
/// Failures short-circuit every success operation until a compensating
/// operation ([`on_failure_compensate`](Self::on_failure_compensate),
/// [`recover`](Self::recover), [`on_both`](Self::on_both), ...) intervenes.
/// A panic inside any callback is caught and becomes a raw failure.
///
/// # Examples
///
/// ```rust
/// use resultex::AsyncResult;
///
/// #[tokio::main]
/// async fn main() {
///     let value = AsyncResult::ok(1)
///         .ensure(|v| *v == 1, "no")
///         .on_success_map(|v| v + 1)
///         .run()
///         .await;
///
///     assert_eq!(value, Ok(2));
/// }
/// ```
#[must_use = "an AsyncResult does nothing unless it is awaited, run or spawned"]
pub struct AsyncResult<T> {
    future: BoxFuture<'static, Outcome<T>>,
}

/// Run a user callback, turning a panic into a failure
pub(crate) fn catch<R>(callback: impl FnOnce() -> R) -> Outcome<R> {
    panic::catch_unwind(AssertUnwindSafe(callback)).map_err(Error::from_panic)
}

impl<T> AsyncResult<T>
where
    T: Send + 'static,
{
    fn new<F>(future: F) -> Self
    where
        F: Future<Output = Outcome<T>> + Send + 'static,
    {
        Self {
            future: Box::pin(future),
        }
    }

    // Construction

    /// A result that succeeds with `value`
    pub fn ok(value: T) -> Self {
        Self::new(future::ready(Ok(value)))
    }

    /// A result that fails with `error`
    pub fn fail(error: impl Into<Error>) -> Self {
        Self::new(future::ready(Err(error.into())))
    }

    /// A result that fails with `error` already marked as processed
    pub fn fail_as_processed(error: impl Into<Error>) -> Self {
        Self::new(future::ready(Err(error.into().process())))
    }

    /// Adopt an external future
    ///
    /// A panic while polling `future` becomes a failure of the result.
    pub fn from_future<F, E>(future: F) -> Self
    where
        F: Future<Output = std::result::Result<T, E>> + Send + 'static,
        E: Into<Error>,
    {
        Self::new(AssertUnwindSafe(future).catch_unwind().map(|caught| match caught {
            Ok(outcome) => outcome.map_err(Into::into),
            Err(payload) => Err(Error::from_panic(payload)),
        }))
    }

    /// Succeed with the value if present, otherwise fail with `error`
    ///
    /// Only `None` counts as absent: `Some(0)`, `Some("")` and `Some(false)`
    /// all succeed.
    pub fn wrap(value: Option<T>, error: impl Into<Error>) -> Self {
        match value {
            Some(value) => Self::ok(value),
            None => Self::fail(error),
        }
    }

    /// Call `factory` until it succeeds, at most `times + 1` times
    ///
    /// Attempts are separated by `delay`; a zero delay retries on the next
    /// scheduling tick. When every attempt fails the result fails with the
    /// last error.
    ///
    /// ```rust
    /// use std::time::Duration;
    /// use resultex::AsyncResult;
    ///
    /// #[tokio::main]
    /// async fn main() {
    ///     let mut calls = 0;
    ///     let outcome = AsyncResult::retry(2, Duration::ZERO, move || {
    ///         calls += 1;
    ///         AsyncResult::create(calls == 3, "not yet")
    ///     })
    ///     .await;
    ///
    ///     assert_eq!(outcome, Ok(true));
    /// }
    /// ```
    pub fn retry<F>(times: u32, delay: Duration, mut factory: F) -> Self
    where
        F: FnMut() -> AsyncResult<T> + Send + 'static,
    {
        Self::new(async move {
            let mut retried = 0;
            loop {
                let error = match catch(&mut factory) {
                    Ok(attempt) => match attempt.await {
                        Ok(value) => return Ok(value),
                        Err(error) => error,
                    },
                    Err(error) => error,
                };

                if retried == times {
                    tracing::warn!(attempts = retried + 1, error = %error, "retries exhausted");
                    return Err(error);
                }

                retried += 1;
                tracing::debug!(retry = retried, of = times, error = %error, "attempt failed, retrying");

                if delay.is_zero() {
                    tokio::task::yield_now().await;
                } else {
                    tokio::time::sleep(delay).await;
                }
            }
        })
    }

    /// Run factories strictly one after another
    ///
    /// Each factory is invoked only after the previous result succeeded; the
    /// first failure stops the chain.
    pub fn join_factories<I, F>(factories: I) -> AsyncResult<Vec<T>>
    where
        I: IntoIterator<Item = F>,
        F: FnOnce() -> AsyncResult<T> + Send + 'static,
    {
        let factories: Vec<F> = factories.into_iter().collect();

        AsyncResult::new(async move {
            let mut values = Vec::with_capacity(factories.len());
            for factory in factories {
                let next = catch(factory)?;
                values.push(next.await?);
            }
            Ok(values)
        })
    }

    /// Join results concurrently, see [`Combiner::combine_many`]
    pub fn combine(results: Vec<AsyncResult<T>>) -> AsyncResult<Vec<T>> {
        Combiner::combine_many(results)
    }

    // Success chaining

    /// Monadic bind: on success hand the value to `action` and adopt its result
    ///
    /// `action` may return another `AsyncResult` or a plain
    /// `std::result::Result`. It is never called on a failed receiver.
    pub fn on_success<R, F>(self, action: F) -> AsyncResult<R::Value>
    where
        F: FnOnce(T) -> R + Send + 'static,
        R: IntoAsyncResult,
    {
        AsyncResult::new(async move {
            let value = self.await?;
            let next = catch(move || action(value))?.into_async_result();
            next.await
        })
    }

    /// Map the success value
    pub fn on_success_map<V, F>(self, action: F) -> AsyncResult<V>
    where
        F: FnOnce(T) -> V + Send + 'static,
        V: Send + 'static,
    {
        AsyncResult::new(async move {
            let value = self.await?;
            catch(move || action(value))
        })
    }

    /// Run a side effect on success and keep the original value
    ///
    /// A failure of the side effect fails the chain.
    pub fn on_success_execute<R, F>(self, action: F) -> Self
    where
        F: FnOnce(&T) -> R + Send + 'static,
        R: IntoAsyncResult,
    {
        Self::new(async move {
            let value = self.await?;
            let side_effect = catch(|| action(&value))?.into_async_result();
            side_effect.await?;
            Ok(value)
        })
    }

    /// [`on_success`](Self::on_success) applied only when `condition` holds
    pub fn on_success_when<R, P, F>(self, condition: P, action: F) -> Self
    where
        P: FnOnce(&T) -> bool + Send + 'static,
        F: FnOnce(T) -> R + Send + 'static,
        R: IntoAsyncResult<Value = T>,
    {
        Self::new(async move {
            let value = self.await?;
            if !catch(|| condition(&value))? {
                return Ok(value);
            }
            let next = catch(move || action(value))?.into_async_result();
            next.await
        })
    }

    /// [`on_success_map`](Self::on_success_map) applied only when `condition` holds
    pub fn on_success_when_map<P, F>(self, condition: P, action: F) -> Self
    where
        P: FnOnce(&T) -> bool + Send + 'static,
        F: FnOnce(T) -> T + Send + 'static,
    {
        Self::new(async move {
            let value = self.await?;
            if !catch(|| condition(&value))? {
                return Ok(value);
            }
            catch(move || action(value))
        })
    }

    /// [`on_success_execute`](Self::on_success_execute) applied only when `condition` holds
    pub fn on_success_when_execute<R, P, F>(self, condition: P, action: F) -> Self
    where
        P: FnOnce(&T) -> bool + Send + 'static,
        F: FnOnce(&T) -> R + Send + 'static,
        R: IntoAsyncResult,
    {
        Self::new(async move {
            let value = self.await?;
            if catch(|| condition(&value))? {
                let side_effect = catch(|| action(&value))?.into_async_result();
                side_effect.await?;
            }
            Ok(value)
        })
    }

    /// Map the success value to `()`
    pub fn into_void(self) -> AsyncResult<()> {
        self.on_success_map(|_| ())
    }

    /// Wait `duration` after success before passing the value on
    pub fn with_delay(self, duration: Duration) -> Self {
        Self::new(async move {
            let value = self.await?;
            tokio::time::sleep(duration).await;
            Ok(value)
        })
    }

    // Guards

    /// Fail with `error` unless `condition` holds for the success value
    pub fn ensure<P>(self, condition: P, error: impl Into<Error>) -> Self
    where
        P: FnOnce(&T) -> bool + Send + 'static,
    {
        let error = error.into();
        Self::new(async move {
            let value = self.await?;
            if catch(|| condition(&value))? {
                Ok(value)
            } else {
                Err(error)
            }
        })
    }

    /// [`ensure`](Self::ensure) with the failure marked as processed
    pub fn ensure_as_processed<P>(self, condition: P, error: impl Into<Error>) -> Self
    where
        P: FnOnce(&T) -> bool + Send + 'static,
    {
        self.ensure(condition, error.into().process())
    }

    /// [`ensure`](Self::ensure) followed by [`on_success`](Self::on_success)
    pub fn ensure_as<R, P, F>(
        self,
        condition: P,
        error: impl Into<Error>,
        action: F,
    ) -> AsyncResult<R::Value>
    where
        P: FnOnce(&T) -> bool + Send + 'static,
        F: FnOnce(T) -> R + Send + 'static,
        R: IntoAsyncResult,
    {
        self.ensure(condition, error).on_success(action)
    }

    /// Guard with an asynchronous predicate
    ///
    /// A predicate that fails, panics or settles to `false` all collapse to
    /// `error`; the predicate's own error is discarded.
    pub fn ensure_result<R, P>(self, condition: P, error: impl Into<Error>) -> Self
    where
        P: FnOnce(&T) -> R + Send + 'static,
        R: IntoAsyncResult<Value = bool>,
    {
        let error = error.into();
        Self::new(async move {
            let value = self.await?;
            let check = catch(|| condition(&value)).map(IntoAsyncResult::into_async_result);
            let passed = match check {
                Ok(check) => matches!(check.await, Ok(true)),
                Err(_) => false,
            };
            if passed {
                Ok(value)
            } else {
                Err(error)
            }
        })
    }

    /// Extract an optional value, failing with `error` on `None`
    pub fn ensure_unwrap<V, F>(self, unwrap: F, error: impl Into<Error>) -> AsyncResult<V>
    where
        F: FnOnce(T) -> Option<V> + Send + 'static,
        V: Send + 'static,
    {
        let error = error.into();
        AsyncResult::new(async move {
            let value = self.await?;
            catch(move || unwrap(value))?.ok_or(error)
        })
    }

    /// [`ensure_unwrap`](Self::ensure_unwrap) with the failure marked as processed
    pub fn ensure_unwrap_as_processed<V, F>(
        self,
        unwrap: F,
        error: impl Into<Error>,
    ) -> AsyncResult<V>
    where
        F: FnOnce(T) -> Option<V> + Send + 'static,
        V: Send + 'static,
    {
        self.ensure_unwrap(unwrap, error.into().process())
    }

    // Failure handling

    /// Observe a failure without changing it
    ///
    /// The chain keeps failing with the same error afterwards. A panic in
    /// `action` replaces the error.
    pub fn on_failure<F>(self, action: F) -> Self
    where
        F: FnOnce(&Error) + Send + 'static,
    {
        Self::new(async move {
            match self.await {
                Ok(value) => Ok(value),
                Err(error) => {
                    catch(|| action(&error))?;
                    Err(error)
                }
            }
        })
    }

    /// Replace a failure with the result of `action`
    ///
    /// The replacement may fail again. Successes pass through untouched.
    pub fn on_failure_compensate<R, F>(self, action: F) -> Self
    where
        F: FnOnce(Error) -> R + Send + 'static,
        R: IntoAsyncResult<Value = T>,
    {
        Self::new(async move {
            match self.await {
                Ok(value) => Ok(value),
                Err(error) => {
                    let next = catch(move || action(error))?.into_async_result();
                    next.await
                }
            }
        })
    }

    /// Turn every outcome into `Ok(())`
    pub fn recover(self) -> AsyncResult<()> {
        AsyncResult::new(async move {
            if let Err(error) = self.await {
                tracing::debug!(error = %error, "recovered from failure");
            }
            Ok(())
        })
    }

    /// Run `action` once whatever the outcome and adopt its result
    pub fn on_both<R, F>(self, action: F) -> AsyncResult<R::Value>
    where
        F: FnOnce() -> R + Send + 'static,
        R: IntoAsyncResult,
    {
        AsyncResult::new(async move {
            // superseded by the action's outcome either way
            let _ = self.await;
            let next = catch(action)?.into_async_result();
            next.await
        })
    }

    /// Run `action` once whatever the outcome, keeping the original outcome
    ///
    /// On success a failing `action` fails the chain. On failure the original
    /// error is re-raised once `action` has completed, whatever it returned.
    pub fn on_both_execute<R, F>(self, action: F) -> Self
    where
        F: FnOnce() -> R + Send + 'static,
        R: IntoAsyncResult,
    {
        Self::new(async move {
            let outcome = self.await;
            let side_effect = catch(action).map(IntoAsyncResult::into_async_result);
            let executed = match side_effect {
                Ok(side_effect) => side_effect.await.map(|_| ()),
                Err(error) => Err(error),
            };

            match outcome {
                Ok(value) => executed.map(|()| value),
                Err(error) => {
                    if let Err(discarded) = executed {
                        tracing::debug!(error = %discarded, "side effect failed after an earlier failure");
                    }
                    Err(error)
                }
            }
        })
    }

    // Overrides

    /// Succeed with `value`, discarding any previous value or error
    pub fn with_overridden_value<V>(self, value: V) -> AsyncResult<V>
    where
        V: Send + 'static,
    {
        AsyncResult::new(async move {
            let _ = self.await;
            Ok(value)
        })
    }

    /// Replace a failure with `error`, marked as processed
    ///
    /// Applies even when the current error is already processed, so later
    /// [`with_processed_fail`](Self::with_processed_fail) calls keep it.
    /// Successes pass through.
    pub fn with_overridden_fail(self, error: impl Into<Error>) -> Self {
        let replacement = error.into();
        Self::new(async move {
            match self.await {
                Ok(value) => Ok(value),
                Err(original) => Err(ProcessedError::new(replacement.message(), original).into()),
            }
        })
    }

    /// Transform a raw failure through `factory` and mark it processed
    ///
    /// Already processed failures are left untouched, so only the first
    /// transformation in a chain takes effect.
    pub fn with_processed_fail<E, F>(self, factory: F) -> Self
    where
        F: FnOnce(&Error) -> E + Send + 'static,
        E: Into<Error>,
    {
        Self::new(async move {
            match self.await {
                Ok(value) => Ok(value),
                Err(error) if error.is_processed() => Err(error),
                Err(error) => {
                    let replacement: Error = catch(|| factory(&error))?.into();
                    Err(ProcessedError::new(replacement.message(), error).into())
                }
            }
        })
    }

    /// Success becomes `true`, failure becomes `false`; never fails
    pub fn transform_boolean_success(self) -> AsyncResult<bool> {
        AsyncResult::new(async move { Ok(self.await.is_ok()) })
    }

    // Termination

    /// The underlying future
    pub fn as_future(self) -> BoxFuture<'static, Outcome<T>> {
        self.future
    }

    /// Drive the chain to completion
    ///
    /// A failure is logged at `debug` level and returned to the caller.
    pub async fn run(self) -> Outcome<T> {
        let outcome = self.await;
        if let Err(error) = &outcome {
            tracing::debug!(error = %error, processed = error.is_processed(), "result settled with failure");
        }
        outcome
    }

    /// Like [`run`](Self::run) but keeps the result chainable
    pub fn run_as_result(self) -> Self {
        Self::new(self.run())
    }

    /// Start the chain eagerly on the current tokio runtime
    ///
    /// The returned result joins the spawned task. Outside of a runtime the
    /// chain stays lazy and is returned as is.
    pub fn spawn(self) -> Self {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                tracing::debug!("no tokio runtime, result stays lazy");
                return self;
            }
        };

        let task = runtime.spawn(self.run());
        Self::new(async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(join_error) if join_error.is_panic() => {
                    Err(Error::from_panic(join_error.into_panic()))
                }
                Err(join_error) => Err(Error::new(join_error)),
            }
        })
    }
}

impl AsyncResult<()> {
    /// A result that succeeds with `()`
    pub fn void() -> Self {
        Self::ok(())
    }

    /// A result that succeeds with `()` after `duration`
    pub fn delay(duration: Duration) -> Self {
        Self::void().with_delay(duration)
    }
}

impl AsyncResult<bool> {
    /// A result that succeeds with `true`
    pub fn start() -> Self {
        Self::ok(true)
    }

    /// Succeed with `true` when `condition` holds, otherwise fail with `error`
    pub fn create(condition: bool, error: impl Into<Error>) -> Self {
        if condition {
            Self::ok(true)
        } else {
            Self::fail(error)
        }
    }
}

impl<T> Future for AsyncResult<T> {
    type Output = Outcome<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.future.as_mut().poll(cx)
    }
}

impl<T> fmt::Debug for AsyncResult<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncResult").finish_non_exhaustive()
    }
}
