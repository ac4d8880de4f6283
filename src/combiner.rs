//! Parallel and sequential composition of results
//!
//! Joins poll every input inside the same task; nothing here spawns work on
//! another thread. Failure timing of the all-or-nothing joins is a race: the
//! reported error is the first one observed while polling, which is not
//! necessarily the leftmost one.

use std::num::NonZeroUsize;

use futures::future;
use futures::stream::{FuturesUnordered, Stream, StreamExt};

use crate::handlers::{CollectHandler, ErrorHandler, LogAndIgnoreHandler};
use crate::result::catch;
use crate::{AbortSignal, AsyncResult, Error, Outcome};

/// A type-erased factory, see [`factories!`](crate::factories)
pub type BoxedFactory<T> = Box<dyn FnOnce() -> AsyncResult<T> + Send>;

/// Per-input record of [`Combiner::combine_settled`]
#[derive(Debug, Clone, PartialEq)]
pub enum Settled<T> {
    /// The input succeeded with this value
    Fulfilled(T),
    /// The input failed with this error
    Rejected(Error),
}

impl<T> Settled<T> {
    /// Whether the input succeeded
    pub fn is_fulfilled(&self) -> bool {
        matches!(self, Settled::Fulfilled(_))
    }

    /// Back into a plain outcome
    pub fn into_outcome(self) -> Outcome<T> {
        match self {
            Settled::Fulfilled(value) => Ok(value),
            Settled::Rejected(error) => Err(error),
        }
    }
}

impl<T> From<Outcome<T>> for Settled<T> {
    fn from(outcome: Outcome<T>) -> Self {
        match outcome {
            Ok(value) => Settled::Fulfilled(value),
            Err(error) => Settled::Rejected(error),
        }
    }
}

/// Options of [`Combiner::combine_factories`]
///
/// # Examples
///
/// ```rust
/// use resultex::{AbortController, CombineOptions};
///
/// let controller = AbortController::new();
/// let options = CombineOptions::new()
///     .concurrency(2)
///     .stop_on_error(false)
///     .abort_signal(controller.signal());
///
/// assert_eq!(options.concurrency_limit(), Some(2));
/// ```
#[derive(Debug, Clone)]
pub struct CombineOptions {
    concurrency: Option<NonZeroUsize>,
    stop_on_error: bool,
    abort_signal: Option<AbortSignal>,
}

impl Default for CombineOptions {
    fn default() -> Self {
        Self {
            concurrency: None,
            stop_on_error: true,
            abort_signal: None,
        }
    }
}

impl CombineOptions {
    /// Unbounded concurrency, stop on the first error, no abort signal
    pub fn new() -> Self {
        Self::default()
    }

    /// Run at most `limit` factories at once; `0` means unbounded
    pub fn concurrency(mut self, limit: usize) -> Self {
        self.concurrency = NonZeroUsize::new(limit);
        self
    }

    /// Fail on the first observed failure instead of waiting for every
    /// launched factory to settle
    pub fn stop_on_error(mut self, stop: bool) -> Self {
        self.stop_on_error = stop;
        self
    }

    /// Stop launching factories once `signal` fires
    pub fn abort_signal(mut self, signal: AbortSignal) -> Self {
        self.abort_signal = Some(signal);
        self
    }

    /// The configured concurrency limit, `None` when unbounded
    pub fn concurrency_limit(&self) -> Option<usize> {
        self.concurrency.map(NonZeroUsize::get)
    }

    fn is_aborted(&self) -> bool {
        self.abort_signal
            .as_ref()
            .is_some_and(AbortSignal::is_aborted)
    }
}

/// Tuples of results that can be joined into a result of a tuple
///
/// Implemented for tuples of two to twelve [`AsyncResult`]s.
pub trait Combine {
    /// The tuple of success values
    type Output: Send + 'static;

    /// Join every element concurrently
    fn combine(self) -> AsyncResult<Self::Output>;
}

macro_rules! impl_combine_tuple {
    ($($name:ident : $ty:ident),+) => {
        impl<$($ty),+> Combine for ($(AsyncResult<$ty>,)+)
        where
            $($ty: Send + 'static,)+
        {
            type Output = ($($ty,)+);

            fn combine(self) -> AsyncResult<Self::Output> {
                let ($($name,)+) = self;
                AsyncResult::from_future(async move { futures::try_join!($($name),+) })
            }
        }
    };
}

impl_combine_tuple!(r1: T1, r2: T2);
impl_combine_tuple!(r1: T1, r2: T2, r3: T3);
impl_combine_tuple!(r1: T1, r2: T2, r3: T3, r4: T4);
impl_combine_tuple!(r1: T1, r2: T2, r3: T3, r4: T4, r5: T5);
impl_combine_tuple!(r1: T1, r2: T2, r3: T3, r4: T4, r5: T5, r6: T6);
impl_combine_tuple!(r1: T1, r2: T2, r3: T3, r4: T4, r5: T5, r6: T6, r7: T7);
impl_combine_tuple!(r1: T1, r2: T2, r3: T3, r4: T4, r5: T5, r6: T6, r7: T7, r8: T8);
impl_combine_tuple!(r1: T1, r2: T2, r3: T3, r4: T4, r5: T5, r6: T6, r7: T7, r8: T8, r9: T9);
impl_combine_tuple!(r1: T1, r2: T2, r3: T3, r4: T4, r5: T5, r6: T6, r7: T7, r8: T8, r9: T9, r10: T10);
impl_combine_tuple!(r1: T1, r2: T2, r3: T3, r4: T4, r5: T5, r6: T6, r7: T7, r8: T8, r9: T9, r10: T10, r11: T11);
impl_combine_tuple!(r1: T1, r2: T2, r3: T3, r4: T4, r5: T5, r6: T6, r7: T7, r8: T8, r9: T9, r10: T10, r11: T11, r12: T12);

/// Joins of several results
pub struct Combiner;

impl Combiner {
    /// Join a tuple of heterogeneous results
    ///
    /// Succeeds with the tuple of values when every input succeeds, otherwise
    /// fails with the first failure observed.
    ///
    /// ```rust
    /// use resultex::{AsyncResult, Combiner};
    ///
    /// #[tokio::main]
    /// async fn main() {
    ///     let joined = Combiner::combine((AsyncResult::ok(1), AsyncResult::ok("two"))).await;
    ///     assert_eq!(joined, Ok((1, "two")));
    /// }
    /// ```
    pub fn combine<C: Combine>(results: C) -> AsyncResult<C::Output> {
        results.combine()
    }

    /// Join a list of results, all or nothing
    pub fn combine_many<T>(results: Vec<AsyncResult<T>>) -> AsyncResult<Vec<T>>
    where
        T: Send + 'static,
    {
        AsyncResult::from_future(future::try_join_all(results))
    }

    /// Join a list of results without ever failing
    ///
    /// The records keep the input order.
    pub fn combine_settled<T>(results: Vec<AsyncResult<T>>) -> AsyncResult<Vec<Settled<T>>>
    where
        T: Send + 'static,
    {
        AsyncResult::from_future(async move {
            let outcomes = future::join_all(results).await;
            Ok::<_, Error>(CollectHandler::handle_results(outcomes))
        })
    }

    /// Join a list of results, logging and dropping every failure
    pub fn combine_successful<T>(results: Vec<AsyncResult<T>>) -> AsyncResult<Vec<T>>
    where
        T: Send + 'static,
    {
        AsyncResult::from_future(async move {
            let outcomes = future::join_all(results).await;
            Ok::<_, Error>(LogAndIgnoreHandler::handle_results(outcomes))
        })
    }

    /// Run factories with bounded concurrency
    ///
    /// Factories are invoked only when a slot frees up. The values keep the
    /// input order whatever the completion order.
    ///
    /// Running factories are never interrupted. With `stop_on_error` (the
    /// default) the join fails as soon as one factory fails; the factories
    /// still running are left to finish on the tokio runtime and nothing new
    /// is launched. Without it every factory settles first: a single failure
    /// is returned as is, several are folded into [`Error::aggregate`] in
    /// input order.
    ///
    /// Once the abort signal fires no further factory is launched; the ones
    /// already running are awaited and the join fails with `"aborted"`. A
    /// signal that fires after the last factory was launched is ignored.
    ///
    /// ```rust
    /// use resultex::{AsyncResult, CombineOptions, Combiner};
    ///
    /// #[tokio::main]
    /// async fn main() {
    ///     let factories: Vec<_> = (1..=5).map(|i| move || AsyncResult::ok(i * 10)).collect();
    ///     let joined = Combiner::combine_factories(factories, CombineOptions::new().concurrency(2)).await;
    ///     assert_eq!(joined, Ok(vec![10, 20, 30, 40, 50]));
    /// }
    /// ```
    pub fn combine_factories<T, I, F>(factories: I, options: CombineOptions) -> AsyncResult<Vec<T>>
    where
        T: Send + 'static,
        I: IntoIterator<Item = F>,
        F: FnOnce() -> AsyncResult<T> + Send + 'static,
    {
        let factories: Vec<F> = factories.into_iter().collect();

        AsyncResult::from_future(async move {
            let total = factories.len();
            let limit = options.concurrency_limit().unwrap_or(total).max(1);
            let mut slots: Vec<Option<Outcome<T>>> = (0..total).map(|_| None).collect();
            let mut pending = factories.into_iter().enumerate();
            let mut in_flight = FuturesUnordered::new();
            let mut launched = 0;
            let mut aborted = false;

            loop {
                while in_flight.len() < limit && !aborted && launched < total {
                    if options.is_aborted() {
                        tracing::debug!(launched, total, "factory join aborted");
                        aborted = true;
                        break;
                    }
                    let Some((index, factory)) = pending.next() else {
                        break;
                    };
                    launched += 1;
                    let started = catch(factory);
                    in_flight.push(async move {
                        match started {
                            Ok(result) => (index, result.await),
                            Err(error) => (index, Err(error)),
                        }
                    });
                }

                let Some((index, outcome)) = in_flight.next().await else {
                    break;
                };

                if options.stop_on_error {
                    if let Err(error) = outcome {
                        if !in_flight.is_empty() {
                            Self::finish_detached(in_flight).await;
                        }
                        return Err(error);
                    }
                }
                slots[index] = Some(outcome);
            }

            if aborted {
                return Err(Error::msg("aborted"));
            }

            let mut values = Vec::with_capacity(total);
            let mut failures = Vec::new();
            for slot in slots {
                match slot.unwrap_or_else(|| Err(Error::msg("factory never settled"))) {
                    Ok(value) => values.push(value),
                    Err(error) => failures.push(error),
                }
            }

            match failures.len() {
                0 => Ok(values),
                1 => Err(failures.remove(0)),
                _ => Err(Error::aggregate(failures)),
            }
        })
    }

    /// Let the factories still running after a failure settle on their own
    ///
    /// Outside of a tokio runtime they are awaited here instead.
    async fn finish_detached<S>(mut in_flight: S)
    where
        S: Stream + Unpin + Send + 'static,
    {
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                tracing::debug!(
                    running = in_flight.size_hint().0,
                    "factory join failed, leaving running factories to finish"
                );
                runtime.spawn(async move { while in_flight.next().await.is_some() {} });
            }
            Err(_) => {
                while in_flight.next().await.is_some() {}
            }
        }
    }

    /// Run factories strictly one after another, see
    /// [`AsyncResult::join_factories`]
    pub fn join_factories<T, I, F>(factories: I) -> AsyncResult<Vec<T>>
    where
        T: Send + 'static,
        I: IntoIterator<Item = F>,
        F: FnOnce() -> AsyncResult<T> + Send + 'static,
    {
        AsyncResult::join_factories(factories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AbortController;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;

    #[tokio::test]
    async fn test_combine_tuples() {
        let two = Combiner::combine((AsyncResult::ok(1), AsyncResult::ok("a"))).await;
        assert_eq!(two, Ok((1, "a")));

        let four = Combiner::combine((AsyncResult::ok(1), AsyncResult::ok(2), AsyncResult::ok(3), AsyncResult::ok(4))).await;
        assert_eq!(four, Ok((1, 2, 3, 4)));

        let five = Combiner::combine((
            AsyncResult::ok(1),
            AsyncResult::ok("2"),
            AsyncResult::ok(3u64),
            AsyncResult::ok(true),
            AsyncResult::ok(vec![5]),
        ))
        .await;
        assert_eq!(five, Ok((1, "2", 3u64, true, vec![5])));

        let six = Combiner::combine((
            AsyncResult::ok(1),
            AsyncResult::ok(2),
            AsyncResult::ok(3),
            AsyncResult::ok(4),
            AsyncResult::ok(5),
            AsyncResult::ok(6),
        ))
        .await;
        assert_eq!(six, Ok((1, 2, 3, 4, 5, 6)));

        let seven = Combiner::combine((
            AsyncResult::ok(1),
            AsyncResult::ok(2u8),
            AsyncResult::ok("3"),
            AsyncResult::ok(4.0),
            AsyncResult::ok('5'),
            AsyncResult::ok(String::from("6")),
            AsyncResult::ok(Some(7)),
        ))
        .await;
        assert_eq!(seven, Ok((1, 2u8, "3", 4.0, '5', String::from("6"), Some(7))));
    }

    #[tokio::test]
    async fn test_combine_tuple_fails_when_any_fails() {
        let joined = Combiner::combine((
            AsyncResult::ok(1),
            AsyncResult::<i32>::fail("error"),
            AsyncResult::ok(3),
        ))
        .await;
        assert_eq!(joined, Err(Error::msg("error")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_combine_reports_first_failure_in_time() {
        let slow = AsyncResult::delay(Duration::from_secs(2)).on_success(|_| AsyncResult::<i32>::fail("slow"));
        let fast = AsyncResult::delay(Duration::from_secs(1)).on_success(|_| AsyncResult::<i32>::fail("fast"));

        let joined = Combiner::combine((slow, fast)).await;
        assert_eq!(joined, Err(Error::msg("fast")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_combine_runs_concurrently() {
        let started = Instant::now();
        let joined = Combiner::combine_many(vec![
            AsyncResult::delay(Duration::from_secs(1)).with_overridden_value(1),
            AsyncResult::delay(Duration::from_secs(1)).with_overridden_value(2),
            AsyncResult::delay(Duration::from_secs(1)).with_overridden_value(3),
        ])
        .await;

        assert_eq!(joined, Ok(vec![1, 2, 3]));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_combine_many() {
        let ok = AsyncResult::combine(vec![AsyncResult::ok(1), AsyncResult::ok(2), AsyncResult::ok(3)]).await;
        assert_eq!(ok, Ok(vec![1, 2, 3]));

        let failed = Combiner::combine_many(vec![
            AsyncResult::ok(1),
            AsyncResult::ok(2),
            AsyncResult::fail("error"),
        ])
        .await;
        assert_eq!(failed, Err(Error::msg("error")));

        let empty = Combiner::combine_many(Vec::<AsyncResult<i32>>::new()).await;
        assert_eq!(empty, Ok(vec![]));
    }

    #[tokio::test]
    async fn test_combine_settled_never_fails() {
        let settled = Combiner::combine_settled(vec![
            AsyncResult::ok(1),
            AsyncResult::fail("x"),
            AsyncResult::ok(2),
        ])
        .await;

        assert_eq!(
            settled,
            Ok(vec![
                Settled::Fulfilled(1),
                Settled::Rejected(Error::msg("x")),
                Settled::Fulfilled(2),
            ])
        );
    }

    #[tokio::test]
    async fn test_combine_successful_drops_failures() {
        let values = Combiner::combine_successful(vec![
            AsyncResult::ok(1),
            AsyncResult::fail("x"),
            AsyncResult::ok(2),
        ])
        .await;
        assert_eq!(values, Ok(vec![1, 2]));
    }

    fn tracked(
        delay_ms: u64,
        value: i32,
        running: &Arc<AtomicUsize>,
        peak: &Arc<AtomicUsize>,
    ) -> impl FnOnce() -> AsyncResult<i32> + Send + 'static {
        let running = Arc::clone(running);
        let peak = Arc::clone(peak);
        move || {
            let now = running.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            AsyncResult::delay(Duration::from_millis(delay_ms)).on_success_map(move |_| {
                running.fetch_sub(1, Ordering::SeqCst);
                value
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_combine_factories_keeps_input_order() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let factories = vec![
            tracked(3000, 1, &running, &peak),
            tracked(3000, 1, &running, &peak),
            tracked(0, 2, &running, &peak),
            tracked(0, 2, &running, &peak),
            tracked(2000, 3, &running, &peak),
        ];

        let joined = Combiner::combine_factories(factories, CombineOptions::new().concurrency(2)).await;

        assert_eq!(joined, Ok(vec![1, 1, 2, 2, 3]));
        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_combine_factories_unbounded_by_default() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let factories: Vec<_> = (0..4).map(|i| tracked(100, i, &running, &peak)).collect();

        let joined = Combiner::combine_factories(factories, CombineOptions::default()).await;

        assert_eq!(joined, Ok(vec![0, 1, 2, 3]));
        assert_eq!(peak.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_combine_factories_lazy_invocation() {
        let invoked = Arc::new(AtomicUsize::new(0));
        let factories: Vec<_> = (0..3)
            .map(|i| {
                let invoked = Arc::clone(&invoked);
                move || {
                    invoked.fetch_add(1, Ordering::SeqCst);
                    AsyncResult::ok(i)
                }
            })
            .collect();

        let joined = Combiner::combine_factories(factories, CombineOptions::new().concurrency(1));
        assert_eq!(invoked.load(Ordering::SeqCst), 0);
        assert_eq!(joined.await, Ok(vec![0, 1, 2]));
        assert_eq!(invoked.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_combine_factories_stop_on_error() {
        let started = Instant::now();
        let factories = crate::factories![
            || AsyncResult::delay(Duration::from_secs(10)).with_overridden_value(1),
            || AsyncResult::delay(Duration::from_secs(1)).on_success(|_| AsyncResult::<i32>::fail("boom")),
        ];

        let joined = Combiner::combine_factories(factories, CombineOptions::new()).await;

        assert_eq!(joined, Err(Error::msg("boom")));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_combine_factories_waits_without_stop_on_error() {
        let started = Instant::now();
        let factories = crate::factories![
            || AsyncResult::delay(Duration::from_secs(10)).with_overridden_value(1),
            || AsyncResult::delay(Duration::from_secs(2)).on_success(|_| AsyncResult::<i32>::fail("second")),
            || AsyncResult::delay(Duration::from_secs(1)).on_success(|_| AsyncResult::<i32>::fail("third")),
        ];

        let joined = Combiner::combine_factories(factories, CombineOptions::new().stop_on_error(false)).await;

        assert!(started.elapsed() >= Duration::from_secs(10));
        let error = joined.unwrap_err();
        assert_eq!(error.message(), "2 joined results failed: second; third");
        match error {
            Error::Raw(raw) => assert_eq!(raw.failures(), &[Error::msg("second"), Error::msg("third")]),
            Error::Processed(_) => panic!("expected raw error"),
        }
    }

    #[tokio::test]
    async fn test_combine_factories_single_failure_without_stop_on_error() {
        let factories = crate::factories![|| AsyncResult::ok(1), || AsyncResult::<i32>::fail("only")];
        let joined = Combiner::combine_factories(factories, CombineOptions::new().stop_on_error(false)).await;
        assert_eq!(joined, Err(Error::msg("only")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_combine_factories_failure_leaves_running_factories_alone() {
        let finished = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&finished);
        let factories = crate::factories![
            move || {
                AsyncResult::delay(Duration::from_secs(2)).on_success_map(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    1
                })
            },
            || AsyncResult::delay(Duration::from_secs(1)).on_success(|_| AsyncResult::<i32>::fail("boom")),
        ];

        let started = Instant::now();
        let joined = Combiner::combine_factories(factories, CombineOptions::new()).await;
        assert_eq!(joined, Err(Error::msg("boom")));
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(finished.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_combine_factories_abort_after_last_launch_is_ignored() {
        let controller = AbortController::new();
        let trigger = controller.clone();
        let factories = crate::factories![
            || AsyncResult::ok(1),
            move || {
                trigger.abort();
                AsyncResult::ok(2)
            },
        ];

        let options = CombineOptions::new().abort_signal(controller.signal());
        let joined = Combiner::combine_factories(factories, options).await;

        assert_eq!(joined, Ok(vec![1, 2]));
        assert!(controller.signal().is_aborted());
    }

    #[tokio::test(start_paused = true)]
    async fn test_combine_factories_abort_stops_launching() {
        let controller = AbortController::new();
        let launched = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicUsize::new(0));

        let factories: Vec<_> = (0..5)
            .map(|i| {
                let controller = controller.clone();
                let launched = Arc::clone(&launched);
                let finished = Arc::clone(&finished);
                move || {
                    launched.fetch_add(1, Ordering::SeqCst);
                    if i == 1 {
                        controller.abort();
                    }
                    AsyncResult::delay(Duration::from_secs(1)).on_success_map(move |_| {
                        finished.fetch_add(1, Ordering::SeqCst);
                        i
                    })
                }
            })
            .collect();

        let options = CombineOptions::new()
            .concurrency(2)
            .abort_signal(controller.signal());
        let joined = Combiner::combine_factories(factories, options).await;

        assert_eq!(joined, Err(Error::msg("aborted")));
        assert_eq!(launched.load(Ordering::SeqCst), 2);
        assert_eq!(finished.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_combine_factories_empty() {
        let factories: Vec<fn() -> AsyncResult<i32>> = Vec::new();
        let joined = Combiner::combine_factories(factories, CombineOptions::new().concurrency(3)).await;
        assert_eq!(joined, Ok(vec![]));
    }

    #[tokio::test]
    async fn test_join_factories_alias() {
        let factories: Vec<fn() -> AsyncResult<i32>> = vec![|| AsyncResult::ok(1), || AsyncResult::ok(2)];
        assert_eq!(Combiner::join_factories(factories).await, Ok(vec![1, 2]));
    }

    #[test]
    fn test_options_zero_concurrency_is_unbounded() {
        assert_eq!(CombineOptions::new().concurrency(0).concurrency_limit(), None);
        assert!(CombineOptions::default().stop_on_error);
    }
}
