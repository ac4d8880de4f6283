//! Join macros

/// Join heterogeneous results into a result of a tuple
///
/// Shorthand for [`Combiner::combine`](crate::Combiner::combine) with the
/// results written out as arguments.
///
/// # Examples
///
/// ```rust
/// use resultex::{combine, AsyncResult};
///
/// #[tokio::main]
/// async fn main() {
///     let joined = combine!(AsyncResult::ok(1), AsyncResult::ok("two"), AsyncResult::ok(3.0)).await;
///     assert_eq!(joined, Ok((1, "two", 3.0)));
/// }
/// ```
#[macro_export]
macro_rules! combine {
    ($($result:expr),+ $(,)?) => {
        $crate::Combiner::combine(($($result,)+))
    };
}

/// Box a list of factory closures into a `Vec<BoxedFactory<T>>`
///
/// Every closure has its own type, so a list of different closures has to be
/// boxed before it can be handed to
/// [`Combiner::combine_factories`](crate::Combiner::combine_factories) or
/// [`AsyncResult::join_factories`](crate::AsyncResult::join_factories).
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use resultex::{factories, AsyncResult, CombineOptions, Combiner};
///
/// #[tokio::main]
/// async fn main() {
///     let joined = Combiner::combine_factories(
///         factories![
///             || AsyncResult::delay(Duration::from_millis(20)).with_overridden_value(1),
///             || AsyncResult::ok(2),
///         ],
///         CombineOptions::new().concurrency(1),
///     )
///     .await;
///
///     assert_eq!(joined, Ok(vec![1, 2]));
/// }
/// ```
#[macro_export]
macro_rules! factories {
    ($($factory:expr),* $(,)?) => {{
        let factories: ::std::vec::Vec<$crate::BoxedFactory<_>> = ::std::vec![
            $(::std::boxed::Box::new($factory) as $crate::BoxedFactory<_>),*
        ];
        factories
    }};
}
