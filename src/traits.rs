//! Core traits for result chaining

use crate::{AsyncResult, Error, Settled};

/// Trait to convert callback return values into an [`AsyncResult`]
///
/// Chaining operations such as [`AsyncResult::on_success`] accept any
/// callback whose return type implements this trait, so a step may hand back
/// either another `AsyncResult` or a plain `std::result::Result`.
/// Asynchronous work is lifted with [`AsyncResult::from_future`].
pub trait IntoAsyncResult {
    /// The success type of the converted result
    type Value: Send + 'static;

    /// Convert into an [`AsyncResult`]
    fn into_async_result(self) -> AsyncResult<Self::Value>;
}

impl<T> IntoAsyncResult for AsyncResult<T>
where
    T: Send + 'static,
{
    type Value = T;

    fn into_async_result(self) -> AsyncResult<T> {
        self
    }
}

impl<T, E> IntoAsyncResult for std::result::Result<T, E>
where
    T: Send + 'static,
    E: Into<Error>,
{
    type Value = T;

    fn into_async_result(self) -> AsyncResult<T> {
        match self {
            Ok(value) => AsyncResult::ok(value),
            Err(error) => AsyncResult::fail(error),
        }
    }
}

/// Trait for extracting successful values from settled records
pub trait ExtractSuccessful<T> {
    /// Keep the fulfilled values, in order, dropping every rejection
    fn extract_successful(self) -> Vec<T>;

    /// Keep the rejections, in order, dropping every fulfilled value
    fn extract_failures(self) -> Vec<Error>;
}

impl<T> ExtractSuccessful<T> for Vec<Settled<T>> {
    fn extract_successful(self) -> Vec<T> {
        self.into_iter()
            .filter_map(|settled| match settled {
                Settled::Fulfilled(value) => Some(value),
                Settled::Rejected(_) => None,
            })
            .collect()
    }

    fn extract_failures(self) -> Vec<Error> {
        self.into_iter()
            .filter_map(|settled| match settled {
                Settled::Fulfilled(_) => None,
                Settled::Rejected(error) => Some(error),
            })
            .collect()
    }
}
