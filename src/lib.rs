//! Chainable asynchronous results for Rust
//!
//! This crate provides [`AsyncResult`], a fluent wrapper around an
//! asynchronous computation that settles to a value or an [`Error`], and
//! [`Combiner`], which joins several of them with different error handling
//! strategies.
//!
//! ```rust
//! use resultex::{AsyncResult, Error};
//!
//! #[tokio::main]
//! async fn main() {
//!     let greeting = AsyncResult::ok("world")
//!         .ensure(|name| !name.is_empty(), "empty name")
//!         .on_success_map(|name| format!("hello {name}"))
//!         .run()
//!         .await;
//!     assert_eq!(greeting, Ok(String::from("hello world")));
//!
//!     let failed = AsyncResult::<i32>::fail("boom").on_success_map(|v| v + 1).await;
//!     assert_eq!(failed, Err(Error::msg("boom")));
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Core modules
mod abort;
mod combiner;
mod error;
mod handlers;
mod macros;
mod result;
pub mod traits;

// Re-export public API
pub use abort::{AbortController, AbortSignal};
pub use combiner::{BoxedFactory, Combine, CombineOptions, Combiner, Settled};
pub use error::{Error, Outcome, ProcessedError, RawError};
pub use handlers::{CollectHandler, ErrorHandler, FailFastHandler, LogAndIgnoreHandler};
pub use result::AsyncResult;
pub use traits::{ExtractSuccessful, IntoAsyncResult};

// Re-export the proc macro
#[cfg(feature = "macros")]
#[cfg_attr(docsrs, doc(cfg(feature = "macros")))]
pub use resultex_macros::result_fn;

pub use futures;
pub use tokio;
