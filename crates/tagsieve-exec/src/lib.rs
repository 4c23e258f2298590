#![forbid(unsafe_code)]
//! tagsieve-exec: turn an (optimized) expression into something runnable.
//!
//! - `sql`: a multi-statement script that fills a temporary table with the
//!   matching hashes and then returns the dependent rows in a fixed order.
//! - `predicate`: a boolean closure over fully materialized `SearchItem`s,
//!   with its own hidden-tag post-filter.
//!
//! Both backends keep per-compile state on the call stack, so one backend
//! value can compile any number of expressions concurrently.

pub mod error;
pub mod metrics;
pub mod predicate;
pub mod sql;

pub use error::BackendError;
pub use predicate::{Person, Predicate, PredicateBackend, Rating, SearchItem};
pub use sql::{ResultSet, SqlBackend, SqlScript};
