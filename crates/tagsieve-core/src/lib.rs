#![forbid(unsafe_code)]
//! tagsieve-core: the shared vocabulary of the search pipeline.
//!
//! - `term`: syntax-level query tree (what the external parser produces)
//! - `expr`: typed semantic IR the dialect lowers terms into
//! - `rule`: tag rules and their textual operators
//! - `stars`: star bucket boundaries over the rating scale
//! - `config`, `error`, `hash`: ambient plumbing shared by every crate
//!
//! No tag knowledge and no backends live here.

pub mod config;
pub mod error;
pub mod expr;
pub mod hash;
pub mod prelude;
pub mod rule;
pub mod stars;
pub mod term;

pub use error::{Error, Result};
