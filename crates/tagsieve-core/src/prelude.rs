//! Convenient re-exports for downstream crates.

pub use crate::config::{SearchConfig, SimilarMode};
pub use crate::error::{Error, Result};
pub use crate::expr::{CompareOp, Comparison, DetailValue, Expression, TagSet};
pub use crate::rule::{TagOperator, TagRule};
pub use crate::stars::StarRanges;
pub use crate::term::{FieldOperator, FieldTerm, PropertyPredicate, Term};
