#![forbid(unsafe_code)]
//! tagsieve-rules: the tag rule engine.
//!
//! Responsibilities:
//! - Parse the textual rule language (`=>`, `->`, `<->`, `~>`, `<~>`, `!>`,
//!   `<!>`, `::`).
//! - Fold renames, expand two-way rules into pairwise edges, and close the
//!   specialization relation, all once at construction.
//! - Answer hierarchy/alias/property queries and run tag inference (`analyze`).
//!
//! The engine is immutable after `build()` and safe to share across threads.

pub mod analyze;
pub mod engine;
pub mod parse;
pub mod rename;
pub mod specialization;

pub use analyze::AnalysisResult;
pub use engine::{HierarchyRelation, TagInfo, TagRuleEngine, TagRuleEngineBuilder};
pub use parse::{normalize_tag, parse_rules};
