#![forbid(unsafe_code)]
//! tagsieve-planner: query term → expression IR → optimized expression IR.
//!
//! Design:
//! - `compiler` walks a `Term` and hands each node kind to a pluggable
//!   `Dialect`, expanding saved searches on the way.
//! - `dialect` is the search dialect: field names → typed expression leaves,
//!   resolved against the tag rule engine.
//! - `optimizer` runs independent rewrite passes to a fixed point.
//! - `dsl` reads a YAML workspace (rules, properties, saved searches, query).

pub mod compiler;
pub mod dialect;
pub mod dsl;
pub mod optimizer;

pub use compiler::{CompileContext, Dialect, NoSavedSearches, QueryCompiler, SavedSearches};
pub use dialect::{CompiledSearch, SearchDialect};
pub use dsl::yaml::{parse_yaml_workspace, parse_yaml_workspace_with, DslError, ParsedWorkspace};
pub use optimizer::{optimize, transform_up, Optimizer, RewriteRule};
