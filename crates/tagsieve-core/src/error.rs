use thiserror::Error;

/// Canonical result for core and the compile pipeline.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid tag rule `{rule}`: {reason}")]
    InvalidRule { rule: String, reason: String },

    #[error("Rule syntax error on line {line}: {reason}")]
    RuleSyntax { line: usize, reason: String },

    #[error("Unknown search field `{field}`")]
    UnknownField { field: String },

    #[error("Operator `{operator}` is not supported for field `{field}` (value `{value}`)")]
    UnsupportedOperator {
        field: String,
        operator: String,
        value: String,
    },

    #[error("Invalid value `{value}` for `{field}{operator}`: {reason}")]
    InvalidValue {
        field: String,
        operator: String,
        value: String,
        reason: String,
    },

    #[error("Saved search cycle: {chain}")]
    SavedSearchCycle { chain: String },

    #[error("Hashing error: {0}")]
    Hash(String),

    #[error("Internal invariant failed: {0}")]
    Invariant(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Hash(e.to_string())
    }
}
