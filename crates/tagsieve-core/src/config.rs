//! Search configuration that downstream crates can serialize/deserialize.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Which variants of an average-intensity hash `similar:` searches for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimilarMode {
    /// Only the hash as given.
    Identity,
    /// All eight flips/rotations of the 8x8 grid.
    #[default]
    All,
}

impl std::str::FromStr for SimilarMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "identity" | "0" => Ok(SimilarMode::Identity),
            "all" | "1" => Ok(SimilarMode::All),
            other => Err(Error::Config(format!("unknown similar mode `{other}`"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Items carrying this tag (or a descendant) are excluded unless the
    /// query asks for it.
    pub hidden_tag: String,

    pub similar_mode: SimilarMode,

    /// Rating category the `rating`/`stars`/`ratings` fields refer to.
    pub rating_category: String,

    /// Safety cap on optimizer restarts.
    pub max_optimizer_iterations: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            hidden_tag: "hidden".to_string(),
            similar_mode: SimilarMode::All,
            rating_category: String::new(),
            max_optimizer_iterations: 10_000,
        }
    }
}

impl SearchConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `TAGSIEVE_HIDDEN_TAG`: tag excluded by default
    /// - `TAGSIEVE_SIMILAR_MODE`: `identity` or `all`
    /// - `TAGSIEVE_RATING_CATEGORY`: default rating category
    /// - `TAGSIEVE_MAX_OPTIMIZER_ITERATIONS`: optimizer restart cap
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("TAGSIEVE_HIDDEN_TAG") {
            if !s.trim().is_empty() {
                cfg.hidden_tag = s.trim().to_string();
            }
        }

        if let Ok(s) = std::env::var("TAGSIEVE_SIMILAR_MODE") {
            if let Ok(mode) = s.parse() {
                cfg.similar_mode = mode;
            }
        }

        if let Ok(s) = std::env::var("TAGSIEVE_RATING_CATEGORY") {
            cfg.rating_category = s;
        }

        if let Ok(s) = std::env::var("TAGSIEVE_MAX_OPTIMIZER_ITERATIONS") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.max_optimizer_iterations = v;
            }
        }

        cfg
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.hidden_tag.trim().is_empty() {
            return Err(Error::Config("hidden_tag must not be empty".into()));
        }
        if self.max_optimizer_iterations == 0 {
            return Err(Error::Config("max_optimizer_iterations must be > 0".into()));
        }
        Ok(())
    }
}
