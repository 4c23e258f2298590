//! YAML workspace: everything one search needs, in one document.
//!
//! Example:
//! ```yaml
//! config: { hidden_tag: "hidden", similar_mode: "all" }
//! rules: |
//!   kitty => cat
//!   tabby :: cat
//!   cat -> animal
//! properties:
//!   alice: ["name=Alice Smith"]
//! known_tags: ["apricot"]
//! star_ranges: [[null, 1200], [1200, 1400], [1400, 1600], [1600, 1800], [1800, null]]
//! saved_searches:
//!   pets: { op: or, terms: [ { op: tag, value: cat }, { op: tag, value: dog } ] }
//! query:
//!   op: and
//!   terms:
//!     - { op: saved, name: pets }
//!     - { op: field, field: rating, operator: ">=", value: 1500 }
//! ```
//!
//! The query tree mirrors `Term` one-to-one; the external query parser is not
//! needed to drive the pipeline from a file.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use tagsieve_core::config::{SearchConfig, SimilarMode};
use tagsieve_core::stars::StarRanges;
use tagsieve_core::term::{FieldOperator, FieldTerm, PropertyPredicate, Term};
use tagsieve_rules::TagRuleEngine;

use crate::compiler::QueryCompiler;
use crate::dialect::{CompiledSearch, SearchDialect};
use crate::optimizer::Optimizer;

#[derive(Debug, Error)]
pub enum DslError {
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Core(#[from] tagsieve_core::Error),

    #[error("invalid workspace: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Workspace {
    #[serde(default)]
    pub config: Option<ConfigDef>,
    #[serde(default)]
    pub rules: String,
    #[serde(default)]
    pub properties: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub known_tags: Vec<String>,
    #[serde(default)]
    pub star_ranges: Option<Vec<(Option<f64>, Option<f64>)>>,
    #[serde(default)]
    pub saved_searches: BTreeMap<String, TermDef>,
    #[serde(default)]
    pub query: Option<TermDef>,
}

/// Per-field overrides on top of the base (environment) configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigDef {
    pub hidden_tag: Option<String>,
    pub similar_mode: Option<SimilarMode>,
    pub rating_category: Option<String>,
    pub max_optimizer_iterations: Option<usize>,
}

impl ConfigDef {
    pub fn apply(self, mut base: SearchConfig) -> SearchConfig {
        if let Some(v) = self.hidden_tag {
            base.hidden_tag = v;
        }
        if let Some(v) = self.similar_mode {
            base.similar_mode = v;
        }
        if let Some(v) = self.rating_category {
            base.rating_category = v;
        }
        if let Some(v) = self.max_optimizer_iterations {
            base.max_optimizer_iterations = v;
        }
        base
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TermDef {
    And {
        terms: Vec<TermDef>,
    },
    Or {
        terms: Vec<TermDef>,
    },
    Not {
        term: Box<TermDef>,
    },
    Field {
        #[serde(default)]
        field: Option<String>,
        #[serde(default = "default_operator")]
        operator: String,
        #[serde(deserialize_with = "scalar")]
        value: String,
    },
    Text {
        #[serde(deserialize_with = "scalar")]
        value: String,
    },
    Tag {
        #[serde(deserialize_with = "scalar")]
        value: String,
    },
    Person {
        #[serde(deserialize_with = "scalar")]
        value: String,
    },
    Properties {
        predicates: Vec<PredicateDef>,
    },
    Saved {
        name: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredicateDef {
    pub field: String,
    #[serde(default)]
    pub operator: Option<String>,
    #[serde(default)]
    pub value: Option<serde_yaml::Value>,
}

fn default_operator() -> String {
    ":".to_string()
}

/// Strings, numbers and booleans all read as their text.
fn scalar<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    let v = serde_yaml::Value::deserialize(d)?;
    scalar_text(&v).ok_or_else(|| serde::de::Error::custom("expected a string, number or boolean"))
}

fn scalar_text(v: &serde_yaml::Value) -> Option<String> {
    match v {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn operator(symbol: &str) -> Result<FieldOperator, DslError> {
    FieldOperator::from_symbol(symbol.trim()).ok_or_else(|| DslError::Invalid(format!("unknown operator `{symbol}`")))
}

impl TermDef {
    pub fn to_term(&self) -> Result<Term, DslError> {
        Ok(match self {
            TermDef::And { terms } => Term::Conjunction(terms.iter().map(TermDef::to_term).collect::<Result<_, _>>()?),
            TermDef::Or { terms } => Term::Disjunction(terms.iter().map(TermDef::to_term).collect::<Result<_, _>>()?),
            TermDef::Not { term } => Term::not(term.to_term()?),
            TermDef::Field { field, operator: op, value } => Term::Field(FieldTerm {
                field: field.clone(),
                operator: operator(op)?,
                value: value.clone(),
            }),
            TermDef::Text { value } => Term::text(value.clone()),
            TermDef::Tag { value } => Term::tag(value.clone()),
            TermDef::Person { value } => Term::field("@", FieldOperator::Equal, value.clone()),
            TermDef::Properties { predicates } => Term::PropertyConjunction(
                predicates
                    .iter()
                    .map(PredicateDef::to_predicate)
                    .collect::<Result<_, _>>()?,
            ),
            TermDef::Saved { name } => Term::SavedSearch(name.clone()),
        })
    }
}

impl PredicateDef {
    fn to_predicate(&self) -> Result<PropertyPredicate, DslError> {
        let value = match &self.value {
            None => None,
            Some(v) => Some(
                scalar_text(v)
                    .ok_or_else(|| DslError::Invalid(format!("property `{}` needs a scalar value", self.field)))?,
            ),
        };
        let op = match (&self.operator, &value) {
            (Some(op), _) => Some(operator(op)?),
            (None, Some(_)) => Some(FieldOperator::Equal),
            (None, None) => None,
        };
        Ok(PropertyPredicate {
            field: self.field.clone(),
            operator: op,
            value,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ParsedWorkspace {
    pub engine: TagRuleEngine,
    pub config: SearchConfig,
    pub star_ranges: Option<StarRanges>,
    pub saved_searches: HashMap<String, Term>,
    pub known_tags: Vec<String>,
    pub query: Option<Term>,
}

impl ParsedWorkspace {
    pub fn dialect(&self) -> SearchDialect<'_> {
        let dialect = SearchDialect::new(&self.engine)
            .with_config(self.config.clone())
            .with_known_tags(&self.known_tags);
        match &self.star_ranges {
            Some(stars) => dialect.with_star_ranges(stars),
            None => dialect,
        }
    }

    pub fn optimizer(&self) -> Optimizer {
        Optimizer::from_config(&self.config)
    }

    /// Compile `term` against this workspace's rules and saved searches,
    /// without optimizing.
    pub fn compile(&self, term: &Term) -> Result<CompiledSearch, DslError> {
        let compiler = QueryCompiler::new(self.dialect()).with_saved_searches(&self.saved_searches);
        Ok(compiler.compile_search(term)?)
    }

    /// Compile and optimize.
    pub fn search(&self, term: &Term) -> Result<CompiledSearch, DslError> {
        let optimizer = self.optimizer();
        Ok(self.compile(term)?.map_expression(|e| optimizer.optimize(e)))
    }
}

/// Parse a workspace, layering its `config:` block over `SearchConfig::from_env()`.
pub fn parse_yaml_workspace(yaml_src: &str) -> Result<ParsedWorkspace, DslError> {
    parse_yaml_workspace_with(yaml_src, SearchConfig::from_env())
}

pub fn parse_yaml_workspace_with(yaml_src: &str, base: SearchConfig) -> Result<ParsedWorkspace, DslError> {
    let doc: Workspace = serde_yaml::from_str(yaml_src)?;

    let config = doc.config.unwrap_or_default().apply(base);
    config.validate()?;

    let mut builder = TagRuleEngine::builder().rules_text(&doc.rules)?;
    for (tag, props) in doc.properties {
        for p in props {
            builder = builder.property(tag.clone(), p);
        }
    }
    let engine = builder.build()?;

    let star_ranges = match doc.star_ranges {
        Some(ranges) if ranges.is_empty() => {
            return Err(DslError::Invalid("star_ranges must list at least one bucket".into()))
        }
        Some(ranges) => Some(StarRanges::new(ranges)),
        None => None,
    };

    let mut saved_searches = HashMap::with_capacity(doc.saved_searches.len());
    for (name, def) in &doc.saved_searches {
        saved_searches.insert(name.clone(), def.to_term()?);
    }

    let query = doc.query.as_ref().map(TermDef::to_term).transpose()?;

    tracing::debug!(
        saved = saved_searches.len(),
        known = doc.known_tags.len(),
        has_query = query.is_some(),
        "parsed workspace"
    );

    Ok(ParsedWorkspace {
        engine,
        config,
        star_ranges,
        saved_searches,
        known_tags: doc.known_tags,
        query,
    })
}
