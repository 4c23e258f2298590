//! The search dialect: query terms → typed expression IR.
//!
//! Tag names are resolved through the `TagRuleEngine` (renames, hierarchy,
//! rules, properties). Star comparisons resolve through an optional
//! `StarRanges` table. On top of the raw compile, `compile_search` applies
//! the hidden-tag policy and the empty-query rule.

pub mod fields;
pub mod glob;
pub mod properties;
pub mod relation;
pub mod similar;
pub mod values;

use serde::{Deserialize, Serialize};

use tagsieve_core::config::SearchConfig;
use tagsieve_core::expr::{Expression, TagSet};
use tagsieve_core::stars::StarRanges;
use tagsieve_core::term::{FieldTerm, PropertyPredicate, Term};
use tagsieve_core::Result;
use tagsieve_rules::TagRuleEngine;

use crate::compiler::{CompileContext, Dialect, QueryCompiler};

#[derive(Debug, Clone)]
pub struct SearchDialect<'a> {
    engine: &'a TagRuleEngine,
    stars: Option<&'a StarRanges>,
    config: SearchConfig,
    extra_tags: TagSet,
}

impl<'a> SearchDialect<'a> {
    pub fn new(engine: &'a TagRuleEngine) -> Self {
        Self {
            engine,
            stars: None,
            config: SearchConfig::default(),
            extra_tags: TagSet::new(),
        }
    }

    pub fn with_star_ranges(mut self, stars: &'a StarRanges) -> Self {
        self.stars = Some(stars);
        self
    }

    pub fn with_config(mut self, config: SearchConfig) -> Self {
        self.config = config;
        self
    }

    /// Tags in use by the library but absent from every rule; globs see them.
    pub fn with_known_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extra_tags
            .extend(tags.into_iter().map(|t| self.engine.rename(t.as_ref())));
        self
    }

    pub fn engine(&self) -> &'a TagRuleEngine {
        self.engine
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    fn hidden_canonical(&self) -> TagSet {
        self.engine.self_or_descendants(&self.config.hidden_tag)
    }

    /// The hidden tag, its descendants, and every alias of those.
    pub fn hidden_tags(&self) -> TagSet {
        self.engine.with_aliases(self.hidden_canonical())
    }

    fn searchable_tags(&self) -> TagSet {
        self.engine.known_tags().union(&self.extra_tags).cloned().collect()
    }
}

impl Dialect for SearchDialect<'_> {
    type Output = Expression;

    fn compile_conjunction(&self, parts: Vec<Expression>, _ctx: &mut CompileContext) -> Result<Expression> {
        Ok(Expression::and(parts))
    }

    fn compile_disjunction(&self, parts: Vec<Expression>, _ctx: &mut CompileContext) -> Result<Expression> {
        Ok(Expression::or(parts))
    }

    fn compile_negation(&self, inner: Expression, _ctx: &mut CompileContext) -> Result<Expression> {
        Ok(Expression::not(inner))
    }

    fn compile_field(&self, field: &FieldTerm, ctx: &mut CompileContext) -> Result<Expression> {
        self.field(field, ctx)
    }

    fn compile_property_conjunction(
        &self,
        predicates: &[PropertyPredicate],
        ctx: &mut CompileContext,
    ) -> Result<Expression> {
        let tags = properties::matching_tags(self.engine, predicates)?;
        if !tags.is_disjoint(&self.hidden_canonical()) {
            ctx.mentions_hidden = true;
        }
        Ok(Expression::Tag(self.engine.with_aliases(tags)))
    }
}

/// A compiled query plus what the hidden-tag policy decided.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledSearch {
    pub expression: Expression,
    /// The query named the hidden tag itself, so nothing was excluded.
    pub mentions_hidden: bool,
    /// What a post-filter has to exclude when `mentions_hidden` is false.
    pub hidden_tags: TagSet,
}

impl CompiledSearch {
    pub fn map_expression(self, f: impl FnOnce(Expression) -> Expression) -> Self {
        Self {
            expression: f(self.expression),
            ..self
        }
    }
}

impl<'s, 'a> QueryCompiler<'s, SearchDialect<'a>> {
    /// Compile a user query: empty queries match nothing, and items with a
    /// hidden tag are excluded unless the query asks for them.
    pub fn compile_search(&self, term: &Term) -> Result<CompiledSearch> {
        let hidden_tags = self.dialect().hidden_tags();
        if term.is_empty() {
            tracing::debug!("empty query; matching nothing");
            return Ok(CompiledSearch {
                expression: Expression::always_false(),
                mentions_hidden: false,
                hidden_tags,
            });
        }

        let mut ctx = CompileContext::new();
        let compiled = self.compile_with(term, &mut ctx)?;
        let expression = if ctx.mentions_hidden {
            compiled
        } else {
            tracing::trace!(hidden = hidden_tags.len(), "excluding hidden tags");
            Expression::and(vec![compiled, Expression::not(Expression::Tag(hidden_tags.clone()))])
        };

        Ok(CompiledSearch {
            expression,
            mentions_hidden: ctx.mentions_hidden,
            hidden_tags,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagsieve_core::expr::{CompareOp, Comparison, DetailValue};
    use tagsieve_core::term::FieldOperator;
    use tagsieve_core::Error;

    fn set(xs: &[&str]) -> TagSet {
        xs.iter().map(|s| s.to_string()).collect()
    }

    fn engine() -> TagRuleEngine {
        TagRuleEngine::builder()
            .rules_text(
                "kitty => cat\n\
                 tabby :: cat\n\
                 cat :: animal\n\
                 secret :: hidden\n\
                 cat -> pet",
            )
            .unwrap()
            .property("tabby", "pattern=striped")
            .build()
            .unwrap()
    }

    fn compile(e: &TagRuleEngine, term: &Term) -> Result<Expression> {
        QueryCompiler::new(SearchDialect::new(e)).compile(term)
    }

    fn field(name: &str, op: FieldOperator, value: &str) -> Term {
        Term::field(name, op, value)
    }

    #[test]
    fn free_text_and_people() {
        let e = engine();
        assert_eq!(compile(&e, &Term::text("beach")).unwrap(), Expression::Text("beach".into()));
        assert_eq!(compile(&e, &field("@", FieldOperator::Equal, "0")).unwrap(), Expression::NoPeople);
        assert_eq!(compile(&e, &field("@", FieldOperator::Equal, "42")).unwrap(), Expression::PersonId(42));
        assert_eq!(
            compile(&e, &field("@", FieldOperator::Equal, "Jane")).unwrap(),
            Expression::PersonName("Jane".into())
        );
    }

    #[test]
    fn type_prefixes() {
        let e = engine();
        assert_eq!(
            compile(&e, &field("type", FieldOperator::Equal, "image")).unwrap(),
            Expression::or(vec![
                Expression::TypeEquals("image".into()),
                Expression::TypePrefix("image/".into())
            ])
        );
        assert_eq!(
            compile(&e, &field("type", FieldOperator::Equal, "image/")).unwrap(),
            Expression::TypePrefix("image/".into())
        );
        assert_eq!(
            compile(&e, &field("TYPE", FieldOperator::Equal, "image/png")).unwrap(),
            Expression::TypeEquals("image/png".into())
        );
    }

    #[test]
    fn tags_follow_hierarchy_and_aliases() {
        let e = engine();
        assert_eq!(compile(&e, &Term::tag("kitty")).unwrap(), Expression::tag(["cat", "kitty"]));
        assert_eq!(
            compile(&e, &field("tag", FieldOperator::LessOrEqual, "animal")).unwrap(),
            Expression::tag(["animal", "cat", "kitty", "tabby"])
        );
        assert_eq!(
            compile(&e, &field("rejected", FieldOperator::Greater, "tabby")).unwrap(),
            Expression::rejected_tag(["animal", "cat", "kitty"])
        );
    }

    #[test]
    fn globs_expand_over_known_tags() {
        let e = TagRuleEngine::from_text("apple -> fruit").unwrap();
        let dialect = SearchDialect::new(&e).with_known_tags(["apricot", "banana"]);
        let got = QueryCompiler::new(dialect)
            .compile(&field("tag", FieldOperator::Equal, "a*"))
            .unwrap();
        assert_eq!(got, Expression::or(vec![Expression::tag(["apple"]), Expression::tag(["apricot"])]));

        let none = QueryCompiler::new(SearchDialect::new(&e))
            .compile(&field("tag", FieldOperator::Equal, "zz*"))
            .unwrap();
        assert!(none.is_always_false());
    }

    #[test]
    fn not_equal_negates_any_field() {
        let e = engine();
        assert_eq!(
            compile(&e, &field("copies", FieldOperator::NotEqual, "2")).unwrap(),
            Expression::not(Expression::Copies(Comparison::new(CompareOp::Equal, 2)))
        );
    }

    #[test]
    fn numeric_and_temporal_fields() {
        let e = engine();
        assert_eq!(
            compile(&e, &field("size", FieldOperator::Greater, "2MB")).unwrap(),
            Expression::FileSize(Comparison::new(CompareOp::Greater, 2 * 1024 * 1024))
        );
        assert_eq!(
            compile(&e, &field("length", FieldOperator::LessOrEqual, "1:30")).unwrap(),
            Expression::Details {
                field: fields::DURATION.into(),
                op: CompareOp::LessOrEqual,
                value: DetailValue::Real(90.0)
            }
        );
        assert_eq!(
            compile(&e, &field("percent", FieldOperator::Equal, "10")).unwrap(),
            Expression::Sample(0.1)
        );
        assert!(compile(&e, &field("stars", FieldOperator::GreaterOrEqual, "4"))
            .unwrap()
            .is_always_true());
    }

    #[test]
    fn stars_outside_the_scale_are_rejected() {
        let e = engine();
        for value in ["0", "6"] {
            assert!(matches!(
                compile(&e, &field("stars", FieldOperator::Equal, value)),
                Err(Error::InvalidValue { .. })
            ));
        }
        assert!(matches!(
            compile(&e, &field("stars", FieldOperator::Less, "0")),
            Err(Error::InvalidValue { .. })
        ));
    }

    #[test]
    fn stars_resolve_through_ranges() {
        let e = engine();
        let ranges = StarRanges::new(vec![
            (None, Some(1200.0)),
            (Some(1200.0), Some(1400.0)),
            (Some(1400.0), Some(1600.0)),
            (Some(1600.0), Some(1800.0)),
            (Some(1800.0), None),
        ]);
        let c = QueryCompiler::new(SearchDialect::new(&e).with_star_ranges(&ranges));
        assert_eq!(
            c.compile(&field("stars", FieldOperator::GreaterOrEqual, "4")).unwrap(),
            Expression::Rating(Comparison::new(CompareOp::GreaterOrEqual, 1600.0))
        );
    }

    #[test]
    fn similar_hashes_expand_to_variants() {
        let e = engine();
        let got = compile(&e, &field("similar", FieldOperator::Equal, "1")).unwrap();
        let Expression::Disjunction(parts) = got else {
            panic!("expected a disjunction");
        };
        assert_eq!(parts.len(), 4);

        let identity = SearchDialect::new(&e).with_config(SearchConfig {
            similar_mode: tagsieve_core::config::SimilarMode::Identity,
            ..SearchConfig::default()
        });
        let got = QueryCompiler::new(identity)
            .compile(&field("similar", FieldOperator::Equal, "ff"))
            .unwrap();
        assert_eq!(got.size(), 2);
    }

    #[test]
    fn malformed_fields_are_errors() {
        let e = engine();
        let unknown = compile(&e, &field("colour", FieldOperator::Equal, "red")).unwrap_err();
        assert!(matches!(unknown, Error::UnknownField { field } if field == "colour"));

        let op = compile(&e, &field("hash", FieldOperator::Greater, "ab")).unwrap_err();
        assert!(matches!(op, Error::UnsupportedOperator { .. }));

        let value = compile(&e, &field("rating", FieldOperator::Greater, "high")).unwrap_err();
        match value {
            Error::InvalidValue { field, operator, value, .. } => {
                assert_eq!((field.as_str(), operator.as_str(), value.as_str()), ("rating", ">", "high"));
            }
            other => panic!("unexpected {other:?}"),
        }

        assert!(compile(&e, &field("tag", FieldOperator::Like, "cat")).is_err());
    }

    #[test]
    fn absent_means_neither_held_nor_rejected() {
        let e = engine();
        assert_eq!(
            compile(&e, &field("~", FieldOperator::Equal, "cat")).unwrap(),
            Expression::and(vec![
                Expression::not(Expression::tag(["cat", "kitty", "tabby"])),
                Expression::not(Expression::rejected_tag(["animal", "cat", "kitty"])),
            ])
        );
    }

    #[test]
    fn property_searches_close_over_descendants() {
        let e = engine();
        let q = Term::PropertyConjunction(vec![PropertyPredicate::with("pattern", FieldOperator::Equal, "str*")]);
        assert_eq!(compile(&e, &q).unwrap(), Expression::tag(["tabby"]));
    }

    #[test]
    fn hidden_items_are_excluded_unless_asked_for() {
        let e = engine();
        let c = QueryCompiler::new(SearchDialect::new(&e));

        let plain = c.compile_search(&Term::tag("cat")).unwrap();
        assert!(!plain.mentions_hidden);
        assert_eq!(plain.hidden_tags, set(&["hidden", "secret"]));
        assert_eq!(
            plain.expression,
            Expression::and(vec![
                Expression::tag(["cat", "kitty"]),
                Expression::not(Expression::tag(["hidden", "secret"])),
            ])
        );

        let asked = c.compile_search(&Term::tag("secret")).unwrap();
        assert!(asked.mentions_hidden);
        assert_eq!(asked.expression, Expression::tag(["secret"]));
    }

    #[test]
    fn empty_queries_match_nothing() {
        let e = engine();
        let c = QueryCompiler::new(SearchDialect::new(&e));
        assert!(c.compile_search(&Term::empty()).unwrap().expression.is_always_false());
        let nested = Term::Disjunction(vec![Term::empty(), Term::Conjunction(vec![])]);
        assert!(c.compile_search(&nested).unwrap().expression.is_always_false());
    }
}
