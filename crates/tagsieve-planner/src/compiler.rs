//! Generic term compiler.
//!
//! `QueryCompiler` owns the walk over a `Term`; a `Dialect` decides what each
//! node kind turns into. All per-call state lives in a `CompileContext` that
//! is threaded through the walk, so one compiler can serve concurrent calls.

use std::collections::HashMap;

use tagsieve_core::term::{FieldTerm, PropertyPredicate, Term};
use tagsieve_core::{Error, Result};

/// Lookup for `{name}` saved-search references.
pub trait SavedSearches {
    fn resolve(&self, name: &str) -> Option<Term>;
}

impl<F> SavedSearches for F
where
    F: Fn(&str) -> Option<Term>,
{
    fn resolve(&self, name: &str) -> Option<Term> {
        self(name)
    }
}

impl SavedSearches for HashMap<String, Term> {
    fn resolve(&self, name: &str) -> Option<Term> {
        self.get(name).cloned()
    }
}

/// Resolves nothing; every reference compiles to an empty disjunction.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSavedSearches;

impl SavedSearches for NoSavedSearches {
    fn resolve(&self, _name: &str) -> Option<Term> {
        None
    }
}

/// State of one top-level compile call.
#[derive(Debug, Default)]
pub struct CompileContext {
    expanding: Vec<String>,
    /// Set by the search dialect when the query explicitly names the hidden
    /// tag or one of its descendants.
    pub mentions_hidden: bool,
}

impl CompileContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Saved searches currently being expanded, outermost first.
    pub fn expanding(&self) -> &[String] {
        &self.expanding
    }
}

/// Per-node-kind compilation hooks.
pub trait Dialect {
    type Output;

    fn compile_conjunction(&self, parts: Vec<Self::Output>, ctx: &mut CompileContext) -> Result<Self::Output>;

    fn compile_disjunction(&self, parts: Vec<Self::Output>, ctx: &mut CompileContext) -> Result<Self::Output>;

    fn compile_negation(&self, inner: Self::Output, ctx: &mut CompileContext) -> Result<Self::Output>;

    fn compile_field(&self, field: &FieldTerm, ctx: &mut CompileContext) -> Result<Self::Output>;

    fn compile_property_conjunction(
        &self,
        predicates: &[PropertyPredicate],
        ctx: &mut CompileContext,
    ) -> Result<Self::Output>;
}

pub struct QueryCompiler<'a, D> {
    dialect: D,
    saved: &'a dyn SavedSearches,
}

impl<'a, D: Dialect> QueryCompiler<'a, D> {
    pub fn new(dialect: D) -> Self {
        Self {
            dialect,
            saved: &NoSavedSearches,
        }
    }

    pub fn with_saved_searches(mut self, saved: &'a dyn SavedSearches) -> Self {
        self.saved = saved;
        self
    }

    pub fn dialect(&self) -> &D {
        &self.dialect
    }

    pub fn compile(&self, term: &Term) -> Result<D::Output> {
        let mut ctx = CompileContext::new();
        self.compile_with(term, &mut ctx)
    }

    pub fn compile_with(&self, term: &Term, ctx: &mut CompileContext) -> Result<D::Output> {
        match term {
            Term::Conjunction(terms) => {
                let parts = self.compile_all(terms, ctx)?;
                self.dialect.compile_conjunction(parts, ctx)
            }
            Term::Disjunction(terms) => {
                let parts = self.compile_all(terms, ctx)?;
                self.dialect.compile_disjunction(parts, ctx)
            }
            Term::Negation(inner) => {
                let inner = self.compile_with(inner, ctx)?;
                self.dialect.compile_negation(inner, ctx)
            }
            Term::Field(field) => self.dialect.compile_field(field, ctx),
            Term::PropertyConjunction(predicates) => self.dialect.compile_property_conjunction(predicates, ctx),
            Term::SavedSearch(name) => self.compile_saved(name, ctx),
        }
    }

    fn compile_all(&self, terms: &[Term], ctx: &mut CompileContext) -> Result<Vec<D::Output>> {
        terms.iter().map(|t| self.compile_with(t, ctx)).collect()
    }

    fn compile_saved(&self, name: &str, ctx: &mut CompileContext) -> Result<D::Output> {
        if ctx.expanding.iter().any(|n| n == name) {
            let mut chain = ctx.expanding.clone();
            chain.push(name.to_string());
            return Err(Error::SavedSearchCycle {
                chain: chain.join(" -> "),
            });
        }

        let Some(term) = self.saved.resolve(name) else {
            tracing::debug!(name, "unknown saved search; matching nothing");
            return self.dialect.compile_disjunction(Vec::new(), ctx);
        };

        tracing::trace!(name, depth = ctx.expanding.len(), "expanding saved search");
        ctx.expanding.push(name.to_string());
        let out = self.compile_with(&term, ctx);
        ctx.expanding.pop();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagsieve_core::term::FieldOperator;

    /// Renders terms in a tiny prefix notation.
    struct Lisp;

    impl Dialect for Lisp {
        type Output = String;

        fn compile_conjunction(&self, parts: Vec<String>, _: &mut CompileContext) -> Result<String> {
            Ok(format!("(and {})", parts.join(" ")))
        }

        fn compile_disjunction(&self, parts: Vec<String>, _: &mut CompileContext) -> Result<String> {
            Ok(format!("(or {})", parts.join(" ")))
        }

        fn compile_negation(&self, inner: String, _: &mut CompileContext) -> Result<String> {
            Ok(format!("(not {inner})"))
        }

        fn compile_field(&self, field: &FieldTerm, _: &mut CompileContext) -> Result<String> {
            Ok(format!(
                "{}{}{}",
                field.field.as_deref().unwrap_or(""),
                field.operator,
                field.value
            ))
        }

        fn compile_property_conjunction(&self, preds: &[PropertyPredicate], _: &mut CompileContext) -> Result<String> {
            Ok(format!("[{}]", preds.len()))
        }
    }

    fn saved() -> HashMap<String, Term> {
        HashMap::from([
            ("cats".to_string(), Term::tag("cat")),
            (
                "pets".to_string(),
                Term::Disjunction(vec![Term::SavedSearch("cats".into()), Term::tag("dog")]),
            ),
            ("loop-a".to_string(), Term::SavedSearch("loop-b".into())),
            ("loop-b".to_string(), Term::not(Term::SavedSearch("loop-a".into()))),
        ])
    }

    #[test]
    fn dispatches_every_node_kind() {
        let c = QueryCompiler::new(Lisp);
        let q = Term::Conjunction(vec![
            Term::text("x"),
            Term::not(Term::field("rating", FieldOperator::Greater, "3")),
            Term::PropertyConjunction(vec![PropertyPredicate::has("name")]),
        ]);
        assert_eq!(c.compile(&q).unwrap(), "(and :x (not rating>3) [1])");
    }

    #[test]
    fn saved_searches_expand_transitively() {
        let s = saved();
        let c = QueryCompiler::new(Lisp).with_saved_searches(&s);
        assert_eq!(c.compile(&Term::SavedSearch("pets".into())).unwrap(), "(or tag:cat tag:dog)");
        assert_eq!(c.compile(&Term::SavedSearch("nope".into())).unwrap(), "(or )");
    }

    #[test]
    fn same_search_twice_side_by_side_is_not_a_cycle() {
        let s = saved();
        let c = QueryCompiler::new(Lisp).with_saved_searches(&s);
        let q = Term::Conjunction(vec![Term::SavedSearch("cats".into()), Term::SavedSearch("cats".into())]);
        assert_eq!(c.compile(&q).unwrap(), "(and tag:cat tag:cat)");
    }

    #[test]
    fn cycles_fail_with_the_chain() {
        let s = saved();
        let c = QueryCompiler::new(Lisp).with_saved_searches(&s);
        let err = c.compile(&Term::SavedSearch("loop-a".into())).unwrap_err();
        match err {
            Error::SavedSearchCycle { chain } => assert_eq!(chain, "loop-a -> loop-b -> loop-a"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn closures_work_as_resolvers() {
        let lookup = |name: &str| (name == "x").then(|| Term::text("found"));
        let c = QueryCompiler::new(Lisp).with_saved_searches(&lookup);
        assert_eq!(c.compile(&Term::SavedSearch("x".into())).unwrap(), ":found");
    }
}
