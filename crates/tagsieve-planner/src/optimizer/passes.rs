//! The default rewrite passes.
//!
//! Every pass preserves boolean semantics for any assignment of leaf values.
//! `Sample` leaves are treated as opaque random draws: they are never merged
//! or cancelled against each other.

use tagsieve_core::expr::{Expression, TagSet};

use super::RewriteRule;

pub fn default_passes() -> Vec<Box<dyn RewriteRule>> {
    vec![
        Box::new(EliminateUnits),
        Box::new(FlattenNested),
        Box::new(EliminateDegenerate),
        Box::new(RemoveDuplicates),
        Box::new(DeMorgan),
        Box::new(CombineTagSets),
        Box::new(ReduceTagSets),
    ]
}

fn contains_sample(e: &Expression) -> bool {
    let mut found = false;
    e.walk(&mut |n| found |= matches!(n, Expression::Sample(_)));
    found
}

/// `false` in AND, `true` in OR, empty tag sets, certain samples.
pub struct EliminateUnits;

impl RewriteRule for EliminateUnits {
    fn name(&self) -> &'static str {
        "eliminate-units"
    }

    fn rewrite(&self, expr: &Expression) -> Option<Expression> {
        match expr {
            Expression::Tag(s) | Expression::RejectedTag(s) if s.is_empty() => Some(Expression::always_false()),
            Expression::Sample(p) if *p >= 1.0 => Some(Expression::always_true()),
            Expression::Sample(p) if *p <= 0.0 => Some(Expression::always_false()),
            Expression::Conjunction(xs) => {
                if xs.iter().any(Expression::is_always_false) {
                    return Some(Expression::always_false());
                }
                if xs.iter().any(Expression::is_always_true) {
                    return Some(Expression::and(
                        xs.iter().filter(|x| !x.is_always_true()).cloned().collect(),
                    ));
                }
                None
            }
            Expression::Disjunction(xs) => {
                if xs.iter().any(Expression::is_always_true) {
                    return Some(Expression::always_true());
                }
                if xs.iter().any(Expression::is_always_false) {
                    return Some(Expression::or(
                        xs.iter().filter(|x| !x.is_always_false()).cloned().collect(),
                    ));
                }
                None
            }
            _ => None,
        }
    }
}

/// `(a AND (b AND c))` → `(a AND b AND c)`, same for OR.
pub struct FlattenNested;

impl RewriteRule for FlattenNested {
    fn name(&self) -> &'static str {
        "flatten-nested"
    }

    fn rewrite(&self, expr: &Expression) -> Option<Expression> {
        match expr {
            Expression::Conjunction(xs) if xs.iter().any(|x| matches!(x, Expression::Conjunction(_))) => {
                let mut out = Vec::with_capacity(xs.len());
                for x in xs {
                    match x {
                        Expression::Conjunction(inner) => out.extend(inner.iter().cloned()),
                        other => out.push(other.clone()),
                    }
                }
                Some(Expression::and(out))
            }
            Expression::Disjunction(xs) if xs.iter().any(|x| matches!(x, Expression::Disjunction(_))) => {
                let mut out = Vec::with_capacity(xs.len());
                for x in xs {
                    match x {
                        Expression::Disjunction(inner) => out.extend(inner.iter().cloned()),
                        other => out.push(other.clone()),
                    }
                }
                Some(Expression::or(out))
            }
            _ => None,
        }
    }
}

/// Double negation, one-child groups, negated constants.
pub struct EliminateDegenerate;

impl RewriteRule for EliminateDegenerate {
    fn name(&self) -> &'static str {
        "eliminate-degenerate"
    }

    fn rewrite(&self, expr: &Expression) -> Option<Expression> {
        match expr {
            Expression::Negation(inner) => match inner.as_ref() {
                Expression::Negation(x) => Some(x.as_ref().clone()),
                x if x.is_always_true() => Some(Expression::always_false()),
                x if x.is_always_false() => Some(Expression::always_true()),
                _ => None,
            },
            Expression::Conjunction(xs) | Expression::Disjunction(xs) if xs.len() == 1 => Some(xs[0].clone()),
            _ => None,
        }
    }
}

/// Repeated children, and `x` next to `NOT x`.
pub struct RemoveDuplicates;

impl RemoveDuplicates {
    fn dedupe(xs: &[Expression]) -> Option<Vec<Expression>> {
        let mut out: Vec<Expression> = Vec::with_capacity(xs.len());
        for x in xs {
            if !contains_sample(x) && out.contains(x) {
                continue;
            }
            out.push(x.clone());
        }
        (out.len() != xs.len()).then_some(out)
    }

    fn has_complement(xs: &[Expression]) -> bool {
        xs.iter().any(|x| match x {
            Expression::Negation(inner) => !contains_sample(inner) && xs.contains(inner.as_ref()),
            _ => false,
        })
    }
}

impl RewriteRule for RemoveDuplicates {
    fn name(&self) -> &'static str {
        "remove-duplicates"
    }

    fn rewrite(&self, expr: &Expression) -> Option<Expression> {
        match expr {
            Expression::Conjunction(xs) if Self::has_complement(xs) => Some(Expression::always_false()),
            Expression::Disjunction(xs) if Self::has_complement(xs) => Some(Expression::always_true()),
            Expression::Conjunction(xs) => Self::dedupe(xs).map(Expression::and),
            Expression::Disjunction(xs) => Self::dedupe(xs).map(Expression::or),
            _ => None,
        }
    }
}

/// Push negations inward over OR; pull them out of an AND of negations.
pub struct DeMorgan;

impl RewriteRule for DeMorgan {
    fn name(&self) -> &'static str {
        "de-morgan"
    }

    fn rewrite(&self, expr: &Expression) -> Option<Expression> {
        let Expression::Negation(inner) = expr else {
            return None;
        };
        match inner.as_ref() {
            Expression::Disjunction(xs) if !xs.is_empty() => {
                Some(Expression::and(xs.iter().cloned().map(Expression::not).collect()))
            }
            Expression::Conjunction(xs)
                if !xs.is_empty() && xs.iter().all(|x| matches!(x, Expression::Negation(_))) =>
            {
                Some(Expression::or(
                    xs.iter()
                        .filter_map(|x| match x {
                            Expression::Negation(i) => Some(i.as_ref().clone()),
                            _ => None,
                        })
                        .collect(),
                ))
            }
            _ => None,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum SetKind {
    Tag,
    Rejected,
}

fn as_set(e: &Expression) -> Option<(SetKind, &TagSet)> {
    match e {
        Expression::Tag(s) => Some((SetKind::Tag, s)),
        Expression::RejectedTag(s) => Some((SetKind::Rejected, s)),
        _ => None,
    }
}

fn negated_set(e: &Expression) -> Option<(SetKind, &TagSet)> {
    match e {
        Expression::Negation(inner) => as_set(inner),
        _ => None,
    }
}

fn make_set(kind: SetKind, set: TagSet) -> Expression {
    match kind {
        SetKind::Tag => Expression::Tag(set),
        SetKind::Rejected => Expression::RejectedTag(set),
    }
}

/// Merge same-kind tag leaves: `tag{a} OR tag{b}` → `tag{a,b}` and
/// `NOT tag{a} AND NOT tag{b}` → `NOT tag{a,b}`.
pub struct CombineTagSets;

impl CombineTagSets {
    /// Merge every child `pick` recognizes into the first such child of the
    /// same kind; `wrap` rebuilds the merged leaf.
    fn merge(
        xs: &[Expression],
        pick: fn(&Expression) -> Option<(SetKind, &TagSet)>,
        wrap: fn(Expression) -> Expression,
    ) -> Option<Vec<Expression>> {
        let mut out: Vec<Expression> = Vec::with_capacity(xs.len());
        let mut merged: Vec<(SetKind, usize, TagSet)> = Vec::new();
        let mut changed = false;

        for x in xs {
            match pick(x) {
                Some((kind, set)) => match merged.iter_mut().find(|(k, _, _)| *k == kind) {
                    Some((_, _, acc)) => {
                        acc.extend(set.iter().cloned());
                        changed = true;
                    }
                    None => {
                        merged.push((kind, out.len(), set.clone()));
                        out.push(x.clone());
                    }
                },
                None => out.push(x.clone()),
            }
        }
        if !changed {
            return None;
        }
        for (kind, slot, set) in merged {
            out[slot] = wrap(make_set(kind, set));
        }
        Some(out)
    }
}

impl RewriteRule for CombineTagSets {
    fn name(&self) -> &'static str {
        "combine-tag-sets"
    }

    fn rewrite(&self, expr: &Expression) -> Option<Expression> {
        match expr {
            Expression::Disjunction(xs) => Self::merge(xs, as_set, |e| e).map(Expression::or),
            Expression::Conjunction(xs) => Self::merge(xs, negated_set, Expression::not).map(Expression::and),
            _ => None,
        }
    }
}

/// Drop tags from a set whose outcome a sibling already decides:
/// `tag{a,b} AND NOT tag{b}` → `tag{a} AND NOT tag{b}` and
/// `tag{a} OR NOT tag{a,b}` → `tag{a} OR NOT tag{b}`.
pub struct ReduceTagSets;

impl ReduceTagSets {
    fn union_of(xs: &[Expression], kind: SetKind, pick: fn(&Expression) -> Option<(SetKind, &TagSet)>) -> TagSet {
        xs.iter()
            .filter_map(pick)
            .filter(|(k, _)| *k == kind)
            .flat_map(|(_, s)| s.iter().cloned())
            .collect()
    }

    /// Shrink each `target` set by the union of same-kind `decided` sets.
    fn reduce(
        xs: &[Expression],
        target: fn(&Expression) -> Option<(SetKind, &TagSet)>,
        decided: fn(&Expression) -> Option<(SetKind, &TagSet)>,
        wrap: fn(Expression) -> Expression,
    ) -> Option<Vec<Expression>> {
        let tags = Self::union_of(xs, SetKind::Tag, decided);
        let rejected = Self::union_of(xs, SetKind::Rejected, decided);
        if tags.is_empty() && rejected.is_empty() {
            return None;
        }

        let mut changed = false;
        let out: Vec<Expression> = xs
            .iter()
            .map(|x| {
                let Some((kind, set)) = target(x) else {
                    return x.clone();
                };
                let remove = if kind == SetKind::Tag { &tags } else { &rejected };
                if set.is_disjoint(remove) {
                    return x.clone();
                }
                changed = true;
                wrap(make_set(kind, set.difference(remove).cloned().collect()))
            })
            .collect();
        changed.then_some(out)
    }
}

impl RewriteRule for ReduceTagSets {
    fn name(&self) -> &'static str {
        "reduce-tag-sets"
    }

    fn rewrite(&self, expr: &Expression) -> Option<Expression> {
        match expr {
            Expression::Conjunction(xs) => Self::reduce(xs, as_set, negated_set, |e| e).map(Expression::and),
            Expression::Disjunction(xs) => {
                Self::reduce(xs, negated_set, as_set, Expression::not).map(Expression::or)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::transform_up;

    fn t(s: &str) -> Expression {
        Expression::Text(s.into())
    }

    fn run(rule: &dyn RewriteRule, e: Expression) -> Expression {
        transform_up(&e, rule).unwrap_or(e)
    }

    #[test]
    fn units() {
        let e = Expression::and(vec![t("a"), Expression::always_true(), t("b")]);
        assert_eq!(run(&EliminateUnits, e), Expression::and(vec![t("a"), t("b")]));
        let e = Expression::and(vec![t("a"), Expression::tag(Vec::<String>::new())]);
        assert!(run(&EliminateUnits, e).is_always_false());
        let e = Expression::or(vec![t("a"), Expression::Sample(1.0)]);
        assert!(run(&EliminateUnits, e).is_always_true());
    }

    #[test]
    fn flatten() {
        let e = Expression::or(vec![t("a"), Expression::or(vec![t("b"), t("c")])]);
        assert_eq!(run(&FlattenNested, e), Expression::or(vec![t("a"), t("b"), t("c")]));
        let mixed = Expression::or(vec![t("a"), Expression::and(vec![t("b"), t("c")])]);
        assert!(transform_up(&mixed, &FlattenNested).is_none());
    }

    #[test]
    fn degenerate() {
        assert_eq!(run(&EliminateDegenerate, Expression::not(Expression::not(t("a")))), t("a"));
        assert_eq!(run(&EliminateDegenerate, Expression::and(vec![t("a")])), t("a"));
        assert!(run(&EliminateDegenerate, Expression::not(Expression::always_false())).is_always_true());
    }

    #[test]
    fn duplicates_and_complements() {
        let e = Expression::and(vec![t("a"), t("b"), t("a")]);
        assert_eq!(run(&RemoveDuplicates, e), Expression::and(vec![t("a"), t("b")]));
        let e = Expression::and(vec![t("a"), Expression::not(t("a"))]);
        assert!(run(&RemoveDuplicates, e).is_always_false());

        let samples = Expression::and(vec![Expression::Sample(0.5), Expression::Sample(0.5)]);
        assert!(transform_up(&samples, &RemoveDuplicates).is_none());
    }

    #[test]
    fn de_morgan() {
        let e = Expression::not(Expression::or(vec![t("a"), t("b")]));
        assert_eq!(
            run(&DeMorgan, e),
            Expression::and(vec![Expression::not(t("a")), Expression::not(t("b"))])
        );
        let e = Expression::not(Expression::and(vec![Expression::not(t("a")), Expression::not(t("b"))]));
        assert_eq!(run(&DeMorgan, e), Expression::or(vec![t("a"), t("b")]));
        let mixed = Expression::not(Expression::and(vec![t("a"), Expression::not(t("b"))]));
        assert!(transform_up(&mixed, &DeMorgan).is_none());
    }

    #[test]
    fn combine() {
        let e = Expression::or(vec![
            Expression::tag(["a"]),
            t("x"),
            Expression::rejected_tag(["r"]),
            Expression::tag(["b"]),
        ]);
        assert_eq!(
            run(&CombineTagSets, e),
            Expression::or(vec![Expression::tag(["a", "b"]), t("x"), Expression::rejected_tag(["r"])])
        );

        let e = Expression::and(vec![
            Expression::not(Expression::tag(["a"])),
            Expression::not(Expression::tag(["b"])),
        ]);
        assert_eq!(
            run(&CombineTagSets, e),
            Expression::and(vec![Expression::not(Expression::tag(["a", "b"]))])
        );
    }

    #[test]
    fn reduce() {
        let e = Expression::and(vec![Expression::tag(["a", "b"]), Expression::not(Expression::tag(["b"]))]);
        assert_eq!(
            run(&ReduceTagSets, e),
            Expression::and(vec![Expression::tag(["a"]), Expression::not(Expression::tag(["b"]))])
        );

        let e = Expression::or(vec![Expression::tag(["a"]), Expression::not(Expression::tag(["a", "b"]))]);
        assert_eq!(
            run(&ReduceTagSets, e),
            Expression::or(vec![Expression::tag(["a"]), Expression::not(Expression::tag(["b"]))])
        );

        let kinds = Expression::and(vec![Expression::tag(["a"]), Expression::not(Expression::rejected_tag(["a"]))]);
        assert!(transform_up(&kinds, &ReduceTagSets).is_none());
    }
}
