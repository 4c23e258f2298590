//! "Would this tag be missing/suggested?" as an expression.
//!
//! For a target `t` and a rule operator the result is the conjunction of:
//! - `t` (or a descendant) is not held, and `t` (or an ancestor) is not rejected
//! - some rule whose right side names `t` fires: all of its left tags are
//!   held and none of its right tags are
//! - no exclusion rule against `t` or an ancestor fires: some left tag is
//!   absent, or some excluded right tag outside those ancestors is absent

use tagsieve_core::expr::Expression;
use tagsieve_core::rule::{TagOperator, TagRule};
use tagsieve_rules::TagRuleEngine;

/// `tag <= t`: held as itself, a descendant, or an alias of either.
fn holds(engine: &TagRuleEngine, tag: &str) -> Expression {
    Expression::Tag(engine.with_aliases(engine.self_or_descendants(tag)))
}

fn rule_fires(engine: &TagRuleEngine, rule: &TagRule) -> Expression {
    let mut parts: Vec<Expression> = rule.left.iter().map(|l| holds(engine, l)).collect();
    parts.extend(rule.right.iter().map(|r| Expression::not(holds(engine, r))));
    Expression::and(parts)
}

pub fn compile_relation(engine: &TagRuleEngine, target: &str, operator: TagOperator) -> Expression {
    let tag = engine.rename(target);
    let search_tags = engine.self_or_descendants(&tag);
    let exclusion_tags = engine.self_or_ancestors(&tag);

    let fires = Expression::or(
        engine
            .rules(operator)
            .iter()
            .filter(|r| r.right.contains(&tag))
            .map(|r| rule_fires(engine, r))
            .collect(),
    );

    let not_excluded = Expression::and(
        engine
            .rules(TagOperator::Exclusion)
            .iter()
            .filter(|r| !r.right.is_disjoint(&exclusion_tags))
            .map(|r| {
                let mut escape: Vec<Expression> =
                    r.left.iter().map(|l| Expression::not(holds(engine, l))).collect();
                escape.extend(
                    r.right
                        .iter()
                        .filter(|x| !exclusion_tags.contains(*x))
                        .map(|x| Expression::not(holds(engine, x))),
                );
                Expression::or(escape)
            })
            .collect(),
    );

    tracing::trace!(tag = %tag, ?operator, "compiled tag relation");

    Expression::and(vec![
        Expression::not(Expression::Tag(engine.with_aliases(search_tags))),
        Expression::not(Expression::RejectedTag(engine.with_aliases(exclusion_tags))),
        fires,
        not_excluded,
    ])
}
