//! `[field op value ...]` searches over tag properties.
//!
//! Properties are free strings attached to tags, usually `name=value`. A
//! predicate matches a property whose name equals the predicate field
//! (ignoring case); the operator then constrains the value part.

use tagsieve_core::expr::{CompareOp, TagSet};
use tagsieve_core::term::{FieldOperator, PropertyPredicate};
use tagsieve_core::{Error, Result};
use tagsieve_rules::TagRuleEngine;

fn invalid(pred: &PropertyPredicate, op: FieldOperator, reason: &str) -> Error {
    Error::InvalidValue {
        field: pred.field.clone(),
        operator: op.symbol().to_string(),
        value: pred.value.clone().unwrap_or_default(),
        reason: reason.to_string(),
    }
}

/// Reject predicates that could never be evaluated, before touching any tag.
pub fn validate(pred: &PropertyPredicate) -> Result<()> {
    let (Some(op), Some(value)) = (pred.operator, pred.value.as_deref()) else {
        return Ok(());
    };
    if CompareOp::from_field(op).is_some() && op != FieldOperator::Equal && value.trim().parse::<f64>().is_err() {
        return Err(invalid(pred, op, "relational property comparisons need a number"));
    }
    Ok(())
}

pub fn matches(pred: &PropertyPredicate, property: &str) -> bool {
    let (name, value) = match property.split_once('=') {
        Some((n, v)) => (n.trim(), Some(v.trim())),
        None => (property.trim(), None),
    };
    if !name.eq_ignore_ascii_case(pred.field.trim()) {
        return false;
    }
    let (Some(op), Some(wanted)) = (pred.operator, pred.value.as_deref()) else {
        return true;
    };
    let Some(actual) = value else {
        return false;
    };

    let actual_lc = actual.to_lowercase();
    let wanted_lc = wanted.to_lowercase();
    match op {
        FieldOperator::Equal => match wanted_lc.strip_suffix('*') {
            Some(prefix) => actual_lc.starts_with(prefix),
            None => actual_lc == wanted_lc,
        },
        FieldOperator::Like => actual_lc.contains(&wanted_lc),
        FieldOperator::NotEqual => actual_lc != wanted_lc,
        other => {
            let (Some(cmp), Ok(lhs), Ok(rhs)) = (
                CompareOp::from_field(other),
                actual.parse::<f64>(),
                wanted.trim().parse::<f64>(),
            ) else {
                return false;
            };
            cmp.test(&lhs, &rhs)
        }
    }
}

/// Canonical tags whose properties satisfy every predicate, closed over
/// descendants.
pub fn matching_tags(engine: &TagRuleEngine, predicates: &[PropertyPredicate]) -> Result<TagSet> {
    for pred in predicates {
        validate(pred)?;
    }
    let mut out = TagSet::new();
    if predicates.is_empty() {
        return Ok(out);
    }
    for (tag, properties) in engine.tags_with_properties() {
        let all = predicates
            .iter()
            .all(|pred| properties.iter().any(|p| matches(pred, p)));
        if all {
            out.extend(engine.self_or_descendants(tag));
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(xs: &[&str]) -> TagSet {
        xs.iter().map(|s| s.to_string()).collect()
    }

    fn people() -> TagRuleEngine {
        TagRuleEngine::builder()
            .rules_text("alice-kid :: alice")
            .unwrap()
            .property("alice", "name=Alice Smith")
            .property("alice", "born=1990")
            .property("bob", "name=Bob Jones")
            .property("bob", "born=1985")
            .property("rex", "species")
            .build()
            .unwrap()
    }

    #[test]
    fn exact_prefix_and_substring() {
        let e = people();
        let exact = [PropertyPredicate::with("name", FieldOperator::Equal, "bob jones")];
        assert_eq!(matching_tags(&e, &exact).unwrap(), set(&["bob"]));

        let prefix = [PropertyPredicate::with("Name", FieldOperator::Equal, "Ali*")];
        assert_eq!(matching_tags(&e, &prefix).unwrap(), set(&["alice", "alice-kid"]));

        let sub = [PropertyPredicate::with("name", FieldOperator::Like, "jon")];
        assert_eq!(matching_tags(&e, &sub).unwrap(), set(&["bob"]));
    }

    #[test]
    fn all_predicates_must_hold() {
        let e = people();
        let q = [
            PropertyPredicate::with("name", FieldOperator::Like, "o"),
            PropertyPredicate::with("born", FieldOperator::Less, "1988"),
        ];
        assert_eq!(matching_tags(&e, &q).unwrap(), set(&["bob"]));
    }

    #[test]
    fn bare_properties_and_presence() {
        let e = people();
        assert_eq!(
            matching_tags(&e, &[PropertyPredicate::has("species")]).unwrap(),
            set(&["rex"])
        );
        let valued = [PropertyPredicate::with("species", FieldOperator::Equal, "dog")];
        assert!(matching_tags(&e, &valued).unwrap().is_empty());
    }

    #[test]
    fn relational_predicates_need_numbers() {
        let e = people();
        let q = [PropertyPredicate::with("born", FieldOperator::Greater, "soon")];
        assert!(matches!(matching_tags(&e, &q), Err(Error::InvalidValue { .. })));
    }
}
