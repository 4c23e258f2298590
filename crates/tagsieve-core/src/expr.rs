//! Semantic expression IR.
//!
//! The dialect lowers `Term`s into this closed set of nodes; the optimizer
//! rewrites it and the backends compile it. Trees are values: rewrites build
//! new trees and never mutate in place.
//!
//! Identities: an empty `Conjunction` is always true, an empty `Disjunction`
//! is always false.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::term::FieldOperator;

/// Tag names; ordered so that equal sets render and hash identically.
pub type TagSet = BTreeSet<String>;

/// The five relational operators a comparison-bearing leaf can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    Equal,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Equal => "=",
            CompareOp::Greater => ">",
            CompareOp::GreaterOrEqual => ">=",
            CompareOp::Less => "<",
            CompareOp::LessOrEqual => "<=",
        }
    }

    /// `<>` and `~` have no relational counterpart.
    pub fn from_field(op: FieldOperator) -> Option<Self> {
        Some(match op {
            FieldOperator::Equal => CompareOp::Equal,
            FieldOperator::Greater => CompareOp::Greater,
            FieldOperator::GreaterOrEqual => CompareOp::GreaterOrEqual,
            FieldOperator::Less => CompareOp::Less,
            FieldOperator::LessOrEqual => CompareOp::LessOrEqual,
            FieldOperator::NotEqual | FieldOperator::Like => return None,
        })
    }

    /// Evaluate `lhs op rhs`.
    pub fn test<T: PartialOrd + ?Sized>(self, lhs: &T, rhs: &T) -> bool {
        match self {
            CompareOp::Equal => lhs == rhs,
            CompareOp::Greater => lhs > rhs,
            CompareOp::GreaterOrEqual => lhs >= rhs,
            CompareOp::Less => lhs < rhs,
            CompareOp::LessOrEqual => lhs <= rhs,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Comparison<T> {
    pub op: CompareOp,
    pub value: T,
}

impl<T: PartialOrd> Comparison<T> {
    pub fn new(op: CompareOp, value: T) -> Self {
        Self { op, value }
    }

    /// Does `actual` satisfy this comparison?
    pub fn matches(&self, actual: &T) -> bool {
        self.op.test(actual, &self.value)
    }
}

/// Typed scalar stored in the per-file details table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DetailValue {
    Integer(i64),
    Real(f64),
    Text(String),
}

impl DetailValue {
    /// Numbers compare across integer/real; text only compares with text.
    pub fn compare(&self, op: CompareOp, rhs: &DetailValue) -> bool {
        use DetailValue::*;
        match (self, rhs) {
            (Integer(a), Integer(b)) => op.test(a, b),
            (Integer(a), Real(b)) => op.test(&(*a as f64), b),
            (Real(a), Integer(b)) => op.test(a, &(*b as f64)),
            (Real(a), Real(b)) => op.test(a, b),
            (Text(a), Text(b)) => op.test(a.as_str(), b.as_str()),
            _ => false,
        }
    }
}

impl fmt::Display for DetailValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetailValue::Integer(i) => write!(f, "{i}"),
            DetailValue::Real(r) => write!(f, "{r}"),
            DetailValue::Text(s) => write!(f, "{s:?}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    /// Exact MIME type, e.g. `image/png`.
    TypeEquals(String),
    /// MIME type prefix, e.g. `image/`.
    TypePrefix(String),
    /// Free text over file paths.
    Text(String),
    /// Content hash (lowercase hex).
    Hash(String),
    FileSize(Comparison<u64>),
    /// Number of paths holding the same content.
    Copies(Comparison<u64>),
    TagCount(Comparison<u64>),
    PeopleCount(Comparison<u64>),
    /// Number of comparisons behind the default-category rating.
    RatingsCount(Comparison<u64>),
    /// Default-category rating value.
    Rating(Comparison<f64>),
    /// Star bucket, resolved against `StarRanges` by whoever evaluates it.
    Stars(Comparison<u8>),
    PersonId(i64),
    PersonName(String),
    NoPeople,
    /// Holds at least one of the tags.
    Tag(TagSet),
    /// Has at least one of the tags explicitly rejected.
    RejectedTag(TagSet),
    Details {
        field: String,
        op: CompareOp,
        value: DetailValue,
    },
    /// Keep roughly this portion (0..=1) of the matches.
    Sample(f64),
    Conjunction(Vec<Expression>),
    Disjunction(Vec<Expression>),
    Negation(Box<Expression>),
}

impl Expression {
    pub fn always_true() -> Self {
        Expression::Conjunction(Vec::new())
    }

    pub fn always_false() -> Self {
        Expression::Disjunction(Vec::new())
    }

    pub fn is_always_true(&self) -> bool {
        matches!(self, Expression::Conjunction(xs) if xs.is_empty())
    }

    pub fn is_always_false(&self) -> bool {
        matches!(self, Expression::Disjunction(xs) if xs.is_empty())
    }

    pub fn tag<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Expression::Tag(tags.into_iter().map(Into::into).collect())
    }

    pub fn rejected_tag<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Expression::RejectedTag(tags.into_iter().map(Into::into).collect())
    }

    pub fn and(parts: Vec<Expression>) -> Self {
        Expression::Conjunction(parts)
    }

    pub fn or(parts: Vec<Expression>) -> Self {
        Expression::Disjunction(parts)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(inner: Expression) -> Self {
        Expression::Negation(Box::new(inner))
    }

    pub fn is_leaf(&self) -> bool {
        !matches!(
            self,
            Expression::Conjunction(_) | Expression::Disjunction(_) | Expression::Negation(_)
        )
    }

    /// Number of nodes in the tree.
    pub fn size(&self) -> usize {
        match self {
            Expression::Conjunction(xs) | Expression::Disjunction(xs) => {
                1 + xs.iter().map(Expression::size).sum::<usize>()
            }
            Expression::Negation(inner) => 1 + inner.size(),
            _ => 1,
        }
    }

    /// Visit every node, parents before children.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Expression)) {
        visit(self);
        match self {
            Expression::Conjunction(xs) | Expression::Disjunction(xs) => {
                for x in xs {
                    x.walk(visit);
                }
            }
            Expression::Negation(inner) => inner.walk(visit),
            _ => {}
        }
    }
}

fn fmt_set(f: &mut fmt::Formatter<'_>, name: &str, set: &TagSet) -> fmt::Result {
    write!(f, "{name}{{")?;
    for (i, t) in set.iter().enumerate() {
        if i > 0 {
            f.write_str(",")?;
        }
        f.write_str(t)?;
    }
    f.write_str("}")
}

fn fmt_list(f: &mut fmt::Formatter<'_>, sep: &str, xs: &[Expression]) -> fmt::Result {
    f.write_str("(")?;
    for (i, x) in xs.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{x}")?;
    }
    f.write_str(")")
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Expression::*;
        match self {
            TypeEquals(t) => write!(f, "type={t}"),
            TypePrefix(t) => write!(f, "type^={t}"),
            Text(t) => write!(f, "text({t:?})"),
            Hash(h) => write!(f, "hash={h}"),
            FileSize(c) => write!(f, "size{}{}", c.op, c.value),
            Copies(c) => write!(f, "copies{}{}", c.op, c.value),
            TagCount(c) => write!(f, "tags{}{}", c.op, c.value),
            PeopleCount(c) => write!(f, "people{}{}", c.op, c.value),
            RatingsCount(c) => write!(f, "ratings{}{}", c.op, c.value),
            Rating(c) => write!(f, "rating{}{}", c.op, c.value),
            Stars(c) => write!(f, "stars{}{}", c.op, c.value),
            PersonId(id) => write!(f, "person#{id}"),
            PersonName(n) => write!(f, "person({n:?})"),
            NoPeople => f.write_str("nopeople"),
            Tag(set) => fmt_set(f, "tag", set),
            RejectedTag(set) => fmt_set(f, "rejected", set),
            Details { field, op, value } => write!(f, "details.{field}{op}{value}"),
            Sample(p) => write!(f, "sample({p})"),
            Conjunction(xs) if xs.is_empty() => f.write_str("true"),
            Disjunction(xs) if xs.is_empty() => f.write_str("false"),
            Conjunction(xs) => fmt_list(f, " AND ", xs),
            Disjunction(xs) => fmt_list(f, " OR ", xs),
            Negation(inner) => write!(f, "NOT {inner}"),
        }
    }
}
