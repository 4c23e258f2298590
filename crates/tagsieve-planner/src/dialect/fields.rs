//! Field terms → expression leaves.

use std::str::FromStr;

use tagsieve_core::expr::{CompareOp, Comparison, DetailValue, Expression};
use tagsieve_core::rule::TagOperator;
use tagsieve_core::stars::{StarRanges, MAX_STARS};
use tagsieve_core::term::{FieldOperator, FieldTerm};
use tagsieve_core::{Error, Result};
use tagsieve_rules::HierarchyRelation;

use super::{glob, relation, similar, values, SearchDialect};
use crate::compiler::CompileContext;

/// Fields that expand `*` wildcards over known tags.
const GLOB_FIELDS: &[&str] = &["tag", "rejected", "~", "suggested", "missing", "add", "*"];

const KNOWN_FIELDS: &[&str] = &[
    "@", "type", "tag", "rejected", "~", "suggested", "missing", "add", "*", "similar", "copies", "tags",
    "people", "ratings", "rating", "stars", "size", "width", "height", "duration", "length", "time", "hash",
    "percent", "sample",
];

pub const AVERAGE_INTENSITY_HASH: &str = "AverageIntensityHash";
pub const WIDTH: &str = "Width";
pub const HEIGHT: &str = "Height";
pub const DURATION: &str = "Duration";

/// The field being compiled, kept around for error messages.
struct FieldRef<'t> {
    name: &'t str,
    op: FieldOperator,
    value: &'t str,
}

impl FieldRef<'_> {
    fn unsupported(&self) -> Error {
        Error::UnsupportedOperator {
            field: self.name.to_string(),
            operator: self.op.symbol().to_string(),
            value: self.value.to_string(),
        }
    }

    fn invalid(&self, reason: impl Into<String>) -> Error {
        Error::InvalidValue {
            field: self.name.to_string(),
            operator: self.op.symbol().to_string(),
            value: self.value.to_string(),
            reason: reason.into(),
        }
    }

    fn relational(&self) -> Result<CompareOp> {
        CompareOp::from_field(self.op).ok_or_else(|| self.unsupported())
    }

    fn equality(&self) -> Result<()> {
        match self.op {
            FieldOperator::Equal => Ok(()),
            _ => Err(self.unsupported()),
        }
    }

    fn parse<T>(&self) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.value.trim().parse().map_err(|e: T::Err| self.invalid(e.to_string()))
    }

    fn comparison<T>(&self) -> Result<Comparison<T>>
    where
        T: FromStr + PartialOrd,
        T::Err: std::fmt::Display,
    {
        Ok(Comparison::new(self.relational()?, self.parse()?))
    }

    /// Same value under another field and operator.
    fn retarget(&self, field: &str, op: FieldOperator) -> FieldTerm {
        FieldTerm {
            field: Some(field.to_string()),
            operator: op,
            value: self.value.to_string(),
        }
    }

    /// Same field and operator, another value.
    fn with_value(&self, value: &str) -> FieldTerm {
        FieldTerm {
            field: Some(self.name.to_string()),
            operator: self.op,
            value: value.to_string(),
        }
    }
}

impl SearchDialect<'_> {
    pub(crate) fn field(&self, term: &FieldTerm, ctx: &mut CompileContext) -> Result<Expression> {
        let Some(raw) = term.field.as_deref() else {
            return match term.operator {
                FieldOperator::Equal => Ok(Expression::Text(term.value.clone())),
                op => Err(Error::UnsupportedOperator {
                    field: String::new(),
                    operator: op.symbol().to_string(),
                    value: term.value.clone(),
                }),
            };
        };

        let name = raw.trim().to_lowercase();
        if !KNOWN_FIELDS.contains(&name.as_str()) {
            return Err(Error::UnknownField { field: raw.to_string() });
        }
        let f = FieldRef {
            name: &name,
            op: term.operator,
            value: &term.value,
        };

        match f.op {
            FieldOperator::NotEqual if matches!(f.name, "percent" | "sample") => return Err(f.unsupported()),
            FieldOperator::NotEqual => {
                let equal = f.retarget(f.name, FieldOperator::Equal);
                return Ok(Expression::not(self.field(&equal, ctx)?));
            }
            FieldOperator::Like => return Err(f.unsupported()),
            _ => {}
        }

        if GLOB_FIELDS.contains(&f.name) && glob::is_glob(f.value) {
            return self.glob(&f, ctx);
        }

        match f.name {
            "@" => {
                f.equality()?;
                Ok(match f.value.trim().parse::<i64>() {
                    Ok(0) => Expression::NoPeople,
                    Ok(id) => Expression::PersonId(id),
                    Err(_) => Expression::PersonName(f.value.to_string()),
                })
            }
            "type" => {
                f.equality()?;
                let v = f.value.trim().to_ascii_lowercase();
                Ok(if !v.contains('/') {
                    Expression::or(vec![Expression::TypeEquals(v.clone()), Expression::TypePrefix(format!("{v}/"))])
                } else if v.ends_with('/') {
                    Expression::TypePrefix(v)
                } else {
                    Expression::TypeEquals(v)
                })
            }
            "tag" | "rejected" => {
                let relation = HierarchyRelation::from_operator(f.relational()?);
                let canonical = self.engine.rename(f.value);
                if self.hidden_canonical().contains(&canonical) {
                    tracing::debug!(tag = %canonical, "query names the hidden tag");
                    ctx.mentions_hidden = true;
                }
                let tags = self.engine.with_aliases(self.engine.related(f.value, relation));
                Ok(if f.name == "tag" {
                    Expression::Tag(tags)
                } else {
                    Expression::RejectedTag(tags)
                })
            }
            "~" => {
                f.equality()?;
                let held = f.retarget("tag", FieldOperator::LessOrEqual);
                let rejected = f.retarget("rejected", FieldOperator::GreaterOrEqual);
                Ok(Expression::and(vec![
                    Expression::not(self.field(&held, ctx)?),
                    Expression::not(self.field(&rejected, ctx)?),
                ]))
            }
            "suggested" | "missing" => {
                let relation = HierarchyRelation::from_operator(f.relational()?);
                let operator = if f.name == "suggested" {
                    TagOperator::Suggestion
                } else {
                    TagOperator::Implication
                };
                Ok(Expression::or(
                    self.engine
                        .related(f.value, relation)
                        .iter()
                        .map(|t| relation::compile_relation(self.engine, t, operator))
                        .collect(),
                ))
            }
            "add" => {
                let missing = f.retarget("missing", f.op);
                let suggested = f.retarget("suggested", f.op);
                Ok(Expression::or(vec![self.field(&missing, ctx)?, self.field(&suggested, ctx)?]))
            }
            "*" => {
                f.equality()?;
                let mut parts = Vec::with_capacity(3);
                for name in ["tag", "missing", "suggested"] {
                    parts.push(self.field(&f.retarget(name, FieldOperator::LessOrEqual), ctx)?);
                }
                Ok(Expression::or(parts))
            }
            "similar" => {
                f.equality()?;
                let hash = similar::parse_hash(f.value).map_err(|e| f.invalid(e))?;
                Ok(Expression::or(
                    similar::variants(hash, self.config.similar_mode)
                        .into_iter()
                        .map(|v| Expression::Details {
                            field: AVERAGE_INTENSITY_HASH.to_string(),
                            op: CompareOp::Equal,
                            // stored as the signed reinterpretation of the bits
                            value: DetailValue::Integer(v as i64),
                        })
                        .collect(),
                ))
            }
            "copies" => Ok(Expression::Copies(f.comparison()?)),
            "tags" => Ok(Expression::TagCount(f.comparison()?)),
            "people" => Ok(Expression::PeopleCount(f.comparison()?)),
            "ratings" => Ok(Expression::RatingsCount(f.comparison()?)),
            "rating" => {
                let cmp: Comparison<f64> = f.comparison()?;
                if !cmp.value.is_finite() {
                    return Err(f.invalid("rating must be finite"));
                }
                Ok(Expression::Rating(cmp))
            }
            "stars" => {
                let cmp: Comparison<u8> = f.comparison()?;
                if !(1..=MAX_STARS).contains(&cmp.value) {
                    return Err(f.invalid(format!("stars must be between 1 and {MAX_STARS}")));
                }
                Ok(match self.stars {
                    Some(ranges) => ranges.resolve(cmp),
                    None => StarRanges::default().resolve(cmp),
                })
            }
            "size" => {
                let op = f.relational()?;
                let bytes = values::parse_size(f.value).map_err(|e| f.invalid(e))?;
                Ok(Expression::FileSize(Comparison::new(op, bytes)))
            }
            "width" | "height" => {
                let op = f.relational()?;
                let px: i64 = f.parse()?;
                Ok(Expression::Details {
                    field: (if f.name == "width" { WIDTH } else { HEIGHT }).to_string(),
                    op,
                    value: DetailValue::Integer(px),
                })
            }
            "duration" | "length" | "time" => {
                let op = f.relational()?;
                let secs = values::parse_duration(f.value).map_err(|e| f.invalid(e))?;
                Ok(Expression::Details {
                    field: DURATION.to_string(),
                    op,
                    value: DetailValue::Real(secs),
                })
            }
            "hash" => {
                f.equality()?;
                Ok(Expression::Hash(values::parse_hash(f.value).map_err(|e| f.invalid(e))?))
            }
            "percent" | "sample" => {
                f.equality()?;
                let max = if f.name == "percent" { 100.0 } else { 1.0 };
                Ok(Expression::Sample(values::parse_portion(f.value, max).map_err(|e| f.invalid(e))?))
            }
            other => Err(Error::UnknownField { field: other.to_string() }),
        }
    }

    fn glob(&self, f: &FieldRef<'_>, ctx: &mut CompileContext) -> Result<Expression> {
        let known = self.searchable_tags();
        let matches = glob::expand(f.value, &known).map_err(|e| f.invalid(e.to_string()))?;
        tracing::debug!(field = f.name, pattern = f.value, matches = matches.len(), "expanded tag glob");

        let mut parts = Vec::with_capacity(matches.len());
        // a tag spelled with `*` would expand again
        for tag in matches.iter().filter(|t| !glob::is_glob(t)) {
            parts.push(self.field(&f.with_value(tag), ctx)?);
        }
        Ok(Expression::or(parts))
    }
}
