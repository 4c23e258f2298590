//! Syntax-level query tree.
//!
//! Terms are what the external parser hands us. They carry no tag knowledge;
//! the dialect resolves them into `Expression`s. `Display` renders a term back
//! into the surface syntax with the minimum parentheses needed to re-parse it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Comparison written between a field and its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldOperator {
    /// `:`
    Equal,
    /// `>`
    Greater,
    /// `>=`
    GreaterOrEqual,
    /// `<`
    Less,
    /// `<=`
    LessOrEqual,
    /// `<>`
    NotEqual,
    /// `~`, the ranged/approximate comparison (substring match for properties)
    Like,
}

impl FieldOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            FieldOperator::Equal => ":",
            FieldOperator::Greater => ">",
            FieldOperator::GreaterOrEqual => ">=",
            FieldOperator::Less => "<",
            FieldOperator::LessOrEqual => "<=",
            FieldOperator::NotEqual => "<>",
            FieldOperator::Like => "~",
        }
    }

    /// Inverse of [`FieldOperator::symbol`]; `=` is accepted as `:`.
    pub fn from_symbol(s: &str) -> Option<Self> {
        Some(match s {
            ":" | "=" => FieldOperator::Equal,
            ">" => FieldOperator::Greater,
            ">=" => FieldOperator::GreaterOrEqual,
            "<" => FieldOperator::Less,
            "<=" => FieldOperator::LessOrEqual,
            "<>" => FieldOperator::NotEqual,
            "~" => FieldOperator::Like,
            _ => return None,
        })
    }
}

impl fmt::Display for FieldOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// `field op value`; a missing field means free text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldTerm {
    pub field: Option<String>,
    pub operator: FieldOperator,
    pub value: String,
}

/// One predicate inside a `[...]` property conjunction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyPredicate {
    pub field: String,
    pub operator: Option<FieldOperator>,
    pub value: Option<String>,
}

impl PropertyPredicate {
    pub fn has(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            operator: None,
            value: None,
        }
    }

    pub fn with(field: impl Into<String>, operator: FieldOperator, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            operator: Some(operator),
            value: Some(value.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Term {
    Conjunction(Vec<Term>),
    Disjunction(Vec<Term>),
    Negation(Box<Term>),
    Field(FieldTerm),
    PropertyConjunction(Vec<PropertyPredicate>),
    SavedSearch(String),
}

impl Term {
    pub fn field(field: impl Into<String>, operator: FieldOperator, value: impl Into<String>) -> Self {
        Term::Field(FieldTerm {
            field: Some(field.into()),
            operator,
            value: value.into(),
        })
    }

    pub fn text(value: impl Into<String>) -> Self {
        Term::Field(FieldTerm {
            field: None,
            operator: FieldOperator::Equal,
            value: value.into(),
        })
    }

    /// `#value`
    pub fn tag(value: impl Into<String>) -> Self {
        Term::field("tag", FieldOperator::Equal, value)
    }

    pub fn not(inner: Term) -> Self {
        Term::Negation(Box::new(inner))
    }

    /// What the parser yields for a blank query string.
    pub fn empty() -> Self {
        Term::Conjunction(Vec::new())
    }

    /// True for a query with nothing in it (possibly nested empty groups).
    pub fn is_empty(&self) -> bool {
        match self {
            Term::Conjunction(terms) | Term::Disjunction(terms) => terms.iter().all(Term::is_empty),
            _ => false,
        }
    }

    /// Binding strength used when re-stringifying.
    pub fn precedence(&self) -> u8 {
        match self {
            Term::Conjunction(_) => 0,
            Term::Disjunction(_) => 1,
            Term::Negation(_) => 2,
            Term::Field(_) | Term::PropertyConjunction(_) | Term::SavedSearch(_) => 3,
        }
    }

    fn fmt_child(&self, child: &Term, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if child.precedence() < self.precedence() {
            write!(f, "({child})")
        } else {
            write!(f, "{child}")
        }
    }

    fn fmt_joined(&self, terms: &[Term], sep: &str, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, t) in terms.iter().enumerate() {
            if i > 0 {
                f.write_str(sep)?;
            }
            self.fmt_child(t, f)?;
        }
        Ok(())
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Conjunction(terms) => self.fmt_joined(terms, " ", f),
            Term::Disjunction(terms) => self.fmt_joined(terms, " OR ", f),
            Term::Negation(inner) => {
                f.write_str("-")?;
                self.fmt_child(inner, f)
            }
            Term::Field(field) => fmt_field(field, f),
            Term::PropertyConjunction(preds) => {
                f.write_str("[")?;
                for (i, p) in preds.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}", quote_field(&p.field))?;
                    if let (Some(op), Some(value)) = (p.operator, p.value.as_deref()) {
                        write!(f, "{op}{}", quote_value(value))?;
                    }
                }
                f.write_str("]")
            }
            Term::SavedSearch(name) => write!(f, "{{{}}}", name.replace('}', "}}")),
        }
    }
}

fn fmt_field(field: &FieldTerm, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match (field.field.as_deref(), field.operator) {
        (None, _) => f.write_str(&quote_value(&field.value)),
        (Some("tag"), FieldOperator::Equal) => write!(f, "#{}", quote_value(&field.value)),
        (Some("@"), FieldOperator::Equal) => write!(f, "@{}", quote_value(&field.value)),
        (Some(name), op) => write!(f, "{}{op}{}", quote_field(name), quote_value(&field.value)),
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | '*' | '\'' | '+')
}

fn needs_quotes(s: &str) -> bool {
    match s.chars().next() {
        None => true,
        Some(first) if matches!(first, '-' | '#' | '@' | '{' | '[') => true,
        Some(_) => s == "OR" || !s.chars().all(is_word_char),
    }
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn quote_value(s: &str) -> String {
    if needs_quotes(s) {
        quote(s)
    } else {
        s.to_string()
    }
}

/// Field names additionally allow the symbolic fields `~`, `*` and `@`.
fn quote_field(s: &str) -> String {
    if matches!(s, "~" | "*" | "@") {
        return s.to_string();
    }
    quote_value(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shorthand_forms() {
        assert_eq!(Term::tag("cat").to_string(), "#cat");
        assert_eq!(Term::field("@", FieldOperator::Equal, "Jane Doe").to_string(), "@\"Jane Doe\"");
        assert_eq!(Term::field("rating", FieldOperator::GreaterOrEqual, "1500").to_string(), "rating>=1500");
        assert_eq!(Term::field("~", FieldOperator::Equal, "cat").to_string(), "~:cat");
        assert_eq!(Term::text("say \"hi\"").to_string(), "\"say \"\"hi\"\"\"");
        assert_eq!(Term::SavedSearch("a}b".into()).to_string(), "{a}}b}");
    }

    #[test]
    fn parenthesizes_only_lower_precedence_children() {
        let q = Term::Disjunction(vec![
            Term::Conjunction(vec![Term::tag("cat"), Term::tag("dog")]),
            Term::not(Term::tag("bird")),
        ]);
        assert_eq!(q.to_string(), "(#cat #dog) OR -#bird");

        let q = Term::not(Term::Disjunction(vec![Term::tag("a"), Term::tag("b")]));
        assert_eq!(q.to_string(), "-(#a OR #b)");

        let q = Term::Conjunction(vec![
            Term::Disjunction(vec![Term::tag("a"), Term::tag("b")]),
            Term::text("x"),
        ]);
        assert_eq!(q.to_string(), "#a OR #b x");
    }

    #[test]
    fn bare_or_and_prefixed_words_are_quoted() {
        assert_eq!(Term::text("OR").to_string(), "\"OR\"");
        assert_eq!(Term::text("-x").to_string(), "\"-x\"");
        assert_eq!(Term::text("").to_string(), "\"\"");
    }

    #[test]
    fn property_conjunction_renders_in_brackets() {
        let q = Term::PropertyConjunction(vec![
            PropertyPredicate::with("name", FieldOperator::Equal, "Al*"),
            PropertyPredicate::has("species"),
        ]);
        assert_eq!(q.to_string(), "[name:Al* species]");
    }

    #[test]
    fn empty_detection_sees_through_groups() {
        assert!(Term::empty().is_empty());
        assert!(Term::Disjunction(vec![Term::empty()]).is_empty());
        assert!(!Term::Conjunction(vec![Term::text("x")]).is_empty());
    }
}
