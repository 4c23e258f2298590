//! Tag rules: directed relationships between sets of tags.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::expr::TagSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TagOperator {
    /// `=>` rename the left tag to the right tag
    Definition,
    /// `->`
    Implication,
    /// `<->`
    BidirectionalImplication,
    /// `~>`
    Suggestion,
    /// `<~>`
    BidirectionalSuggestion,
    /// `!>`
    Exclusion,
    /// `<!>`
    MutualExclusion,
    /// `::` the left tag is a kind of the right tag
    Specialization,
}

impl TagOperator {
    pub const ALL: [TagOperator; 8] = [
        TagOperator::Definition,
        TagOperator::Implication,
        TagOperator::BidirectionalImplication,
        TagOperator::Suggestion,
        TagOperator::BidirectionalSuggestion,
        TagOperator::Exclusion,
        TagOperator::MutualExclusion,
        TagOperator::Specialization,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            TagOperator::Definition => "=>",
            TagOperator::Implication => "->",
            TagOperator::BidirectionalImplication => "<->",
            TagOperator::Suggestion => "~>",
            TagOperator::BidirectionalSuggestion => "<~>",
            TagOperator::Exclusion => "!>",
            TagOperator::MutualExclusion => "<!>",
            TagOperator::Specialization => "::",
        }
    }

    pub fn from_symbol(s: &str) -> Option<Self> {
        TagOperator::ALL.into_iter().find(|op| op.symbol() == s)
    }

    /// Operators whose sides must each hold exactly one tag.
    pub fn requires_singletons(self) -> bool {
        matches!(self, TagOperator::Definition | TagOperator::Specialization)
    }

    /// The one-way operator a two-way operator expands into.
    pub fn unidirectional(self) -> Option<TagOperator> {
        match self {
            TagOperator::BidirectionalImplication => Some(TagOperator::Implication),
            TagOperator::BidirectionalSuggestion => Some(TagOperator::Suggestion),
            TagOperator::MutualExclusion => Some(TagOperator::Exclusion),
            _ => None,
        }
    }
}

impl fmt::Display for TagOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TagRule {
    pub left: TagSet,
    pub operator: TagOperator,
    pub right: TagSet,
}

impl TagRule {
    /// Build a rule, rejecting empty sides and non-singleton
    /// `Definition`/`Specialization` sides.
    pub fn new<L, R, S>(left: L, operator: TagOperator, right: R) -> Result<Self>
    where
        L: IntoIterator<Item = S>,
        R: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let rule = TagRule {
            left: left.into_iter().map(Into::into).collect(),
            operator,
            right: right.into_iter().map(Into::into).collect(),
        };
        rule.validate()?;
        Ok(rule)
    }

    pub fn validate(&self) -> Result<()> {
        if self.left.is_empty() || self.right.is_empty() {
            return Err(Error::InvalidRule {
                rule: self.to_string(),
                reason: "both sides need at least one tag".into(),
            });
        }
        if self.operator.requires_singletons() && (self.left.len() != 1 || self.right.len() != 1) {
            return Err(Error::InvalidRule {
                rule: self.to_string(),
                reason: format!("`{}` takes exactly one tag on each side", self.operator),
            });
        }
        Ok(())
    }

    /// The only tag of a singleton side.
    pub fn single(side: &TagSet) -> Option<&str> {
        match side.len() {
            1 => side.iter().next().map(String::as_str),
            _ => None,
        }
    }
}

impl fmt::Display for TagRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |s: &TagSet| s.iter().cloned().collect::<Vec<_>>().join(" ");
        write!(f, "{} {} {}", join(&self.left), self.operator, join(&self.right))
    }
}
