//! In-memory backend: expressions become boolean closures over `SearchItem`s.
//!
//! Used where the full item is already loaded (tests, small collections,
//! re-checking rows the SQL backend returned).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use tagsieve_core::config::SearchConfig;
use tagsieve_core::expr::{Comparison, DetailValue, Expression, TagSet};
use tagsieve_core::hash::hash_str;
use tagsieve_core::stars::StarRanges;
use tagsieve_planner::CompiledSearch;

use crate::error::{BackendError, Result};
use crate::metrics::emit_span;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub value: f64,
    pub count: u64,
}

/// Everything the predicate backend can look at for one file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchItem {
    pub hash: String,
    pub file_size: u64,
    pub file_type: String,
    #[serde(default)]
    pub paths: Vec<String>,
    #[serde(default)]
    pub tags: TagSet,
    #[serde(default)]
    pub rejected_tags: TagSet,
    #[serde(default)]
    pub people: Vec<Person>,
    #[serde(default)]
    pub details: BTreeMap<String, DetailValue>,
    /// Keyed by rating category.
    #[serde(default)]
    pub ratings: BTreeMap<String, Rating>,
}

impl SearchItem {
    pub fn new(hash: impl Into<String>, file_type: impl Into<String>, file_size: u64) -> Self {
        Self {
            hash: hash.into(),
            file_type: file_type.into(),
            file_size,
            ..Self::default()
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.paths.push(path.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn with_rejected_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rejected_tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn with_person(mut self, person: Person) -> Self {
        self.people.push(person);
        self
    }

    pub fn with_detail(mut self, name: impl Into<String>, value: DetailValue) -> Self {
        self.details.insert(name.into(), value);
        self
    }

    pub fn with_rating(mut self, category: impl Into<String>, value: f64, count: u64) -> Self {
        self.ratings.insert(category.into(), Rating { value, count });
        self
    }
}

pub type Predicate = Box<dyn Fn(&SearchItem) -> bool + Send + Sync>;

#[derive(Debug, Clone, Default)]
pub struct PredicateBackend {
    rating_category: String,
    stars: Option<StarRanges>,
}

impl PredicateBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &SearchConfig) -> Self {
        Self::new().with_rating_category(config.rating_category.clone())
    }

    pub fn with_rating_category(mut self, category: impl Into<String>) -> Self {
        self.rating_category = category.into();
        self
    }

    pub fn with_star_ranges(mut self, stars: StarRanges) -> Self {
        self.stars = Some(stars);
        self
    }

    pub fn compile(&self, expr: &Expression) -> Result<Predicate> {
        let mut leaves = 0usize;
        let predicate = self.build(expr, &mut leaves)?;
        emit_span("predicate_compile", &[("leaves", leaves.to_string())]);
        Ok(predicate)
    }

    /// Compile a whole search, re-applying the hidden-tag exclusion as a
    /// post-filter unless the query asked for hidden items.
    pub fn compile_search(&self, search: &CompiledSearch) -> Result<Predicate> {
        let inner = self.compile(&search.expression)?;
        if search.mentions_hidden || search.hidden_tags.is_empty() {
            return Ok(inner);
        }
        let hidden = search.hidden_tags.clone();
        Ok(Box::new(move |item| inner(item) && item.tags.is_disjoint(&hidden)))
    }

    pub fn filter<'i>(&self, predicate: &Predicate, items: &'i [SearchItem]) -> Vec<&'i SearchItem> {
        items.iter().filter(|item| predicate(item)).collect()
    }

    fn build(&self, expr: &Expression, leaves: &mut usize) -> Result<Predicate> {
        use Expression::*;
        if !matches!(expr, Conjunction(_) | Disjunction(_) | Negation(_)) {
            *leaves += 1;
        }
        Ok(match expr {
            Conjunction(xs) => {
                let parts = self.build_all(xs, leaves)?;
                Box::new(move |item| parts.iter().all(|p| p(item)))
            }
            Disjunction(xs) => {
                let parts = self.build_all(xs, leaves)?;
                Box::new(move |item| parts.iter().any(|p| p(item)))
            }
            Negation(inner) => {
                let inner = self.build(inner, leaves)?;
                Box::new(move |item| !inner(item))
            }
            TypeEquals(t) => {
                let t = t.clone();
                Box::new(move |item| item.file_type == t)
            }
            TypePrefix(p) => {
                let p = p.clone();
                Box::new(move |item| item.file_type.starts_with(&p))
            }
            Text(s) => {
                let needle = s.to_lowercase();
                Box::new(move |item| item.paths.iter().any(|p| p.to_lowercase().contains(&needle)))
            }
            Hash(h) => {
                let h = h.to_lowercase();
                Box::new(move |item| item.hash.eq_ignore_ascii_case(&h))
            }
            FileSize(c) => {
                let c = *c;
                Box::new(move |item| c.matches(&item.file_size))
            }
            Copies(c) => count(*c, |item| item.paths.len()),
            TagCount(c) => count(*c, |item| item.tags.len()),
            PeopleCount(c) => count(*c, |item| item.people.len()),
            RatingsCount(c) => {
                let (c, category) = (*c, self.rating_category.clone());
                Box::new(move |item| c.matches(&item.ratings.get(&category).map_or(0, |r| r.count)))
            }
            Expression::Rating(c) => {
                if !c.value.is_finite() {
                    return Err(BackendError::Invariant(format!("rating bound {} is not finite", c.value)));
                }
                let (c, category) = (*c, self.rating_category.clone());
                Box::new(move |item| item.ratings.get(&category).is_some_and(|r| c.matches(&r.value)))
            }
            Stars(c) => {
                let resolved = match &self.stars {
                    Some(ranges) => ranges.resolve(*c),
                    None => StarRanges::default().resolve(*c),
                };
                return self.build(&resolved, leaves);
            }
            PersonId(id) => {
                let id = *id;
                Box::new(move |item| item.people.iter().any(|p| p.id == id))
            }
            PersonName(name) => {
                let name = name.to_lowercase();
                Box::new(move |item| {
                    item.people.iter().any(|p| {
                        p.name.to_lowercase() == name || p.aliases.iter().any(|a| a.to_lowercase() == name)
                    })
                })
            }
            NoPeople => Box::new(|item| item.people.is_empty()),
            Tag(set) => {
                let set = set.clone();
                Box::new(move |item| !item.tags.is_disjoint(&set))
            }
            RejectedTag(set) => {
                let set = set.clone();
                Box::new(move |item| !item.rejected_tags.is_disjoint(&set))
            }
            Details { field, op, value } => {
                let (field, op, value) = (field.clone(), *op, value.clone());
                Box::new(move |item| item.details.get(&field).is_some_and(|v| v.compare(op, &value)))
            }
            Sample(p) => {
                if !p.is_finite() {
                    return Err(BackendError::Invariant(format!("sample portion {p} is not finite")));
                }
                let p = p.clamp(0.0, 1.0);
                Box::new(move |item| sample_point(&item.hash) < p)
            }
        })
    }

    fn build_all(&self, xs: &[Expression], leaves: &mut usize) -> Result<Vec<Predicate>> {
        xs.iter().map(|x| self.build(x, leaves)).collect()
    }
}

fn count(c: Comparison<u64>, get: fn(&SearchItem) -> usize) -> Predicate {
    Box::new(move |item| c.matches(&(get(item) as u64)))
}

/// Stable position of an item in `[0, 1)`, so the same hashes survive a
/// sample every time.
fn sample_point(hash: &str) -> f64 {
    let digest = hash_str(hash);
    let mut word = [0u8; 8];
    word.copy_from_slice(&digest.0[..8]);
    (u64::from_le_bytes(word) >> 11) as f64 / (1u64 << 53) as f64
}
