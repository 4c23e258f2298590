//! Relational backend.
//!
//! Schema the script runs against:
//!
//! | table           | columns                                 |
//! |-----------------|-----------------------------------------|
//! | `HashInfo`      | `Hash, FileSize, FileType, Version`     |
//! | `Paths`         | `Hash, Path`                            |
//! | `Tags`          | `TagId, Name`                           |
//! | `HashTags`      | `Hash, TagId, Rejected`                 |
//! | `Persons`       | `PersonId, Name`                        |
//! | `PersonAliases` | `PersonId, Alias`                       |
//! | `HashPeople`    | `Hash, PersonId`                        |
//! | `HashDetails`   | `Hash, Name, Value`                     |
//! | `HashRatings`   | `Hash, Category, Value, Count`          |
//!
//! The script first materializes the matching `HashInfo` rows into
//! `temp.SearchHashes`, then returns one result set per [`ResultSet`] in
//! [`ResultSet::ORDER`]. Callers read them positionally.

use serde::{Deserialize, Serialize};

use tagsieve_core::config::SearchConfig;
use tagsieve_core::expr::{CompareOp, Comparison, DetailValue, Expression, TagSet};
use tagsieve_core::hash::{hash_serde, Hash256};
use tagsieve_core::stars::StarRanges;

use crate::error::{BackendError, Result};
use crate::metrics::emit_span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultSet {
    /// `Hash, FileSize, FileType, Version`
    Hashes,
    /// `Hash, Name`
    Tags,
    /// `Hash, Name`
    RejectedTags,
    /// `Hash, Path`
    Paths,
    /// `Hash, PersonId, Name, Alias` (one row per alias, `Alias` may be NULL)
    People,
    /// `Hash, Name, Value`
    Details,
    /// `Hash, Category, Value, Count`
    Ratings,
}

impl ResultSet {
    pub const ORDER: [ResultSet; 7] = [
        ResultSet::Hashes,
        ResultSet::Tags,
        ResultSet::RejectedTags,
        ResultSet::Paths,
        ResultSet::People,
        ResultSet::Details,
        ResultSet::Ratings,
    ];

    fn query(self) -> &'static str {
        match self {
            ResultSet::Hashes => "SELECT Hash, FileSize, FileType, Version FROM temp.SearchHashes ORDER BY Hash;",
            ResultSet::Tags => {
                "SELECT ht.Hash, t.Name FROM HashTags ht \
                 JOIN temp.SearchHashes s ON s.Hash = ht.Hash \
                 JOIN Tags t ON t.TagId = ht.TagId WHERE ht.Rejected = 0;"
            }
            ResultSet::RejectedTags => {
                "SELECT ht.Hash, t.Name FROM HashTags ht \
                 JOIN temp.SearchHashes s ON s.Hash = ht.Hash \
                 JOIN Tags t ON t.TagId = ht.TagId WHERE ht.Rejected = 1;"
            }
            ResultSet::Paths => "SELECT p.Hash, p.Path FROM Paths p JOIN temp.SearchHashes s ON s.Hash = p.Hash;",
            ResultSet::People => {
                "SELECT hp.Hash, pe.PersonId, pe.Name, pa.Alias FROM HashPeople hp \
                 JOIN temp.SearchHashes s ON s.Hash = hp.Hash \
                 JOIN Persons pe ON pe.PersonId = hp.PersonId \
                 LEFT JOIN PersonAliases pa ON pa.PersonId = pe.PersonId;"
            }
            ResultSet::Details => {
                "SELECT d.Hash, d.Name, d.Value FROM HashDetails d JOIN temp.SearchHashes s ON s.Hash = d.Hash;"
            }
            ResultSet::Ratings => {
                "SELECT r.Hash, r.Category, r.Value, r.Count FROM HashRatings r \
                 JOIN temp.SearchHashes s ON s.Hash = r.Hash;"
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlScript {
    pub text: String,
    /// `text` split into its statements, setup first, then one per result set.
    pub statements: Vec<String>,
    pub result_sets: Vec<ResultSet>,
    /// Fingerprint of the expression the script was compiled from.
    pub fingerprint: Hash256,
}

/// Optional joins, switched on by the first leaf that needs them.
#[derive(Debug, Default, Clone, Copy)]
struct Joins {
    copies: bool,
    tag_count: bool,
    people_count: bool,
    rating: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SqlBackend {
    rating_category: String,
    stars: Option<StarRanges>,
}

impl SqlBackend {
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

    /// Used for `Stars` leaves built outside the dialect.
    pub fn with_star_ranges(mut self, stars: StarRanges) -> Self {
        self.stars = Some(stars);
        self
    }

    pub fn compile(&self, expr: &Expression) -> Result<SqlScript> {
        let mut joins = Joins::default();
        let condition = self.condition(expr, &mut joins)?;

        let mut from = vec!["FROM HashInfo h".to_string()];
        if joins.copies {
            from.push("LEFT JOIN (SELECT Hash, COUNT(*) AS Copies FROM Paths GROUP BY Hash) cp ON cp.Hash = h.Hash".into());
        }
        if joins.tag_count {
            from.push(
                "LEFT JOIN (SELECT Hash, COUNT(*) AS TagCount FROM HashTags WHERE Rejected = 0 GROUP BY Hash) tc \
                 ON tc.Hash = h.Hash"
                    .into(),
            );
        }
        if joins.people_count {
            from.push(
                "LEFT JOIN (SELECT Hash, COUNT(*) AS PeopleCount FROM HashPeople GROUP BY Hash) pc ON pc.Hash = h.Hash"
                    .into(),
            );
        }
        if joins.rating {
            from.push(format!(
                "LEFT JOIN (SELECT Hash, Value, Count FROM HashRatings WHERE Category = {}) r ON r.Hash = h.Hash",
                quote(&self.rating_category)
            ));
        }

        let mut statements = vec![
            "DROP TABLE IF EXISTS temp.SearchHashes;".to_string(),
            format!(
                "CREATE TEMP TABLE SearchHashes AS\nSELECT h.Hash, h.FileSize, h.FileType, h.Version\n{}\nWHERE {};",
                from.join("\n"),
                condition
            ),
        ];
        statements.extend(ResultSet::ORDER.iter().map(|r| r.query().to_string()));

        let fingerprint = hash_serde(expr)?;
        emit_span(
            "sql_compile",
            &[
                ("fingerprint", fingerprint.short()),
                ("copies_join", joins.copies.to_string()),
                ("tag_count_join", joins.tag_count.to_string()),
                ("people_count_join", joins.people_count.to_string()),
                ("rating_join", joins.rating.to_string()),
            ],
        );

        Ok(SqlScript {
            text: statements.join("\n"),
            statements,
            result_sets: ResultSet::ORDER.to_vec(),
            fingerprint,
        })
    }

    fn condition(&self, expr: &Expression, joins: &mut Joins) -> Result<String> {
        use Expression::*;
        Ok(match expr {
            Conjunction(xs) if xs.is_empty() => "1=1".into(),
            Disjunction(xs) if xs.is_empty() => "1=0".into(),
            Conjunction(xs) => self.join(xs, " AND ", joins)?,
            Disjunction(xs) => self.join(xs, " OR ", joins)?,
            Negation(inner) => format!("NOT ({})", self.condition(inner, joins)?),

            TypeEquals(t) => format!("h.FileType = {}", quote(t)),
            TypePrefix(p) => format!("substr(h.FileType, 1, {}) = {}", p.chars().count(), quote(p)),
            Text(s) => format!(
                "EXISTS (SELECT 1 FROM Paths p WHERE p.Hash = h.Hash AND p.Path LIKE {} ESCAPE '\\')",
                quote(&format!("%{}%", like_escape(s)))
            ),
            Hash(x) => format!("h.Hash = {} COLLATE NOCASE", quote(x)),
            FileSize(c) => compare("h.FileSize", c.op, c.value),
            Copies(c) => {
                joins.copies = true;
                compare("COALESCE(cp.Copies, 0)", c.op, c.value)
            }
            TagCount(c) => {
                joins.tag_count = true;
                compare("COALESCE(tc.TagCount, 0)", c.op, c.value)
            }
            PeopleCount(c) => {
                joins.people_count = true;
                compare("COALESCE(pc.PeopleCount, 0)", c.op, c.value)
            }
            RatingsCount(c) => {
                joins.rating = true;
                compare("COALESCE(r.Count, 0)", c.op, c.value)
            }
            // unrated rows carry a NULL value; keep the leaf two-valued under NOT
            Rating(c) => {
                joins.rating = true;
                format!("(r.Value IS NOT NULL AND r.Value {} {})", c.op.symbol(), real(c.value)?)
            }
            Stars(c) => return self.stars(*c, joins),
            PersonId(id) => {
                format!("EXISTS (SELECT 1 FROM HashPeople hp WHERE hp.Hash = h.Hash AND hp.PersonId = {id})")
            }
            PersonName(name) => {
                let n = quote(name);
                format!(
                    "EXISTS (SELECT 1 FROM HashPeople hp JOIN Persons pe ON pe.PersonId = hp.PersonId \
                     WHERE hp.Hash = h.Hash AND (pe.Name = {n} COLLATE NOCASE OR EXISTS \
                     (SELECT 1 FROM PersonAliases pa WHERE pa.PersonId = pe.PersonId AND pa.Alias = {n} COLLATE NOCASE)))"
                )
            }
            NoPeople => "NOT EXISTS (SELECT 1 FROM HashPeople hp WHERE hp.Hash = h.Hash)".into(),
            Tag(set) => tag_exists(set, 0),
            RejectedTag(set) => tag_exists(set, 1),
            // numbers only compare with numbers and text with text
            Details { field, op, value } => format!(
                "EXISTS (SELECT 1 FROM HashDetails d WHERE d.Hash = h.Hash AND d.Name = {} AND {} AND d.Value {} {})",
                quote(field),
                detail_type(value),
                op.symbol(),
                detail(value)?
            ),
            Sample(p) => {
                if !p.is_finite() {
                    return Err(BackendError::Invariant(format!("sample portion {p} is not finite")));
                }
                let scaled = (p.clamp(0.0, 1.0) * 1_000_000.0).round() as u64;
                format!("(ABS(RANDOM()) % 1000000) < {scaled}")
            }
        })
    }

    fn join(&self, xs: &[Expression], sep: &str, joins: &mut Joins) -> Result<String> {
        let parts = xs
            .iter()
            .map(|x| self.condition(x, joins))
            .collect::<Result<Vec<_>>>()?;
        Ok(format!("({})", parts.join(sep)))
    }

    /// Without a star table every star comparison is unconstrained.
    fn stars(&self, cmp: Comparison<u8>, joins: &mut Joins) -> Result<String> {
        let resolved = match &self.stars {
            Some(ranges) => ranges.resolve(cmp),
            None => StarRanges::default().resolve(cmp),
        };
        self.condition(&resolved, joins)
    }
}

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn like_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn compare(column: &str, op: CompareOp, value: u64) -> String {
    format!("{column} {} {value}", op.symbol())
}

fn real(v: f64) -> Result<String> {
    if v.is_finite() {
        Ok(format!("{v:?}"))
    } else {
        Err(BackendError::Invariant(format!("{v} cannot be written as a SQL literal")))
    }
}

fn detail(v: &DetailValue) -> Result<String> {
    match v {
        DetailValue::Integer(i) => Ok(i.to_string()),
        DetailValue::Real(r) => real(*r),
        DetailValue::Text(s) => Ok(quote(s)),
    }
}

fn detail_type(v: &DetailValue) -> &'static str {
    match v {
        DetailValue::Integer(_) | DetailValue::Real(_) => "typeof(d.Value) IN ('integer', 'real')",
        DetailValue::Text(_) => "typeof(d.Value) = 'text'",
    }
}

fn tag_exists(set: &TagSet, rejected: u8) -> String {
    if set.is_empty() {
        return "1=0".into();
    }
    let names: Vec<String> = set.iter().map(|t| quote(t)).collect();
    format!(
        "EXISTS (SELECT 1 FROM HashTags ht JOIN Tags t ON t.TagId = ht.TagId \
         WHERE ht.Hash = h.Hash AND ht.Rejected = {rejected} AND t.Name IN ({}))",
        names.join(", ")
    )
}
