//! Star buckets over the rating scale.
//!
//! Bucket `n` (1-based) covers ratings in `[min, max)`; the lowest bucket has
//! no lower bound and the highest none above. Star comparisons resolve to
//! rating comparisons against these bounds. Missing bounds mean no constraint.

use serde::{Deserialize, Serialize};

use crate::expr::{CompareOp, Comparison, Expression};

/// Ten percentile buckets mapped onto five stars.
pub const DECILE_STARS: [u8; 10] = [1, 2, 2, 3, 3, 3, 3, 4, 4, 5];

pub const MAX_STARS: u8 = 5;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StarRanges {
    /// `(min, max)` per star bucket, index 0 is one star.
    pub ranges: Vec<(Option<f64>, Option<f64>)>,
}

impl StarRanges {
    pub fn new(ranges: Vec<(Option<f64>, Option<f64>)>) -> Self {
        Self { ranges }
    }

    /// Derive bucket bounds from a population of ratings by decile.
    pub fn from_ratings(ratings: &[f64]) -> Self {
        let mut sorted: Vec<f64> = ratings.iter().copied().filter(|r| r.is_finite()).collect();
        if sorted.is_empty() {
            return Self::default();
        }
        sorted.sort_by(f64::total_cmp);

        let n = sorted.len();
        // boundary[k] is where decile k starts, k in 1..=9
        let boundary = |k: usize| sorted[((k * n) / 10).min(n - 1)];

        let mut ranges = Vec::with_capacity(MAX_STARS as usize);
        for star in 1..=MAX_STARS {
            let first = DECILE_STARS.iter().position(|&s| s == star);
            let last = DECILE_STARS.iter().rposition(|&s| s == star);
            let (Some(first), Some(last)) = (first, last) else {
                ranges.push((None, None));
                continue;
            };
            let min = (first > 0).then(|| boundary(first));
            let max = (last + 1 < DECILE_STARS.len()).then(|| boundary(last + 1));
            ranges.push((min, max));
        }
        Self { ranges }
    }

    fn bucket(&self, star: u8) -> Option<(Option<f64>, Option<f64>)> {
        let idx = (star as usize).checked_sub(1)?;
        self.ranges.get(idx).copied()
    }

    /// The star bucket a rating falls into, if any.
    pub fn star_of(&self, rating: f64) -> Option<u8> {
        self.ranges.iter().enumerate().find_map(|(i, (min, max))| {
            let above = min.map_or(true, |m| rating >= m);
            let below = max.map_or(true, |m| rating < m);
            (above && below).then_some(i as u8 + 1)
        })
    }

    /// A comparison no star in the table satisfies. Without a table nothing
    /// is known, so it constrains nothing.
    fn unmatched(&self) -> Expression {
        if self.ranges.is_empty() {
            Expression::always_true()
        } else {
            Expression::always_false()
        }
    }

    /// Lower a star comparison into rating comparisons.
    ///
    /// `<` becomes `<=` of the previous star, `>` becomes `>=` of the next,
    /// `=` is both bounds of the same star, or nothing at all when the table
    /// has no such star.
    pub fn resolve(&self, cmp: Comparison<u8>) -> Expression {
        let star = cmp.value;
        match cmp.op {
            CompareOp::Less => match star.checked_sub(1) {
                Some(prev) if prev > 0 => self.resolve(Comparison::new(CompareOp::LessOrEqual, prev)),
                _ => self.unmatched(),
            },
            CompareOp::Greater => match star.checked_add(1) {
                Some(next) if self.bucket(next).is_some() => {
                    self.resolve(Comparison::new(CompareOp::GreaterOrEqual, next))
                }
                _ => self.unmatched(),
            },
            CompareOp::Equal if self.bucket(star).is_none() => self.unmatched(),
            CompareOp::Equal => Expression::and(
                [CompareOp::GreaterOrEqual, CompareOp::LessOrEqual]
                    .into_iter()
                    .map(|op| self.resolve(Comparison::new(op, star)))
                    .filter(|bound| !bound.is_always_true())
                    .collect(),
            ),
            CompareOp::GreaterOrEqual => match self.bucket(star) {
                Some((Some(min), _)) => Expression::Rating(Comparison::new(CompareOp::GreaterOrEqual, min)),
                Some((None, _)) => Expression::always_true(),
                None => self.unmatched(),
            },
            CompareOp::LessOrEqual if star == 0 => self.unmatched(),
            CompareOp::LessOrEqual => match self.bucket(star).and_then(|(_, max)| max) {
                Some(max) => Expression::Rating(Comparison::new(CompareOp::Less, max)),
                None => Expression::always_true(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> StarRanges {
        StarRanges::new(vec![
            (None, Some(1200.0)),
            (Some(1200.0), Some(1400.0)),
            (Some(1400.0), Some(1600.0)),
            (Some(1600.0), Some(1800.0)),
            (Some(1800.0), None),
        ])
    }

    fn rating(op: CompareOp, v: f64) -> Expression {
        Expression::Rating(Comparison::new(op, v))
    }

    #[test]
    fn three_stars_is_a_closed_open_band() {
        let e = sample().resolve(Comparison::new(CompareOp::Equal, 3));
        assert_eq!(
            e,
            Expression::and(vec![
                rating(CompareOp::GreaterOrEqual, 1400.0),
                rating(CompareOp::Less, 1600.0)
            ])
        );
    }

    #[test]
    fn at_least_four_stars() {
        let e = sample().resolve(Comparison::new(CompareOp::GreaterOrEqual, 4));
        assert_eq!(e, rating(CompareOp::GreaterOrEqual, 1600.0));
    }

    #[test]
    fn strict_comparisons_shift_buckets() {
        let r = sample();
        assert_eq!(
            r.resolve(Comparison::new(CompareOp::Greater, 3)),
            rating(CompareOp::GreaterOrEqual, 1600.0)
        );
        assert_eq!(
            r.resolve(Comparison::new(CompareOp::Less, 3)),
            rating(CompareOp::Less, 1400.0)
        );
    }

    #[test]
    fn missing_bounds_mean_no_constraint() {
        let r = sample();
        assert!(r.resolve(Comparison::new(CompareOp::GreaterOrEqual, 1)).is_always_true());
        assert!(r.resolve(Comparison::new(CompareOp::LessOrEqual, 5)).is_always_true());
        assert!(StarRanges::default()
            .resolve(Comparison::new(CompareOp::GreaterOrEqual, 3))
            .is_always_true());
        assert!(StarRanges::default()
            .resolve(Comparison::new(CompareOp::Equal, 3))
            .is_always_true());
    }

    #[test]
    fn stars_outside_the_table_match_nothing() {
        let r = sample();
        assert!(r.resolve(Comparison::new(CompareOp::Equal, 0)).is_always_false());
        assert!(r.resolve(Comparison::new(CompareOp::Equal, 6)).is_always_false());
        assert!(!r.resolve(Comparison::new(CompareOp::Equal, 5)).is_always_false());
        assert!(r.resolve(Comparison::new(CompareOp::Less, 1)).is_always_false());
        assert!(r.resolve(Comparison::new(CompareOp::Greater, 5)).is_always_false());
        assert!(r.resolve(Comparison::new(CompareOp::GreaterOrEqual, 9)).is_always_false());
        assert!(r.resolve(Comparison::new(CompareOp::LessOrEqual, 9)).is_always_true());
        assert!(StarRanges::default()
            .resolve(Comparison::new(CompareOp::Less, 1))
            .is_always_true());
    }

    #[test]
    fn deciles_map_onto_five_stars() {
        let ratings: Vec<f64> = (0..100).map(|i| i as f64).collect();
        let r = StarRanges::from_ratings(&ratings);
        assert_eq!(r.ranges.len(), 5);
        assert_eq!(r.ranges[0], (None, Some(10.0)));
        assert_eq!(r.ranges[2], (Some(30.0), Some(70.0)));
        assert_eq!(r.ranges[4], (Some(90.0), None));
        assert_eq!(r.star_of(5.0), Some(1));
        assert_eq!(r.star_of(50.0), Some(3));
        assert_eq!(r.star_of(99.0), Some(5));
    }
}
