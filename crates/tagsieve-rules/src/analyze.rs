//! Tag inference over a raw tag collection.

use serde::{Deserialize, Serialize};

use tagsieve_core::expr::TagSet;
use tagsieve_core::rule::{TagOperator, TagRule};

use crate::engine::TagRuleEngine;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Raw tags with hash markers stripped and renames applied.
    pub normalized_tags: TagSet,
    /// Normalized tags plus everything they imply or generalize to.
    pub effective_tags: TagSet,
    /// Right-hand sides of implications that fired, in discovery order.
    pub missing_tag_sets: Vec<TagSet>,
    pub suggested_tags: TagSet,
}

impl AnalysisResult {
    /// Every tag of every missing set.
    pub fn missing_tags(&self) -> TagSet {
        self.missing_tag_sets.iter().flatten().cloned().collect()
    }
}

impl TagRuleEngine {
    pub fn analyze<I, S>(&self, raw_tags: I) -> AnalysisResult
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let normalized: TagSet = raw_tags
            .into_iter()
            .map(|t| self.rename(t.as_ref()))
            .filter(|t| !t.is_empty())
            .collect();
        if normalized.is_empty() {
            return AnalysisResult::default();
        }

        let mut effective = normalized.clone();
        for tag in &normalized {
            effective.extend(self.specialization_parents(tag).into_iter().flatten().cloned());
        }

        let mut missing: Vec<TagSet> = Vec::new();
        let implications = self.rules(TagOperator::Implication);
        loop {
            let candidates: Vec<&TagRule> = implications
                .iter()
                .filter(|r| r.left.is_subset(&effective) && !r.right.is_subset(&effective))
                .collect();
            if candidates.is_empty() {
                break;
            }

            let (single, multi): (Vec<&TagRule>, Vec<&TagRule>) =
                candidates.into_iter().partition(|r| r.right.len() == 1);

            if single.is_empty() {
                // Multi-tag sides only name a choice; they never satisfy
                // anything, so the closure is complete after recording them.
                for rule in multi {
                    if !missing.contains(&rule.right) {
                        missing.push(rule.right.clone());
                    }
                }
                break;
            }

            for rule in single {
                if rule.right.is_subset(&effective) {
                    continue;
                }
                if !missing.contains(&rule.right) {
                    missing.push(rule.right.clone());
                }
                if let Some(tag) = TagRule::single(&rule.right) {
                    effective.insert(tag.to_string());
                    effective.extend(self.specialization_parents(tag).into_iter().flatten().cloned());
                }
            }
        }

        let mut suggested = TagSet::new();
        for rule in self.rules(TagOperator::Suggestion) {
            if rule.left.is_subset(&effective) && !rule.right.is_subset(&effective) {
                suggested.extend(rule.right.iter().cloned());
            }
        }
        let missing_flat: TagSet = missing.iter().flatten().cloned().collect();
        suggested.extend(missing_flat.iter().cloned());
        for tag in effective.iter().chain(missing_flat.iter()) {
            suggested.extend(self.specialization_children(tag).into_iter().flatten().cloned());
        }
        suggested.retain(|t| !effective.contains(t));

        tracing::trace!(
            normalized = normalized.len(),
            effective = effective.len(),
            missing = missing.len(),
            suggested = suggested.len(),
            "analyzed tags"
        );

        AnalysisResult {
            normalized_tags: normalized,
            effective_tags: effective,
            missing_tag_sets: missing,
            suggested_tags: suggested,
        }
    }
}
