//! The tag rule engine.
//!
//! Construction is a two-pass build: collect rules and properties in a
//! [`TagRuleEngineBuilder`], then fold renames, simplify rules, close the
//! specialization relation and memoize the hierarchy into read-only maps.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use tagsieve_core::expr::{CompareOp, TagSet};
use tagsieve_core::rule::{TagOperator, TagRule};
use tagsieve_core::Result;

use crate::parse::{normalize_tag, parse_rules};
use crate::rename::RenameMap;
use crate::specialization::SpecializationClosure;

/// Which relatives of a tag a hierarchical tag search reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HierarchyRelation {
    SelfOnly,
    Ancestor,
    SelfOrAncestor,
    Descendant,
    SelfOrDescendant,
}

impl HierarchyRelation {
    /// `= self, > ancestor, >= self-or-ancestor, < descendant, <= self-or-descendant`
    pub fn from_operator(op: CompareOp) -> Self {
        match op {
            CompareOp::Equal => HierarchyRelation::SelfOnly,
            CompareOp::Greater => HierarchyRelation::Ancestor,
            CompareOp::GreaterOrEqual => HierarchyRelation::SelfOrAncestor,
            CompareOp::Less => HierarchyRelation::Descendant,
            CompareOp::LessOrEqual => HierarchyRelation::SelfOrDescendant,
        }
    }
}

/// Read-only view of everything the engine knows about one tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagInfo {
    pub tag: String,
    pub is_abstract: bool,
    pub aliases: TagSet,
    pub properties: Vec<String>,
    pub parents: TagSet,
    pub children: TagSet,
    pub ancestors: TagSet,
    pub descendants: TagSet,
}

#[derive(Debug, Default)]
pub struct TagRuleEngineBuilder {
    rules: Vec<TagRule>,
    properties: Vec<(String, String)>,
}

impl TagRuleEngineBuilder {
    pub fn rule(mut self, rule: TagRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules<I: IntoIterator<Item = TagRule>>(mut self, rules: I) -> Self {
        self.rules.extend(rules);
        self
    }

    /// Parse and add rules in the textual rule language.
    pub fn rules_text(self, src: &str) -> Result<Self> {
        Ok(self.rules(parse_rules(src)?))
    }

    /// Attach a property string (e.g. `name=Alice`) to a tag.
    pub fn property(mut self, tag: impl Into<String>, property: impl Into<String>) -> Self {
        self.properties.push((tag.into(), property.into()));
        self
    }

    pub fn build(self) -> Result<TagRuleEngine> {
        TagRuleEngine::construct(self.rules, self.properties)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TagRuleEngine {
    renames: RenameMap,
    rules: HashMap<TagOperator, Vec<TagRule>>,
    specialization: SpecializationClosure,
    parents: HashMap<String, TagSet>,
    children: HashMap<String, TagSet>,
    properties: HashMap<String, Vec<String>>,
    tags: TagSet,
}

impl TagRuleEngine {
    pub fn builder() -> TagRuleEngineBuilder {
        TagRuleEngineBuilder::default()
    }

    pub fn new<I: IntoIterator<Item = TagRule>>(rules: I) -> Result<Self> {
        Self::builder().rules(rules).build()
    }

    pub fn from_text(src: &str) -> Result<Self> {
        Self::builder().rules_text(src)?.build()
    }

    fn construct(rules: Vec<TagRule>, properties: Vec<(String, String)>) -> Result<Self> {
        // Fail fast: no partially built engine on a bad rule.
        for rule in &rules {
            rule.validate()?;
        }

        let mut renames = RenameMap::new();
        for rule in rules.iter().filter(|r| r.operator == TagOperator::Definition) {
            if let (Some(from), Some(to)) = (TagRule::single(&rule.left), TagRule::single(&rule.right)) {
                renames.insert(from, to);
            }
        }

        let simplified = simplify(&rules, &renames);

        let mut grouped: HashMap<TagOperator, Vec<TagRule>> = HashMap::new();
        for rule in simplified {
            grouped.entry(rule.operator).or_default().push(rule);
        }

        let mut specialization = SpecializationClosure::new();
        let mut parents: HashMap<String, TagSet> = HashMap::new();
        let mut children: HashMap<String, TagSet> = HashMap::new();
        for rule in grouped.get(&TagOperator::Specialization).into_iter().flatten() {
            if let (Some(child), Some(parent)) = (TagRule::single(&rule.left), TagRule::single(&rule.right)) {
                if child == parent {
                    continue;
                }
                specialization.insert(child, parent);
                parents.entry(child.to_string()).or_default().insert(parent.to_string());
                children.entry(parent.to_string()).or_default().insert(child.to_string());
            }
        }

        let mut props: HashMap<String, Vec<String>> = HashMap::new();
        for (tag, property) in properties {
            let tag = renames.resolve(&normalize_tag(&tag)).to_string();
            let list = props.entry(tag).or_default();
            if !list.contains(&property) {
                list.push(property);
            }
        }

        let mut tags = TagSet::new();
        for rule in grouped.values().flatten() {
            tags.extend(rule.left.iter().cloned());
            tags.extend(rule.right.iter().cloned());
        }
        tags.extend(props.keys().cloned());
        tags.extend(renames.targets().map(str::to_string));

        tracing::debug!(
            rules = rules.len(),
            renames = renames.len(),
            tags = tags.len(),
            "built tag rule engine"
        );

        Ok(Self {
            renames,
            rules: grouped,
            specialization,
            parents,
            children,
            properties: props,
            tags,
        })
    }

    /// Strip the hash marker and follow renames.
    pub fn rename(&self, raw: &str) -> String {
        let tag = normalize_tag(raw);
        self.renames.resolve(&tag).to_string()
    }

    /// Simplified rules of one operator kind.
    pub fn rules(&self, op: TagOperator) -> &[TagRule] {
        self.rules.get(&op).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every canonical tag mentioned by a rule or property.
    pub fn known_tags(&self) -> &TagSet {
        &self.tags
    }

    pub fn aliases(&self, tag: &str) -> Option<&BTreeSet<String>> {
        self.renames.aliases(tag)
    }

    pub fn properties(&self, tag: &str) -> &[String] {
        self.properties.get(tag).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Tags carrying at least one property.
    pub fn tags_with_properties(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.properties.iter().map(|(t, p)| (t.as_str(), p.as_slice()))
    }

    pub fn specialization_parents(&self, tag: &str) -> Option<&BTreeSet<String>> {
        self.specialization.parents(tag)
    }

    pub fn specialization_children(&self, tag: &str) -> Option<&BTreeSet<String>> {
        self.specialization.children(tag)
    }

    /// Every generalization of `tag`, transitively.
    pub fn ancestors(&self, tag: &str) -> Option<&TagSet> {
        self.specialization.parents(tag)
    }

    /// Every specialization of `tag`, transitively.
    pub fn descendants(&self, tag: &str) -> Option<&TagSet> {
        self.specialization.children(tag)
    }

    /// Relatives of `tag` (after renaming) under `relation`.
    pub fn related(&self, tag: &str, relation: HierarchyRelation) -> TagSet {
        let tag = self.rename(tag);
        let mut out = TagSet::new();
        let include_self = matches!(
            relation,
            HierarchyRelation::SelfOnly
                | HierarchyRelation::SelfOrAncestor
                | HierarchyRelation::SelfOrDescendant
        );
        match relation {
            HierarchyRelation::Ancestor | HierarchyRelation::SelfOrAncestor => {
                out.extend(self.ancestors(&tag).into_iter().flatten().cloned());
            }
            HierarchyRelation::Descendant | HierarchyRelation::SelfOrDescendant => {
                out.extend(self.descendants(&tag).into_iter().flatten().cloned());
            }
            HierarchyRelation::SelfOnly => {}
        }
        if include_self {
            out.insert(tag);
        }
        out
    }

    pub fn self_or_ancestors(&self, tag: &str) -> TagSet {
        self.related(tag, HierarchyRelation::SelfOrAncestor)
    }

    pub fn self_or_descendants(&self, tag: &str) -> TagSet {
        self.related(tag, HierarchyRelation::SelfOrDescendant)
    }

    /// `tags` plus every alias that renames onto one of them.
    pub fn with_aliases(&self, tags: TagSet) -> TagSet {
        let mut out = tags.clone();
        for t in &tags {
            if let Some(aliases) = self.aliases(t) {
                out.extend(aliases.iter().cloned());
            }
        }
        out
    }

    pub fn tag_info(&self, raw: &str) -> TagInfo {
        let tag = self.rename(raw);
        let set = |m: &HashMap<String, TagSet>| m.get(&tag).cloned().unwrap_or_default();
        TagInfo {
            is_abstract: self.specialization.has_children(&tag),
            aliases: self.aliases(&tag).cloned().unwrap_or_default(),
            properties: self.properties(&tag).to_vec(),
            parents: set(&self.parents),
            children: set(&self.children),
            ancestors: self.ancestors(&tag).cloned().unwrap_or_default(),
            descendants: self.descendants(&tag).cloned().unwrap_or_default(),
            tag,
        }
    }
}

/// Rename every tag and expand two-way operators into one-way rules plus
/// every single-tag pair across the two sides.
fn simplify(rules: &[TagRule], renames: &RenameMap) -> BTreeSet<TagRule> {
    let rename_set = |s: &TagSet| -> TagSet { s.iter().map(|t| renames.resolve(t).to_string()).collect() };

    let mut out = BTreeSet::new();
    for rule in rules.iter().filter(|r| r.operator != TagOperator::Definition) {
        let left = rename_set(&rule.left);
        let right = rename_set(&rule.right);

        match rule.operator.unidirectional() {
            Some(op) => {
                out.insert(TagRule { left: left.clone(), operator: op, right: right.clone() });
                out.insert(TagRule { left: right.clone(), operator: op, right: left.clone() });
                for l in &left {
                    for r in &right {
                        if l == r {
                            continue;
                        }
                        let one = |t: &String| TagSet::from([t.clone()]);
                        out.insert(TagRule { left: one(l), operator: op, right: one(r) });
                        out.insert(TagRule { left: one(r), operator: op, right: one(l) });
                    }
                }
            }
            None => {
                out.insert(TagRule { left, operator: rule.operator, right });
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagsieve_core::Error;

    fn set(xs: &[&str]) -> TagSet {
        xs.iter().map(|s| s.to_string()).collect()
    }

    fn engine(src: &str) -> TagRuleEngine {
        TagRuleEngine::from_text(src).unwrap()
    }

    #[test]
    fn renames_apply_to_every_rule() {
        let e = engine("kitty => cat\nkitty -> animal");
        assert_eq!(e.rules(TagOperator::Implication)[0].to_string(), "cat -> animal");
        assert_eq!(e.rename("#kitty"), "cat");
        assert_eq!(e.with_aliases(set(&["cat"])), set(&["cat", "kitty"]));
    }

    #[test]
    fn bidirectional_rules_materialize_pairwise_edges() {
        let e = engine("a b <-> c");
        let rules: Vec<String> = e.rules(TagOperator::Implication).iter().map(|r| r.to_string()).collect();
        assert!(rules.contains(&"a b -> c".to_string()));
        assert!(rules.contains(&"c -> a b".to_string()));
        assert!(rules.contains(&"a -> c".to_string()));
        assert!(rules.contains(&"c -> b".to_string()));
        assert!(e.rules(TagOperator::BidirectionalImplication).is_empty());

        let e = engine("day <!> night");
        assert_eq!(e.rules(TagOperator::Exclusion).len(), 2);
    }

    #[test]
    fn hierarchy_comes_from_specializations_only() {
        let e = engine("cat :: animal\ntabby :: cat\ncat -> pet");
        assert_eq!(e.related("tabby", HierarchyRelation::Ancestor), set(&["animal", "cat"]));
        assert_eq!(e.self_or_descendants("animal"), set(&["animal", "cat", "tabby"]));
        assert_eq!(e.related("cat", HierarchyRelation::SelfOnly), set(&["cat"]));
        assert!(e.ancestors("pet").is_none());
        assert!(e.descendants("pet").is_none());
    }

    #[test]
    fn unknown_tags_relate_only_to_themselves() {
        let e = engine("cat -> animal");
        assert_eq!(e.self_or_descendants("rock"), set(&["rock"]));
        assert!(e.related("rock", HierarchyRelation::Descendant).is_empty());
    }

    #[test]
    fn tag_info_collects_everything() {
        let e = TagRuleEngine::builder()
            .rules_text("kitty => cat\ncat :: animal\ntabby :: cat")
            .unwrap()
            .property("cat", "legs=4")
            .property("kitty", "sound=meow")
            .build()
            .unwrap();
        let info = e.tag_info("kitty");
        assert_eq!(info.tag, "cat");
        assert!(info.is_abstract);
        assert_eq!(info.aliases, set(&["kitty"]));
        assert_eq!(info.properties, vec!["legs=4".to_string(), "sound=meow".to_string()]);
        assert_eq!(info.parents, set(&["animal"]));
        assert_eq!(info.children, set(&["tabby"]));
        assert_eq!(info.descendants, set(&["tabby"]));
        assert!(!e.tag_info("tabby").is_abstract);
    }

    #[test]
    fn bad_rules_fail_construction() {
        let bad = TagRule {
            left: set(&["a", "b"]),
            operator: TagOperator::Specialization,
            right: set(&["c"]),
        };
        let err = TagRuleEngine::new([bad]).unwrap_err();
        assert!(matches!(err, Error::InvalidRule { .. }));
    }

    #[test]
    fn specialization_cycles_terminate() {
        let e = engine("a :: b\nb :: a");
        assert_eq!(e.self_or_ancestors("a"), set(&["a", "b"]));
        assert_eq!(e.self_or_descendants("b"), set(&["a", "b"]));
    }

    #[test]
    fn known_tags_cover_rules_properties_and_rename_targets() {
        let e = TagRuleEngine::builder()
            .rules_text("old => new\napple -> fruit")
            .unwrap()
            .property("banana", "color=yellow")
            .build()
            .unwrap();
        assert_eq!(e.known_tags(), &set(&["apple", "banana", "fruit", "new"]));
    }
}
