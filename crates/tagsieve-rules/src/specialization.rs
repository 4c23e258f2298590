//! Transitively closed specialization relation (`::`).
//!
//! Both maps stay closed after every insert: a new edge pushes the parent's
//! whole ancestry into every descendant of the child, and mirrors that for
//! children. Because the maps are already closed, one breadth-first layer
//! reaches every relative.

use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Default)]
pub struct SpecializationClosure {
    parents: HashMap<String, BTreeSet<String>>,
    children: HashMap<String, BTreeSet<String>>,
}

impl SpecializationClosure {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `child :: parent`.
    pub fn insert(&mut self, child: &str, parent: &str) {
        if child == parent {
            return;
        }

        let mut up: BTreeSet<String> = self.parents.get(parent).cloned().unwrap_or_default();
        up.insert(parent.to_string());
        let mut down: BTreeSet<String> = self.children.get(child).cloned().unwrap_or_default();
        down.insert(child.to_string());

        for d in &down {
            let entry = self.parents.entry(d.clone()).or_default();
            entry.extend(up.iter().filter(|p| *p != d).cloned());
        }
        for u in &up {
            let entry = self.children.entry(u.clone()).or_default();
            entry.extend(down.iter().filter(|c| *c != u).cloned());
        }
    }

    pub fn parents(&self, tag: &str) -> Option<&BTreeSet<String>> {
        self.parents.get(tag)
    }

    pub fn children(&self, tag: &str) -> Option<&BTreeSet<String>> {
        self.children.get(tag)
    }

    pub fn has_children(&self, tag: &str) -> bool {
        self.children.get(tag).is_some_and(|c| !c.is_empty())
    }
}
