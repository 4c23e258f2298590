//! Rename folding for `=>` rules.
//!
//! Every name maps straight to its final target, and each final target knows
//! every name that ends up on it. Adding `a => b` re-points everything that
//! previously renamed to `a`.

use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Default)]
pub struct RenameMap {
    forward: HashMap<String, String>,
    reverse: HashMap<String, BTreeSet<String>>,
}

impl RenameMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `from => to`. A rename that would land back on `from` is dropped.
    pub fn insert(&mut self, from: &str, to: &str) {
        let target = self.resolve(to).to_string();
        if target == from {
            tracing::debug!(from, to, "ignoring rename that closes a cycle");
            return;
        }

        if let Some(old) = self.forward.get(from) {
            if let Some(names) = self.reverse.get_mut(old) {
                names.remove(from);
            }
        }

        let mut moved = self.reverse.remove(from).unwrap_or_default();
        moved.insert(from.to_string());
        for name in &moved {
            self.forward.insert(name.clone(), target.clone());
        }
        self.reverse.entry(target).or_default().extend(moved);
    }

    /// Final name for `name` (itself when never renamed).
    pub fn resolve<'a>(&'a self, name: &'a str) -> &'a str {
        self.forward.get(name).map(String::as_str).unwrap_or(name)
    }

    /// Names that rename onto `target`.
    pub fn aliases(&self, target: &str) -> Option<&BTreeSet<String>> {
        self.reverse.get(target).filter(|s| !s.is_empty())
    }

    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.reverse
            .iter()
            .filter(|(_, names)| !names.is_empty())
            .map(|(t, _)| t.as_str())
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}
