//! Classes discovered during one run, in discovery order.

use rustc_hash::{FxHashMap, FxHashSet};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReferenceState {
    /// Discovered, not generated yet.
    Referenced,
    /// Generated; holds the static initializer call, if any.
    Processed(Option<String>),
    /// Initializer written to the output.
    Emitted,
    /// Replaced by a stub; never initialized from this output.
    Skipped,
}

/// Append-only set of class names; insertion order is emission order.
#[derive(Debug, Default)]
pub struct ReferenceSet {
    order: Vec<String>,
    states: FxHashMap<String, ReferenceState>,
    next: usize,
}

impl ReferenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when `name` was already known.
    pub fn add(&mut self, name: &str) -> bool {
        if self.states.contains_key(name) {
            return false;
        }
        self.order.push(name.to_string());
        self.states.insert(name.to_string(), ReferenceState::Referenced);
        true
    }

    /// Next class still waiting to be generated, first discovered first.
    pub fn next_pending(&mut self) -> Option<String> {
        while let Some(name) = self.order.get(self.next) {
            self.next += 1;
            if self.states.get(name) == Some(&ReferenceState::Referenced) {
                return Some(name.clone());
            }
        }
        None
    }

    pub fn state(&self, name: &str) -> Option<&ReferenceState> {
        self.states.get(name)
    }

    pub fn mark_processed(&mut self, name: &str, init: Option<String>) {
        self.states.insert(name.to_string(), ReferenceState::Processed(init));
    }

    pub fn mark_skipped(&mut self, name: &str) {
        self.states.insert(name.to_string(), ReferenceState::Skipped);
    }

    pub fn names(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Static initializer calls in run order. The reference list is walked
    /// backwards; before a class is flushed, every processed class among
    /// `parents(class)` is flushed first. Each class is flushed once.
    pub fn flush_initializers<F>(&mut self, mut parents: F) -> Vec<String>
    where
        F: FnMut(&str) -> Vec<String>,
    {
        let mut out = Vec::new();
        let mut visiting = FxHashSet::default();
        let reversed: Vec<String> = self.order.iter().rev().cloned().collect();
        for name in reversed {
            self.flush_one(&name, &mut parents, &mut visiting, &mut out);
        }
        out
    }

    fn flush_one<F>(&mut self, name: &str, parents: &mut F, visiting: &mut FxHashSet<String>, out: &mut Vec<String>)
    where
        F: FnMut(&str) -> Vec<String>,
    {
        if !matches!(self.states.get(name), Some(ReferenceState::Processed(_))) {
            return;
        }
        if !visiting.insert(name.to_string()) {
            return;
        }
        for parent in parents(name) {
            self.flush_one(&parent, parents, visiting, out);
        }
        if let Some(ReferenceState::Processed(Some(init))) =
            self.states.insert(name.to_string(), ReferenceState::Emitted)
        {
            out.push(init);
        }
    }
}
