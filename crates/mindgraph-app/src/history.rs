use chrono::{DateTime, Utc};
use mindgraph_core::Tree;

pub const DEFAULT_MAX_HISTORY: usize = 50;

/// A full snapshot of the tree and the input text it came from.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub tree: Tree,
    pub input: String,
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(tree: &Tree, input: &str) -> Self {
        Self {
            tree: tree.clone(),
            input: input.to_string(),
            timestamp: Utc::now(),
        }
    }

    fn matches(&self, tree: &Tree, input: &str) -> bool {
        self.input == input && self.tree.content_eq(tree)
    }
}

/// Bounded linear undo/redo over full snapshots.
///
/// `index` always points at the entry that corresponds to the most recent
/// save or restore. Entries past it form the redo tail.
#[derive(Debug, Clone)]
pub struct HistoryManager {
    entries: Vec<HistoryEntry>,
    index: Option<usize>,
    max_size: usize,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}

impl HistoryManager {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: Vec::new(),
            index: None,
            max_size: max_size.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index = None;
    }

    /// Record the given state. Drops the redo tail, skips a push identical to the
    /// current entry and evicts the oldest entry past the bound. Returns whether an
    /// entry was pushed.
    pub fn save(&mut self, tree: &Tree, input: &str) -> bool {
        if let Some(index) = self.index {
            self.entries.truncate(index + 1);
            if self.entries[index].matches(tree, input) {
                return false;
            }
        }

        self.entries.push(HistoryEntry::new(tree, input));
        if self.entries.len() > self.max_size {
            let evicted = self.entries.len() - self.max_size;
            self.entries.drain(..evicted);
            tracing::debug!("History full, evicted {evicted} oldest entries");
        }
        self.index = Some(self.entries.len() - 1);
        true
    }

    /// Step back. The live state is recorded first when it differs from the current
    /// entry, so a following `redo` can return to it.
    pub fn undo(&mut self, tree: &Tree, input: &str) -> Option<&HistoryEntry> {
        let index = self.index?;
        if !self.entries[index].matches(tree, input) {
            self.save(tree, input);
        }

        let index = self.index?;
        if index == 0 {
            tracing::debug!("Nothing to undo");
            return None;
        }
        self.index = Some(index - 1);
        self.entries.get(index - 1)
    }

    pub fn redo(&mut self) -> Option<&HistoryEntry> {
        let index = self.index?;
        if index + 1 >= self.entries.len() {
            tracing::debug!("Nothing to redo");
            return None;
        }
        self.index = Some(index + 1);
        self.entries.get(index + 1)
    }

    pub fn can_undo(&self, tree: &Tree, input: &str) -> bool {
        match self.index {
            Some(0) => !self.entries[0].matches(tree, input),
            Some(_) => true,
            None => false,
        }
    }

    pub fn can_redo(&self) -> bool {
        self.index.is_some_and(|index| index + 1 < self.entries.len())
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    proptest! {
        #[test]
        fn prop_undo_then_redo_returns_to_newest(
            count in 1usize..80,
            max_size in 1usize..20,
            steps in 0usize..30,
        ) {
            let mut history = HistoryManager::new(max_size);
            let live = Tree::from_value(&json!([]));
            for i in 0..count {
                history.save(&live, &i.to_string());
            }
            prop_assert!(history.len() <= max_size);
            let newest = (count - 1).to_string();

            let mut input = newest.clone();
            let mut undone = 0;
            while undone < steps {
                match history.undo(&live, &input) {
                    Some(entry) => input = entry.input.clone(),
                    None => break,
                }
                undone += 1;
            }
            prop_assert!(undone <= history.len() - 1);

            for _ in 0..undone {
                input = history.redo().unwrap().input.clone();
            }
            prop_assert_eq!(input, newest);
            prop_assert!(!history.can_redo());
        }
    }
}
