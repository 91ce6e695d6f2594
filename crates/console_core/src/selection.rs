use std::collections::BTreeSet;

use crate::TaskId;

/// Aggregate state of a "select all" control over the visible rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectAllState {
    #[default]
    None,
    Some,
    All,
}

/// Operator-selected task IDs, independent of the page being shown.
///
/// IDs of tasks deleted server-side may linger here; they never count
/// towards [`SelectionSet::tri_state`] because that is computed against the
/// visible IDs only.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelectionSet {
    ids: BTreeSet<TaskId>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toggle(&mut self, id: &str) {
        if !self.ids.remove(id) {
            self.ids.insert(id.to_string());
        }
    }

    /// Toggles the visible IDs as a group: when every visible ID is already
    /// selected they are all deselected, otherwise (none or some selected)
    /// they are all selected.
    pub fn select_all<'a, I>(&mut self, visible: I)
    where
        I: IntoIterator<Item = &'a str>,
        I::IntoIter: Clone,
    {
        let visible = visible.into_iter();
        if visible.clone().next().is_none() {
            return;
        }
        if visible.clone().all(|id| self.ids.contains(id)) {
            for id in visible {
                self.ids.remove(id);
            }
        } else {
            self.ids.extend(visible.map(str::to_string));
        }
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// Drops exactly the given IDs, leaving the rest of the selection alone.
    pub fn remove_all<'a, I>(&mut self, ids: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        for id in ids {
            self.ids.remove(id);
        }
    }

    pub fn has(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> Vec<TaskId> {
        self.ids.iter().cloned().collect()
    }

    pub fn tri_state<'a, I>(&self, visible: I) -> SelectAllState
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut seen = 0usize;
        let mut selected = 0usize;
        for id in visible {
            seen += 1;
            if self.ids.contains(id) {
                selected += 1;
            }
        }
        match (seen, selected) {
            (0, _) | (_, 0) => SelectAllState::None,
            (seen, selected) if seen == selected => SelectAllState::All,
            _ => SelectAllState::Some,
        }
    }
}
