//! Binding table kept sorted so the most specific combos are matched first

use super::binding::{BindingId, BoundKeyFunction, KeyBinding};
use super::combo::KeyCombo;

/// Registered bindings, sorted descending by packed combo then priority
#[derive(Debug, Clone, Default)]
pub struct BindingTable {
    bindings: Vec<KeyBinding>,
}

impl BindingTable {
    /// An empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a binding at its sorted position
    ///
    /// Bindings that compare equal keep registration order. Duplicate combos
    /// are accepted; see [`BindingTable::duplicate_combos`].
    pub fn register(&mut self, binding: KeyBinding) {
        let pos = self.bindings.partition_point(|existing| {
            (existing.combo, existing.priority) >= (binding.combo, binding.priority)
        });
        self.bindings.insert(pos, binding);
    }

    /// Remove a binding by id, returning it
    pub fn remove(&mut self, id: BindingId) -> Option<KeyBinding> {
        let pos = self.bindings.iter().position(|b| b.id == id)?;
        Some(self.bindings.remove(pos))
    }

    /// Look up a binding by id
    pub fn get(&self, id: BindingId) -> Option<&KeyBinding> {
        self.bindings.iter().find(|b| b.id == id)
    }

    /// Mutable lookup by id; changing `combo` through this breaks the sort order
    pub fn get_mut(&mut self, id: BindingId) -> Option<&mut KeyBinding> {
        self.bindings.iter_mut().find(|b| b.id == id)
    }

    /// First binding for a function in table order
    ///
    /// When several bindings share a function which one is returned depends
    /// on combo ordering, not on registration.
    pub fn find_by_function(&self, function: &BoundKeyFunction) -> Option<&KeyBinding> {
        self.bindings.iter().find(|b| &b.function == function)
    }

    /// Every binding for a function, in table order
    pub fn bindings_for<'a>(
        &'a self,
        function: &'a BoundKeyFunction,
    ) -> impl Iterator<Item = &'a KeyBinding> + 'a {
        self.bindings.iter().filter(move |b| &b.function == function)
    }

    /// Bindings from most to least specific
    pub fn iter(&self) -> std::slice::Iter<'_, KeyBinding> {
        self.bindings.iter()
    }

    /// Mutable iteration in table order
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, KeyBinding> {
        self.bindings.iter_mut()
    }

    /// Number of bindings
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether the table holds no bindings
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Combos bound more than once, with the functions bound to each
    ///
    /// Sharing a combo is legal (one press fires every function bound to it)
    /// so this is only used for diagnostics.
    pub fn duplicate_combos(&self) -> Vec<(KeyCombo, Vec<BoundKeyFunction>)> {
        let mut duplicates: Vec<(KeyCombo, Vec<BoundKeyFunction>)> = Vec::new();

        // Equal combos are adjacent because the table is sorted
        for group in self.bindings.chunk_by(|a, b| a.combo == b.combo) {
            if group.len() > 1 {
                duplicates.push((
                    group[0].combo,
                    group.iter().map(|b| b.function.clone()).collect(),
                ));
            }
        }

        duplicates
    }
}

impl<'a> IntoIterator for &'a BindingTable {
    type Item = &'a KeyBinding;
    type IntoIter = std::slice::Iter<'a, KeyBinding>;

    fn into_iter(self) -> Self::IntoIter {
        self.bindings.iter()
    }
}
