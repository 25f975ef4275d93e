use std::collections::HashMap;

use crate::tensor::VariableId;

/// Whether a variable's center has been seeded yet.
///
/// Moves from `Uninitialized` to `Active` on the first step and stays there.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Bootstrap {
    #[default]
    Uninitialized,
    Active,
}

impl Bootstrap {
    pub fn is_active(self) -> bool {
        self == Bootstrap::Active
    }

    /// The flag as the 0/1 scalar hosts serialize.
    pub fn as_f32(self) -> f32 {
        match self {
            Bootstrap::Uninitialized => 0.,
            Bootstrap::Active => 1.,
        }
    }
}

/// Per-variable slot blocks, created lazily and never dropped.
#[derive(Debug)]
pub(crate) struct SlotTable<S> {
    index: HashMap<VariableId, usize>,
    slots: Vec<S>,
}

impl<S> Default for SlotTable<S> {
    fn default() -> Self {
        Self {
            index: HashMap::new(),
            slots: Vec::new(),
        }
    }
}

impl<S> SlotTable<S> {
    pub fn get(&self, id: VariableId) -> Option<&S> {
        self.index.get(&id).map(|&i| &self.slots[i])
    }

    /// Creates the slots of `id` with `make` unless they already exist.
    ///
    /// # Returns
    /// Whether the slots were created.
    pub fn ensure<F>(&mut self, id: VariableId, make: F) -> bool
    where
        F: FnOnce() -> S,
    {
        if self.index.contains_key(&id) {
            return false;
        }

        self.index.insert(id, self.slots.len());
        self.slots.push(make());
        true
    }

    /// Borrows the slots of every id in `ids` at once, in the same order.
    ///
    /// Ids must be distinct and already present, anything else is left out.
    pub fn get_many_mut(&mut self, ids: &[VariableId]) -> Vec<&mut S> {
        let mut refs: Vec<Option<&mut S>> = self.slots.iter_mut().map(Some).collect();

        let out: Vec<_> = ids
            .iter()
            .filter_map(|id| self.index.get(id).and_then(|&i| refs[i].take()))
            .collect();

        debug_assert_eq!(out.len(), ids.len());
        out
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{ArrayD, IxDyn};

    use super::*;
    use crate::tensor::Variable;

    fn ids(n: usize) -> Vec<VariableId> {
        (0..n)
            .map(|i| Variable::new(format!("v{i}"), ArrayD::zeros(IxDyn(&[1]))).id())
            .collect()
    }

    #[test]
    fn ensure_creates_once() {
        let a = ids(1)[0];
        let mut table = SlotTable::default();

        assert!(table.ensure(a, || 1));
        assert!(!table.ensure(a, || 2));
        assert_eq!(table.get(a), Some(&1));
        assert_eq!(table.slots.len(), 1);
    }

    #[test]
    fn get_many_mut_follows_request_order() {
        let ids = ids(3);
        let mut table = SlotTable::default();
        for (n, &id) in ids.iter().enumerate() {
            table.ensure(id, || n);
        }

        let refs = table.get_many_mut(&[ids[2], ids[0]]);
        assert_eq!(refs.len(), 2);
        for r in refs {
            *r += 10;
        }

        assert_eq!(table.get(ids[0]), Some(&10));
        assert_eq!(table.get(ids[1]), Some(&1));
        assert_eq!(table.get(ids[2]), Some(&12));
    }

    #[test]
    fn bootstrap_flag() {
        assert!(!Bootstrap::default().is_active());
        assert_eq!(Bootstrap::Uninitialized.as_f32(), 0.);
        assert_eq!(Bootstrap::Active.as_f32(), 1.);
    }
}
