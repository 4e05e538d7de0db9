/// Correct-order map
/// A second ordering over the items of a sequence, kept as identities so moves never invalidate it
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::{ItemId, Sequence};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrespondenceMap {
    ids: Vec<ItemId>,
}

impl CorrespondenceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps identities as given. Consistency with a sequence is checked by the validation gate.
    pub fn from_ids(ids: Vec<ItemId>) -> Self {
        Self { ids }
    }

    pub fn ids(&self) -> &[ItemId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.ids.contains(&id)
    }

    /// Complete means a duplicate-free permutation of every identity in `sequence`.
    pub fn is_complete(&self, sequence: &Sequence) -> bool {
        sequence.is_permutation(&self.ids)
    }

    /// Sequence identities not yet referenced, in sequence order
    pub fn missing(&self, sequence: &Sequence) -> Vec<ItemId> {
        sequence
            .iter()
            .map(|item| item.id)
            .filter(|id| !self.contains(*id))
            .collect()
    }

    /// Distinct references that resolve to an item of `sequence`
    pub fn placed(&self, sequence: &Sequence) -> usize {
        let mut seen = HashSet::with_capacity(self.ids.len());
        self.ids
            .iter()
            .filter(|id| sequence.contains(**id) && seen.insert(**id))
            .count()
    }

    /// Each reference expressed as a position in the current sequence.
    pub fn denoted_positions(&self, sequence: &Sequence) -> Vec<Option<usize>> {
        self.ids.iter().map(|id| sequence.position(*id)).collect()
    }

    /// Appends `id` unless it is already referenced.
    pub fn with_pick(&self, id: ItemId) -> Self {
        if self.contains(id) {
            return self.clone();
        }
        let mut ids = self.ids.clone();
        ids.push(id);
        Self { ids }
    }

    /// Drops every reference to `id`; the rest keep their relative order.
    pub fn without(&self, id: ItemId) -> Self {
        Self {
            ids: self.ids.iter().copied().filter(|other| *other != id).collect(),
        }
    }

    /// Drops references to identities no longer in `sequence`.
    pub fn retained_in(&self, sequence: &Sequence) -> Self {
        Self {
            ids: self
                .ids
                .iter()
                .copied()
                .filter(|id| sequence.contains(*id))
                .collect(),
        }
    }

    /// Replaces references to `from` with `to`.
    pub fn rekeyed(&self, from: ItemId, to: ItemId) -> Self {
        Self {
            ids: self
                .ids
                .iter()
                .map(|id| if *id == from { to } else { *id })
                .collect(),
        }
    }
}
